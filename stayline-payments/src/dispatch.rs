use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use stayline_core::error::StoreError;
use stayline_core::notify::NotificationSink;
use stayline_core::store::{DispatchLog, UnitDirectory};
use stayline_shared::{dedupe_key, Audience, Booking, EventKind, NotificationEvent};

/// Exactly-once side-effect dispatch. The dedupe key is derived from
/// `(booking_id, event_kind, audience)`, so the synchronous webhook path
/// and the reconciliation sweeper converge on the same key and a booking
/// confirmed via either path notifies each audience once.
pub struct SideEffectDispatcher {
    log: Arc<dyn DispatchLog>,
    sink: Arc<dyn NotificationSink>,
    units: Arc<dyn UnitDirectory>,
}

impl SideEffectDispatcher {
    pub fn new(
        log: Arc<dyn DispatchLog>,
        sink: Arc<dyn NotificationSink>,
        units: Arc<dyn UnitDirectory>,
    ) -> Self {
        Self { log, sink, units }
    }

    /// Returns `true` if the notification was delivered, `false` if the
    /// dedupe key had already been recorded.
    pub async fn dispatch(
        &self,
        event: &NotificationEvent,
        audience: Audience,
    ) -> Result<bool, StoreError> {
        let key = dedupe_key(event.booking_id, event.kind, audience);
        if !self.log.record_if_new(&key, Utc::now()).await? {
            debug!(%key, "side effect already dispatched, skipping");
            return Ok(false);
        }
        self.sink.deliver(event, audience).await?;
        Ok(true)
    }

    /// Dispatch one event for a booking to each audience.
    pub async fn notify_booking(
        &self,
        kind: EventKind,
        booking: &Booking,
        audiences: &[Audience],
    ) -> Result<(), StoreError> {
        let listing_title = self
            .units
            .get_unit(booking.unit_id)
            .await?
            .map(|u| u.title)
            .unwrap_or_default();

        let event = NotificationEvent {
            kind,
            booking_id: booking.id,
            listing_title,
            range: booking.range,
            amount_minor: booking.total_amount_minor,
            currency: booking.currency.clone(),
        };

        for audience in audiences {
            self.dispatch(&event, *audience).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use stayline_shared::{BookingStatus, StayRange};
    use stayline_store::memory::MemoryStore;
    use uuid::Uuid;

    #[derive(Default)]
    pub struct RecordingSink {
        pub delivered: Mutex<Vec<(EventKind, Audience)>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(
            &self,
            event: &NotificationEvent,
            audience: Audience,
        ) -> Result<(), StoreError> {
            self.delivered
                .lock()
                .map_err(|_| StoreError::Backend("sink poisoned".to_string()))?
                .push((event.kind, audience));
            Ok(())
        }
    }

    fn test_booking() -> Booking {
        let mut b = Booking::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            StayRange::new("2026-03-10".parse().unwrap(), "2026-03-13".parse().unwrap()),
            120_000,
            "NGN".to_string(),
            serde_json::json!({}),
            None,
        );
        b.status = BookingStatus::Confirmed;
        b
    }

    #[tokio::test]
    async fn test_duplicate_dispatch_delivers_once() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let dispatcher =
            SideEffectDispatcher::new(store.clone(), sink.clone(), store.clone());

        let booking = test_booking();
        let audiences = [Audience::Guest, Audience::Host];

        dispatcher
            .notify_booking(EventKind::BookingConfirmed, &booking, &audiences)
            .await
            .unwrap();
        // Retried delivery from the other path: same keys, so no-ops.
        dispatcher
            .notify_booking(EventKind::BookingConfirmed, &booking, &audiences)
            .await
            .unwrap();

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert!(delivered.contains(&(EventKind::BookingConfirmed, Audience::Guest)));
        assert!(delivered.contains(&(EventKind::BookingConfirmed, Audience::Host)));
    }

    #[tokio::test]
    async fn test_distinct_kinds_both_deliver() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let dispatcher =
            SideEffectDispatcher::new(store.clone(), sink.clone(), store.clone());

        let booking = test_booking();
        dispatcher
            .notify_booking(EventKind::BookingConfirmed, &booking, &[Audience::Guest])
            .await
            .unwrap();
        dispatcher
            .notify_booking(EventKind::BookingCancelled, &booking, &[Audience::Guest])
            .await
            .unwrap();

        assert_eq!(sink.delivered.lock().unwrap().len(), 2);
    }
}
