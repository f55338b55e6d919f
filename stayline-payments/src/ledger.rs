use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use stayline_booking::BookingEngine;
use stayline_core::error::{BookingError, PaymentError};
use stayline_core::provider::{ProviderNotification, ProviderPaymentStatus};
use stayline_core::store::{MarkOutcome, PaymentLedgerStore};
use stayline_shared::{
    Audience, Booking, EventKind, PaymentAttempt, PaymentAttemptStatus, Provider,
};

use crate::dispatch::SideEffectDispatcher;

/// Result of applying a provider notification, mirrored back to the
/// webhook caller.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationOutcome {
    pub ok: bool,
    pub already_succeeded: bool,
    pub attempt_status: PaymentAttemptStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Applies payment-provider state to the ledger and drives the booking
/// state machine off it. Both the webhook handler and the reconciliation
/// sweeper funnel through `apply_notification`, so retries, duplicates
/// and out-of-order deliveries all land on the same idempotent writes.
pub struct PaymentService {
    ledger: Arc<dyn PaymentLedgerStore>,
    engine: Arc<BookingEngine>,
    dispatcher: Arc<SideEffectDispatcher>,
}

impl PaymentService {
    pub fn new(
        ledger: Arc<dyn PaymentLedgerStore>,
        engine: Arc<BookingEngine>,
        dispatcher: Arc<SideEffectDispatcher>,
    ) -> Self {
        Self { ledger, engine, dispatcher }
    }

    pub fn ledger(&self) -> &Arc<dyn PaymentLedgerStore> {
        &self.ledger
    }

    /// Record a payment attempt for a booking. The provider reference is
    /// deterministic (`booking id + sequence`); a concurrent duplicate
    /// collides on the unique reference and returns the original row.
    pub async fn initiate_payment(
        &self,
        booking_id: Uuid,
        provider: Provider,
    ) -> Result<PaymentAttempt, PaymentError> {
        let booking = self.engine.get_booking(booking_id).await?;
        let seq = self.ledger.attempts_for_booking(booking_id).await?.len() as u32 + 1;
        let reference = PaymentAttempt::reference_for(booking_id, seq);

        let attempt = PaymentAttempt::new(
            booking_id,
            provider,
            reference,
            booking.total_amount_minor,
            booking.currency.clone(),
        );
        let attempt = self.ledger.insert_attempt(&attempt).await?.into_attempt();

        self.engine
            .attach_payment_reference(booking_id, &attempt.provider_reference)
            .await?;

        info!(
            booking_id = %booking_id,
            provider = provider.as_str(),
            reference = %attempt.provider_reference,
            "payment attempt recorded"
        );
        Ok(attempt)
    }

    /// Apply one provider notification. At-least-once webhook delivery
    /// makes duplicates routine; the ledger write and the booking
    /// transition are each idempotent, so replaying the whole path after
    /// a crash between them converges on the same state.
    pub async fn apply_notification(
        &self,
        n: ProviderNotification,
        now: DateTime<Utc>,
    ) -> Result<NotificationOutcome, PaymentError> {
        match n.status {
            ProviderPaymentStatus::Succeeded => self.apply_success(n, now).await,
            ProviderPaymentStatus::Failed => self.apply_failure(n, now).await,
            ProviderPaymentStatus::Pending => {
                // Not terminal at the provider: hand it to the sweeper
                // rather than guessing.
                self.ledger
                    .flag_for_reconcile(n.provider, &n.reference, "nonterminal_notification")
                    .await?;
                let attempt = self
                    .ledger
                    .get_by_reference(n.provider, &n.reference)
                    .await?
                    .ok_or_else(|| PaymentError::AttemptNotFound(n.reference.clone()))?;
                Ok(NotificationOutcome {
                    ok: true,
                    already_succeeded: false,
                    attempt_status: attempt.status,
                    confirmed_at: attempt.confirmed_at,
                })
            }
        }
    }

    async fn apply_success(
        &self,
        n: ProviderNotification,
        now: DateTime<Utc>,
    ) -> Result<NotificationOutcome, PaymentError> {
        let outcome = self
            .ledger
            .mark_succeeded(n.provider, &n.reference, &n.payload, n.tx_id.as_deref(), now)
            .await?;

        let (attempt, already_succeeded) = match outcome {
            MarkOutcome::Applied(a) => (a, false),
            MarkOutcome::AlreadySucceeded(a) => (a, true),
            MarkOutcome::NotFound => return Err(PaymentError::AttemptNotFound(n.reference)),
        };

        // Re-driven on every delivery: a retry after a crash between the
        // ledger write and this transition completes the composition.
        self.drive_booking_confirmed(&attempt).await?;

        Ok(NotificationOutcome {
            ok: true,
            already_succeeded,
            attempt_status: attempt.status,
            confirmed_at: attempt.confirmed_at,
        })
    }

    async fn drive_booking_confirmed(&self, attempt: &PaymentAttempt) -> Result<(), PaymentError> {
        match self.engine.confirm_from_payment(attempt.booking_id).await {
            Ok(outcome) => {
                self.dispatcher
                    .notify_booking(
                        EventKind::BookingConfirmed,
                        outcome.booking(),
                        &[Audience::Guest, Audience::Host],
                    )
                    .await?;
                Ok(())
            }
            Err(BookingError::InvalidStatus { status }) => {
                // Money arrived for a booking that is no longer
                // confirmable (expired hold, guest cancel). Surface a
                // refund instead of failing the webhook.
                warn!(
                    booking_id = %attempt.booking_id,
                    reference = %attempt.provider_reference,
                    status = status.as_str(),
                    "payment succeeded for non-confirmable booking, flagging refund"
                );
                let booking = self.engine.get_booking(attempt.booking_id).await?;
                self.dispatcher
                    .notify_booking(EventKind::RefundDue, &booking, &[Audience::Guest])
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_failure(
        &self,
        n: ProviderNotification,
        now: DateTime<Utc>,
    ) -> Result<NotificationOutcome, PaymentError> {
        let reason = "provider_reported_failure";
        match self.ledger.mark_failed(n.provider, &n.reference, reason, now).await? {
            MarkOutcome::Applied(attempt) => {
                let booking = self.engine.get_booking(attempt.booking_id).await?;
                self.dispatcher
                    .notify_booking(EventKind::PaymentFailed, &booking, &[Audience::Guest])
                    .await?;
                Ok(NotificationOutcome {
                    ok: true,
                    already_succeeded: false,
                    attempt_status: attempt.status,
                    confirmed_at: attempt.confirmed_at,
                })
            }
            MarkOutcome::AlreadySucceeded(attempt) => {
                // A late failure never rolls back a success; log and keep
                // the stored confirmation.
                warn!(
                    reference = %attempt.provider_reference,
                    confirmed_at = ?attempt.confirmed_at,
                    "ignoring failure notification for succeeded attempt"
                );
                Ok(NotificationOutcome {
                    ok: true,
                    already_succeeded: true,
                    attempt_status: attempt.status,
                    confirmed_at: attempt.confirmed_at,
                })
            }
            MarkOutcome::NotFound => Err(PaymentError::AttemptNotFound(n.reference)),
        }
    }

    /// Post-cancellation side effects: cancellation notices for both
    /// parties, plus a refund flag when money was already captured.
    pub async fn handle_cancellation(&self, booking: &Booking) -> Result<(), PaymentError> {
        self.dispatcher
            .notify_booking(
                EventKind::BookingCancelled,
                booking,
                &[Audience::Guest, Audience::Host],
            )
            .await?;

        let captured = self
            .ledger
            .attempts_for_booking(booking.id)
            .await?
            .iter()
            .any(|a| a.status == PaymentAttemptStatus::Succeeded);
        if captured {
            self.dispatcher
                .notify_booking(EventKind::RefundDue, booking, &[Audience::Guest])
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use stayline_booking::CreateBooking;
    use stayline_core::error::StoreError;
    use stayline_core::notify::NotificationSink;
    use stayline_shared::{BookingMode, BookingStatus, NotificationEvent, Unit};
    use stayline_store::memory::MemoryStore;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<(EventKind, Audience)>>,
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

    struct Fixture {
        service: PaymentService,
        engine: Arc<BookingEngine>,
        sink: Arc<RecordingSink>,
        unit: Unit,
    }

    fn now() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let unit = Unit {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            title: "Ikoyi Penthouse".to_string(),
            currency: "NGN".to_string(),
            mode: BookingMode::Instant,
            cancellation_policy: "flexible".to_string(),
            min_nights: 1,
            min_notice_hours: 0,
            hold_minutes: 30,
        };
        store.add_unit(unit.clone());

        let engine = Arc::new(BookingEngine::new(store.clone(), store.clone()));
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Arc::new(SideEffectDispatcher::new(
            store.clone(),
            sink.clone(),
            store.clone(),
        ));
        let service = PaymentService::new(store.clone(), engine.clone(), dispatcher);
        Fixture { service, engine, sink, unit }
    }

    async fn make_booking(f: &Fixture) -> stayline_shared::Booking {
        f.engine
            .create_booking(
                CreateBooking {
                    unit_id: f.unit.id,
                    guest_id: Uuid::new_v4(),
                    date_from: "2026-03-10".parse().unwrap(),
                    date_to: "2026-03-13".parse().unwrap(),
                    mode: BookingMode::Instant,
                    total_amount_minor: 120_000,
                    currency: "NGN".to_string(),
                    pricing_snapshot: json!({"nightly": 40_000}),
                },
                now(),
            )
            .await
            .unwrap()
    }

    fn success(provider: Provider, reference: &str, payload: serde_json::Value) -> ProviderNotification {
        ProviderNotification {
            provider,
            reference: reference.to_string(),
            status: ProviderPaymentStatus::Succeeded,
            payload,
            tx_id: Some("tx_1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_success_notification_confirms_booking() {
        let f = fixture();
        let booking = make_booking(&f).await;
        let attempt = f
            .service
            .initiate_payment(booking.id, Provider::Paystack)
            .await
            .unwrap();
        assert_eq!(attempt.status, PaymentAttemptStatus::Initiated);

        let outcome = f
            .service
            .apply_notification(
                success(Provider::Paystack, &attempt.provider_reference, json!({"n": 1})),
                now(),
            )
            .await
            .unwrap();

        assert!(outcome.ok);
        assert!(!outcome.already_succeeded);
        assert!(outcome.confirmed_at.is_some());
        assert_eq!(
            f.engine.get_booking(booking.id).await.unwrap().status,
            BookingStatus::Confirmed
        );
        assert_eq!(f.sink.delivered.lock().unwrap().len(), 2); // guest + host
    }

    #[tokio::test]
    async fn test_duplicate_success_is_noop_with_original_confirmed_at() {
        let f = fixture();
        let booking = make_booking(&f).await;
        let attempt = f
            .service
            .initiate_payment(booking.id, Provider::Paystack)
            .await
            .unwrap();

        let first = f
            .service
            .apply_notification(
                success(Provider::Paystack, &attempt.provider_reference, json!({"n": 1})),
                now(),
            )
            .await
            .unwrap();

        let second = f
            .service
            .apply_notification(
                success(
                    Provider::Paystack,
                    &attempt.provider_reference,
                    json!({"n": 2, "different": true}),
                ),
                now() + chrono::Duration::minutes(5),
            )
            .await
            .unwrap();

        assert!(second.already_succeeded);
        assert_eq!(second.confirmed_at, first.confirmed_at);
        // Notifications were deduped, not re-sent.
        assert_eq!(f.sink.delivered.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_after_success_does_not_overwrite() {
        let f = fixture();
        let booking = make_booking(&f).await;
        let attempt = f
            .service
            .initiate_payment(booking.id, Provider::Stripe)
            .await
            .unwrap();

        f.service
            .apply_notification(
                success(Provider::Stripe, &attempt.provider_reference, json!({})),
                now(),
            )
            .await
            .unwrap();

        let failure = ProviderNotification {
            provider: Provider::Stripe,
            reference: attempt.provider_reference.clone(),
            status: ProviderPaymentStatus::Failed,
            payload: json!({"late": true}),
            tx_id: None,
        };
        let outcome = f.service.apply_notification(failure, now()).await.unwrap();

        assert!(outcome.already_succeeded);
        assert_eq!(outcome.attempt_status, PaymentAttemptStatus::Succeeded);
        assert_eq!(
            f.engine.get_booking(booking.id).await.unwrap().status,
            BookingStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn test_failure_marks_attempt_and_notifies_guest() {
        let f = fixture();
        let booking = make_booking(&f).await;
        let attempt = f
            .service
            .initiate_payment(booking.id, Provider::Stripe)
            .await
            .unwrap();

        let failure = ProviderNotification {
            provider: Provider::Stripe,
            reference: attempt.provider_reference.clone(),
            status: ProviderPaymentStatus::Failed,
            payload: json!({}),
            tx_id: None,
        };
        let outcome = f.service.apply_notification(failure, now()).await.unwrap();

        assert_eq!(outcome.attempt_status, PaymentAttemptStatus::Failed);
        let delivered = f.sink.delivered.lock().unwrap();
        assert_eq!(delivered.as_slice(), &[(EventKind::PaymentFailed, Audience::Guest)]);
    }

    #[tokio::test]
    async fn test_pending_notification_routes_to_reconcile() {
        let f = fixture();
        let booking = make_booking(&f).await;
        let attempt = f
            .service
            .initiate_payment(booking.id, Provider::Paystack)
            .await
            .unwrap();

        let pending = ProviderNotification {
            provider: Provider::Paystack,
            reference: attempt.provider_reference.clone(),
            status: ProviderPaymentStatus::Pending,
            payload: json!({}),
            tx_id: None,
        };
        f.service.apply_notification(pending, now()).await.unwrap();

        let stored = f
            .service
            .ledger()
            .get_by_reference(Provider::Paystack, &attempt.provider_reference)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.needs_reconcile);
        assert_eq!(stored.status, PaymentAttemptStatus::Initiated);
    }

    #[tokio::test]
    async fn test_success_after_expiry_flags_refund() {
        let f = fixture();
        let booking = make_booking(&f).await;
        let attempt = f
            .service
            .initiate_payment(booking.id, Provider::Paystack)
            .await
            .unwrap();

        // Hold lapses and the expiry pass frees the dates before the
        // provider's success lands.
        let later = now() + chrono::Duration::hours(1);
        f.engine.expire_stale(later).await.unwrap();

        let outcome = f
            .service
            .apply_notification(
                success(Provider::Paystack, &attempt.provider_reference, json!({})),
                later,
            )
            .await
            .unwrap();
        assert!(outcome.ok);

        assert_eq!(
            f.engine.get_booking(booking.id).await.unwrap().status,
            BookingStatus::Cancelled
        );
        let delivered = f.sink.delivered.lock().unwrap();
        assert!(delivered.contains(&(EventKind::RefundDue, Audience::Guest)));
    }

    #[tokio::test]
    async fn test_attempt_references_are_sequential() {
        let f = fixture();
        let booking = make_booking(&f).await;

        let first = f
            .service
            .initiate_payment(booking.id, Provider::Stripe)
            .await
            .unwrap();
        let second = f
            .service
            .initiate_payment(booking.id, Provider::Stripe)
            .await
            .unwrap();

        assert_eq!(first.provider_reference, PaymentAttempt::reference_for(booking.id, 1));
        assert_eq!(second.provider_reference, PaymentAttempt::reference_for(booking.id, 2));
        assert_eq!(
            f.engine.get_booking(booking.id).await.unwrap().payment_reference,
            Some(second.provider_reference.clone())
        );
    }
}
