use std::sync::Arc;
use uuid::Uuid;

use stayline_core::error::StoreError;
use stayline_core::store::{BookingStore, UnitDirectory};
use stayline_shared::{BlockingRange, RangeSource, StayRange};

/// Read projection over committed bookings and host blocks. Not a second
/// writable source of truth: it only composes reads against the stores the
/// booking state machine and listing tooling already write.
pub struct AvailabilityView {
    bookings: Arc<dyn BookingStore>,
    units: Arc<dyn UnitDirectory>,
}

impl AvailabilityView {
    pub fn new(bookings: Arc<dyn BookingStore>, units: Arc<dyn UnitDirectory>) -> Self {
        Self { bookings, units }
    }

    pub async fn is_free(&self, unit_id: Uuid, range: StayRange) -> Result<bool, StoreError> {
        Ok(self.list_blocking_ranges(unit_id, range).await?.is_empty())
    }

    /// Every occupied slice overlapping `range`, tagged with its source,
    /// sorted by start date for calendar rendering.
    pub async fn list_blocking_ranges(
        &self,
        unit_id: Uuid,
        range: StayRange,
    ) -> Result<Vec<BlockingRange>, StoreError> {
        let mut out = Vec::new();

        for booking in self.bookings.overlapping(unit_id, range).await? {
            out.push(BlockingRange {
                range: booking.range,
                source: RangeSource::Booking,
            });
        }
        for block in self.units.blocks_overlapping(unit_id, range).await? {
            out.push(BlockingRange {
                range: block.range,
                source: RangeSource::Block,
            });
        }

        out.sort_by_key(|r| (r.range.date_from, r.range.date_to));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BookingEngine, CreateBooking};
    use stayline_shared::{Block, BlockReason, BookingMode, Unit};
    use stayline_store::memory::MemoryStore;

    fn d(s: &str) -> chrono::NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_blocking_ranges_tag_sources() {
        let store = Arc::new(MemoryStore::new());
        let unit = Unit {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            title: "Yaba Studio".to_string(),
            currency: "NGN".to_string(),
            mode: BookingMode::Instant,
            cancellation_policy: "strict".to_string(),
            min_nights: 1,
            min_notice_hours: 0,
            hold_minutes: 15,
        };
        store.add_unit(unit.clone());
        store.add_block(Block {
            id: Uuid::new_v4(),
            unit_id: unit.id,
            range: StayRange::new(d("2026-04-01"), d("2026-04-05")),
            reason: BlockReason::Maintenance,
        });

        let engine = BookingEngine::new(store.clone(), store.clone());
        let view = AvailabilityView::new(store.clone(), store.clone());

        engine
            .create_booking(
                CreateBooking {
                    unit_id: unit.id,
                    guest_id: Uuid::new_v4(),
                    date_from: d("2026-04-10"),
                    date_to: d("2026-04-12"),
                    mode: BookingMode::Instant,
                    total_amount_minor: 80_000,
                    currency: "NGN".to_string(),
                    pricing_snapshot: serde_json::json!({}),
                },
                "2026-03-01T00:00:00Z".parse().unwrap(),
            )
            .await
            .unwrap();

        let month = StayRange::new(d("2026-04-01"), d("2026-05-01"));
        let ranges = view.list_blocking_ranges(unit.id, month).await.unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].source, RangeSource::Block);
        assert_eq!(ranges[1].source, RangeSource::Booking);

        assert!(!view.is_free(unit.id, month).await.unwrap());
        assert!(view
            .is_free(unit.id, StayRange::new(d("2026-04-05"), d("2026-04-10")))
            .await
            .unwrap());
    }
}
