use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use stayline_core::error::BookingError;
use stayline_core::store::{BookingStore, InsertOutcome, TransitionOutcome, UnitDirectory};
use stayline_shared::{Actor, Booking, BookingMode, StayRange};

/// A reservation request, price snapshot already computed upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBooking {
    pub unit_id: Uuid,
    pub guest_id: Uuid,
    pub date_from: chrono::NaiveDate,
    pub date_to: chrono::NaiveDate,
    pub mode: BookingMode,
    pub total_amount_minor: i64,
    pub currency: String,
    pub pricing_snapshot: Value,
}

/// How a confirmation attempt landed. Retries of an already-confirmed
/// booking are reported, not failed, so the payment path stays idempotent.
#[derive(Debug)]
pub enum ConfirmOutcome {
    Confirmed(Booking),
    AlreadyConfirmed(Booking),
}

impl ConfirmOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            ConfirmOutcome::Confirmed(b) | ConfirmOutcome::AlreadyConfirmed(b) => b,
        }
    }
}

/// Owns the booking lifecycle. The only component that mutates booking
/// status; every mutation goes through a conditional store write.
pub struct BookingEngine {
    units: Arc<dyn UnitDirectory>,
    bookings: Arc<dyn BookingStore>,
}

impl BookingEngine {
    pub fn new(units: Arc<dyn UnitDirectory>, bookings: Arc<dyn BookingStore>) -> Self {
        Self { units, bookings }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.bookings
    }

    /// Validate, then reserve via a single atomic insert-if-no-overlap.
    /// Two racing requests for overlapping dates resolve at the store:
    /// one inserts, the other gets `DATES_UNAVAILABLE`.
    pub async fn create_booking(
        &self,
        cmd: CreateBooking,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        let range = StayRange::new(cmd.date_from, cmd.date_to);
        if !range.is_valid() {
            return Err(BookingError::InvalidRange);
        }

        let unit = self
            .units
            .get_unit(cmd.unit_id)
            .await?
            .ok_or(BookingError::UnitNotBookable { unit_id: cmd.unit_id })?;

        if unit.mode != cmd.mode {
            return Err(BookingError::UnitNotBookable { unit_id: cmd.unit_id });
        }

        let nights = range.nights();
        if nights < unit.min_nights as i64 {
            return Err(BookingError::NightsBelowMinimum {
                minimum: unit.min_nights,
                requested: nights,
            });
        }

        let check_in = cmd.date_from.and_time(NaiveTime::MIN).and_utc();
        let earliest = now + Duration::hours(unit.min_notice_hours as i64);
        if cmd.date_from < now.date_naive() || check_in < earliest {
            return Err(BookingError::NoticeWindowViolated {
                required_hours: unit.min_notice_hours,
            });
        }

        // Host blocks share no table constraint with bookings, so they
        // are checked up front; the insert condition below still carries
        // the booking-overlap invariant.
        if !self.units.blocks_overlapping(cmd.unit_id, range).await?.is_empty() {
            return Err(BookingError::DatesUnavailable { unit_id: cmd.unit_id });
        }

        let expires_at = if unit.hold_minutes > 0 {
            Some(now + Duration::minutes(unit.hold_minutes as i64))
        } else {
            // Per-unit product decision: a zero hold window means the
            // request waits indefinitely for host action.
            None
        };

        let booking = Booking::new(
            cmd.unit_id,
            cmd.guest_id,
            unit.host_id,
            range,
            cmd.total_amount_minor,
            cmd.currency,
            cmd.pricing_snapshot,
            expires_at,
        );

        match self.bookings.insert_if_free(&booking).await? {
            InsertOutcome::Inserted => {
                info!(
                    booking_id = %booking.id,
                    unit_id = %booking.unit_id,
                    nights = booking.nights,
                    "booking created"
                );
                Ok(booking)
            }
            InsertOutcome::Overlap => Err(BookingError::DatesUnavailable { unit_id: cmd.unit_id }),
        }
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.bookings.get(id).await?.ok_or(BookingError::NotFound(id))
    }

    pub async fn list_for_guest(&self, guest_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        Ok(self.bookings.list_for_guest(guest_id).await?)
    }

    /// Cancel on behalf of the guest, host, or an admin. Cancelling frees
    /// the dates immediately: the availability read model excludes
    /// cancelled bookings.
    pub async fn cancel_booking(
        &self,
        id: Uuid,
        actor: Actor,
        reason: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking(id).await?;
        if !actor.may_cancel(&booking) {
            return Err(BookingError::Forbidden);
        }

        match self.bookings.cancel_if_active(id, reason).await? {
            TransitionOutcome::Applied(b) => {
                info!(booking_id = %id, reason, "booking cancelled");
                Ok(b)
            }
            TransitionOutcome::WrongStatus(status) => {
                Err(BookingError::InvalidStatus { status })
            }
            TransitionOutcome::NotFound => Err(BookingError::NotFound(id)),
        }
    }

    /// Drive `pending_payment -> confirmed` off a successful payment.
    /// Idempotent: a booking already confirmed reports `AlreadyConfirmed`
    /// so webhook retries and sweeper re-runs are no-ops.
    pub async fn confirm_from_payment(&self, id: Uuid) -> Result<ConfirmOutcome, BookingError> {
        match self.bookings.confirm_if_pending(id).await? {
            TransitionOutcome::Applied(b) => {
                info!(booking_id = %id, "booking confirmed");
                Ok(ConfirmOutcome::Confirmed(b))
            }
            TransitionOutcome::WrongStatus(status) if status == stayline_shared::BookingStatus::Confirmed => {
                let b = self.get_booking(id).await?;
                Ok(ConfirmOutcome::AlreadyConfirmed(b))
            }
            TransitionOutcome::WrongStatus(status) => {
                warn!(booking_id = %id, status = status.as_str(), "payment succeeded for non-pending booking");
                Err(BookingError::InvalidStatus { status })
            }
            TransitionOutcome::NotFound => Err(BookingError::NotFound(id)),
        }
    }

    pub async fn attach_payment_reference(
        &self,
        id: Uuid,
        reference: &str,
    ) -> Result<(), BookingError> {
        self.bookings.set_payment_reference(id, reference).await?;
        Ok(())
    }

    /// Expiry pass: cancel `pending_payment` bookings whose hold lapsed.
    /// The per-row store condition re-checks the hold, so a booking
    /// confirmed after the scan is left untouched.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, BookingError> {
        let mut expired = Vec::new();
        for candidate in self.bookings.expired_pending(now).await? {
            match self
                .bookings
                .cancel_expired(candidate.id, now, "hold_expired")
                .await?
            {
                TransitionOutcome::Applied(b) => {
                    info!(booking_id = %b.id, "pending booking expired, dates freed");
                    expired.push(b);
                }
                // Confirmed or cancelled between scan and cancel.
                TransitionOutcome::WrongStatus(_) | TransitionOutcome::NotFound => {}
            }
        }
        Ok(expired)
    }
}
