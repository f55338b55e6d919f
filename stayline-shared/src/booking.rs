use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::range::StayRange;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "PENDING_PAYMENT",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING_PAYMENT" => Some(BookingStatus::PendingPayment),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Statuses that keep the date range occupied.
    pub fn blocks_dates(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

/// The core reservation aggregate. Never deleted; cancelled bookings stay
/// for audit and availability history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub guest_id: Uuid,
    pub host_id: Uuid,
    pub range: StayRange,
    pub nights: i64,
    pub status: BookingStatus,
    pub total_amount_minor: i64,
    pub currency: String,
    /// Frozen at creation by the pricing collaborator; opaque here.
    pub pricing_snapshot: Value,
    pub payment_reference: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        unit_id: Uuid,
        guest_id: Uuid,
        host_id: Uuid,
        range: StayRange,
        total_amount_minor: i64,
        currency: String,
        pricing_snapshot: Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            unit_id,
            guest_id,
            host_id,
            range,
            nights: range.nights(),
            status: BookingStatus::PendingPayment,
            total_amount_minor,
            currency,
            pricing_snapshot,
            payment_reference: None,
            expires_at,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `COMPLETED` is a passive, derived state: a confirmed booking whose
    /// checkout date has passed. Nothing writes it.
    pub fn effective_status(&self, today: NaiveDate) -> BookingStatus {
        if self.status == BookingStatus::Confirmed && self.range.date_to <= today {
            BookingStatus::Completed
        } else {
            self.status
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Guest,
    Host,
    Admin,
}

/// Who is performing a booking mutation. Identity verification belongs to
/// the auth collaborator; the engine only checks ownership.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn may_cancel(&self, booking: &Booking) -> bool {
        match self.role {
            ActorRole::Admin => true,
            ActorRole::Guest => booking.guest_id == self.id,
            ActorRole::Host => booking.host_id == self.id,
        }
    }
}
