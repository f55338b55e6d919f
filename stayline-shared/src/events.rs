use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::range::StayRange;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BookingConfirmed,
    BookingCancelled,
    PaymentFailed,
    RefundDue,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BookingConfirmed => "booking_confirmed",
            EventKind::BookingCancelled => "booking_cancelled",
            EventKind::PaymentFailed => "payment_failed",
            EventKind::RefundDue => "refund_due",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Guest,
    Host,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Guest => "guest",
            Audience::Host => "host",
        }
    }
}

/// Deterministic dedupe key for exactly-once side effects. Both the
/// webhook path and the reconciliation sweeper must derive the same key
/// for the same logical event.
pub fn dedupe_key(booking_id: Uuid, kind: EventKind, audience: Audience) -> String {
    format!("{}:{}:{}", booking_id.simple(), kind.as_str(), audience.as_str())
}

/// Payload handed to the external notification-delivery collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub booking_id: Uuid,
    pub listing_title: String,
    pub range: StayRange,
    pub amount_minor: i64,
    pub currency: String,
}
