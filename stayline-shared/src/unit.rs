use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::range::StayRange;

/// How a unit accepts bookings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingMode {
    Instant,
    Request,
}

impl BookingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingMode::Instant => "instant",
            BookingMode::Request => "request",
        }
    }
}

/// A rentable shortlet property. Owned by listing management; read-only
/// inside the reservation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub currency: String,
    pub mode: BookingMode,
    pub cancellation_policy: String,
    pub min_nights: u32,
    pub min_notice_hours: u32,
    /// How long a pending_payment booking holds its dates before the
    /// expiry sweep cancels it. `0` means the booking waits indefinitely
    /// for host action (product decision, per-unit configurable).
    pub hold_minutes: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    HostBlock,
    Maintenance,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::HostBlock => "host_block",
            BlockReason::Maintenance => "maintenance",
        }
    }
}

/// A host- or system-imposed unavailable range on a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub range: StayRange,
    pub reason: BlockReason,
}
