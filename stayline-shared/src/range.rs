use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Half-open date interval `[date_from, date_to)`.
///
/// Checkout day equals the next guest's check-in day, so adjacent stays
/// never overlap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StayRange {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl StayRange {
    pub fn new(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self { date_from, date_to }
    }

    /// Number of nights covered by the range. Zero or negative ranges
    /// are rejected upstream; this saturates rather than panics.
    pub fn nights(&self) -> i64 {
        (self.date_to - self.date_from).num_days().max(0)
    }

    pub fn is_valid(&self) -> bool {
        self.date_from < self.date_to
    }

    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.date_from < other.date_to && other.date_from < self.date_to
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.date_from <= date && date < self.date_to
    }
}

/// Where a blocking range originates, for calendar rendering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RangeSource {
    Booking,
    Block,
}

/// An occupied slice of a unit's calendar, tagged with its source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockingRange {
    pub range: StayRange,
    pub source: RangeSource,
}
