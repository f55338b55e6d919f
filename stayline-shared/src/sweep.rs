use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters produced by one sweeper run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_bookings: u32,
    pub attempts_scanned: u32,
    pub verified_succeeded: u32,
    pub verified_failed: u32,
    pub verify_exhausted: u32,
    /// Attempts left `needs_reconcile` for a later pass (verify error,
    /// timeout, or still pending at the provider).
    pub deferred: u32,
    /// Attempts another sweeper instance already held locked.
    pub skipped_locked: u32,
}

/// Versioned run record written after each sweep. Replaces a mutable
/// app-wide "last run" settings row; read-only to observability tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepStatus {
    pub version: u64,
    pub ran_at: DateTime<Utc>,
    pub report: SweepReport,
}
