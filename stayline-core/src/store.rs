use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use stayline_shared::{
    Block, Booking, BookingStatus, PaymentAttempt, Provider, StayRange, SweepReport, SweepStatus,
    Unit,
};
use uuid::Uuid;

use crate::error::StoreError;

/// Result of the atomic "insert if no overlap" reservation write.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An overlapping non-cancelled booking already holds the dates.
    Overlap,
}

/// Result of a conditional booking status update.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied(Booking),
    /// Precondition not met; carries the status actually found.
    WrongStatus(BookingStatus),
    NotFound,
}

/// Durable booking aggregate access. Every mutation is a single
/// conditional write at the store level; callers never read-then-write.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert `booking` only if no booking in a date-blocking status
    /// overlaps its range on the same unit. One atomic statement.
    async fn insert_if_free(&self, booking: &Booking) -> Result<InsertOutcome, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn list_for_guest(&self, guest_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    /// Committed bookings in date-blocking statuses overlapping `range`.
    async fn overlapping(&self, unit_id: Uuid, range: StayRange)
        -> Result<Vec<Booking>, StoreError>;

    /// `pending_payment -> confirmed`, clearing `expires_at`. Already
    /// confirmed reports `WrongStatus(Confirmed)` so callers can treat
    /// retries as no-ops.
    async fn confirm_if_pending(&self, id: Uuid) -> Result<TransitionOutcome, StoreError>;

    /// `{pending_payment, confirmed} -> cancelled` with a reason.
    async fn cancel_if_active(
        &self,
        id: Uuid,
        reason: &str,
    ) -> Result<TransitionOutcome, StoreError>;

    /// `pending_payment -> cancelled`, but only while the hold is still
    /// lapsed (`expires_at <= now`). A booking confirmed between the
    /// expiry scan and this call reports `WrongStatus` and is left alone.
    async fn cancel_expired(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<TransitionOutcome, StoreError>;

    async fn set_payment_reference(&self, id: Uuid, reference: &str) -> Result<(), StoreError>;

    /// `pending_payment` bookings whose hold lapsed at or before `now`.
    async fn expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, StoreError>;
}

/// Unit and block data, owned by listing management. Read-only here.
#[async_trait]
pub trait UnitDirectory: Send + Sync {
    async fn get_unit(&self, id: Uuid) -> Result<Option<Unit>, StoreError>;

    async fn blocks_overlapping(
        &self,
        unit_id: Uuid,
        range: StayRange,
    ) -> Result<Vec<Block>, StoreError>;
}

/// Result of the idempotent attempt insert.
#[derive(Debug)]
pub enum AttemptInsert {
    Inserted(PaymentAttempt),
    /// The reference already existed; the original row, unchanged.
    Exists(PaymentAttempt),
}

impl AttemptInsert {
    pub fn into_attempt(self) -> PaymentAttempt {
        match self {
            AttemptInsert::Inserted(a) | AttemptInsert::Exists(a) => a,
        }
    }
}

/// Result of a conditional success/failure marking.
#[derive(Debug)]
pub enum MarkOutcome {
    Applied(PaymentAttempt),
    /// Attempt was already `succeeded`; the stored row with its original
    /// `confirmed_at`.
    AlreadySucceeded(PaymentAttempt),
    NotFound,
}

/// Durable payment-attempt ledger keyed by `(provider, provider_reference)`.
#[async_trait]
pub trait PaymentLedgerStore: Send + Sync {
    /// Insert, or return the existing row on a reference conflict.
    async fn insert_attempt(&self, attempt: &PaymentAttempt)
        -> Result<AttemptInsert, StoreError>;

    async fn get_by_reference(
        &self,
        provider: Provider,
        reference: &str,
    ) -> Result<Option<PaymentAttempt>, StoreError>;

    async fn attempts_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<PaymentAttempt>, StoreError>;

    /// Atomic: set `succeeded`, stamp `confirmed_at` only if currently
    /// null, clear the reconcile fields. If already succeeded, update only
    /// the diagnostic fields (`provider_payload`, `provider_tx_id`).
    async fn mark_succeeded(
        &self,
        provider: Provider,
        reference: &str,
        payload: &Value,
        tx_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError>;

    /// Atomic: set `failed` with a reason and clear the reconcile fields.
    /// Never overwrites `succeeded`.
    async fn mark_failed(
        &self,
        provider: Provider,
        reference: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError>;

    /// Route an attempt to the sweeper: set `needs_reconcile` with a
    /// reason, unless the attempt is already terminal.
    async fn flag_for_reconcile(
        &self,
        provider: Provider,
        reference: &str,
        reason: &str,
    ) -> Result<(), StoreError>;

    /// Attempts with `needs_reconcile = true` whose lock is null or
    /// expired at `now`.
    async fn due_for_reconcile(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<PaymentAttempt>, StoreError>;

    /// Conditional lock claim: succeeds only if `reconcile_locked_until`
    /// is null or in the past. Safe with multiple sweeper instances.
    async fn claim_for_reconcile(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Verification did not reach a terminal answer: bump
    /// `verify_attempts`, stamp `last_verified_at`, release the lock,
    /// keep `needs_reconcile`. Returns the new attempt count.
    async fn record_verify_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreError>;
}

/// Exactly-once side-effect bookkeeping.
#[async_trait]
pub trait DispatchLog: Send + Sync {
    /// Record `key` if unseen; `false` means it was already recorded and
    /// the side effect must be skipped.
    async fn record_if_new(&self, key: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;
}

/// Versioned sweeper run records.
#[async_trait]
pub trait SweepStatusStore: Send + Sync {
    async fn append(
        &self,
        report: &SweepReport,
        ran_at: DateTime<Utc>,
    ) -> Result<SweepStatus, StoreError>;

    async fn latest(&self) -> Result<Option<SweepStatus>, StoreError>;
}
