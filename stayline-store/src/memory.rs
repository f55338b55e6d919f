use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use stayline_core::error::StoreError;
use stayline_core::store::{
    AttemptInsert, BookingStore, DispatchLog, InsertOutcome, MarkOutcome, PaymentLedgerStore,
    SweepStatusStore, TransitionOutcome, UnitDirectory,
};
use stayline_shared::{
    Block, Booking, BookingStatus, PaymentAttempt, PaymentAttemptStatus, Provider, StayRange,
    SweepReport, SweepStatus, Unit,
};

#[derive(Default)]
struct Inner {
    units: HashMap<Uuid, Unit>,
    blocks: Vec<Block>,
    bookings: HashMap<Uuid, Booking>,
    attempts: HashMap<Uuid, PaymentAttempt>,
    attempt_refs: HashMap<(Provider, String), Uuid>,
    dispatched: HashMap<String, DateTime<Utc>>,
    sweeps: Vec<SweepStatus>,
}

/// In-process store with the same conditional-write semantics as the
/// Postgres implementation: every primitive runs under one lock
/// acquisition, so it is atomic with respect to concurrent callers.
/// Backs tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&self, unit: Unit) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.units.insert(unit.id, unit);
        }
    }

    pub fn add_block(&self, block: Block) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.blocks.push(block);
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_if_free(&self, booking: &Booking) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.guard()?;
        let taken = inner.bookings.values().any(|b| {
            b.unit_id == booking.unit_id
                && b.status.blocks_dates()
                && b.range.overlaps(&booking.range)
        });
        if taken {
            return Ok(InsertOutcome::Overlap);
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.guard()?.bookings.get(&id).cloned())
    }

    async fn list_for_guest(&self, guest_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let mut out: Vec<Booking> = self
            .guard()?
            .bookings
            .values()
            .filter(|b| b.guest_id == guest_id)
            .cloned()
            .collect();
        out.sort_by_key(|b| b.created_at);
        Ok(out)
    }

    async fn overlapping(
        &self,
        unit_id: Uuid,
        range: StayRange,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut out: Vec<Booking> = self
            .guard()?
            .bookings
            .values()
            .filter(|b| b.unit_id == unit_id && b.status.blocks_dates() && b.range.overlaps(&range))
            .cloned()
            .collect();
        out.sort_by_key(|b| b.range.date_from);
        Ok(out)
    }

    async fn confirm_if_pending(&self, id: Uuid) -> Result<TransitionOutcome, StoreError> {
        let mut inner = self.guard()?;
        match inner.bookings.get_mut(&id) {
            None => Ok(TransitionOutcome::NotFound),
            Some(b) if b.status == BookingStatus::PendingPayment => {
                b.status = BookingStatus::Confirmed;
                b.expires_at = None;
                b.updated_at = Utc::now();
                Ok(TransitionOutcome::Applied(b.clone()))
            }
            Some(b) => Ok(TransitionOutcome::WrongStatus(b.status)),
        }
    }

    async fn cancel_if_active(
        &self,
        id: Uuid,
        reason: &str,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut inner = self.guard()?;
        match inner.bookings.get_mut(&id) {
            None => Ok(TransitionOutcome::NotFound),
            Some(b)
                if matches!(
                    b.status,
                    BookingStatus::PendingPayment | BookingStatus::Confirmed
                ) =>
            {
                b.status = BookingStatus::Cancelled;
                b.cancel_reason = Some(reason.to_string());
                b.updated_at = Utc::now();
                Ok(TransitionOutcome::Applied(b.clone()))
            }
            Some(b) => Ok(TransitionOutcome::WrongStatus(b.status)),
        }
    }

    async fn cancel_expired(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut inner = self.guard()?;
        match inner.bookings.get_mut(&id) {
            None => Ok(TransitionOutcome::NotFound),
            Some(b)
                if b.status == BookingStatus::PendingPayment
                    && b.expires_at.is_some_and(|at| at <= now) =>
            {
                b.status = BookingStatus::Cancelled;
                b.cancel_reason = Some(reason.to_string());
                b.updated_at = now;
                Ok(TransitionOutcome::Applied(b.clone()))
            }
            Some(b) => Ok(TransitionOutcome::WrongStatus(b.status)),
        }
    }

    async fn set_payment_reference(&self, id: Uuid, reference: &str) -> Result<(), StoreError> {
        let mut inner = self.guard()?;
        if let Some(b) = inner.bookings.get_mut(&id) {
            b.payment_reference = Some(reference.to_string());
            b.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, StoreError> {
        let mut out: Vec<Booking> = self
            .guard()?
            .bookings
            .values()
            .filter(|b| {
                b.status == BookingStatus::PendingPayment
                    && b.expires_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        out.sort_by_key(|b| b.expires_at);
        Ok(out)
    }
}

#[async_trait]
impl UnitDirectory for MemoryStore {
    async fn get_unit(&self, id: Uuid) -> Result<Option<Unit>, StoreError> {
        Ok(self.guard()?.units.get(&id).cloned())
    }

    async fn blocks_overlapping(
        &self,
        unit_id: Uuid,
        range: StayRange,
    ) -> Result<Vec<Block>, StoreError> {
        Ok(self
            .guard()?
            .blocks
            .iter()
            .filter(|b| b.unit_id == unit_id && b.range.overlaps(&range))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentLedgerStore for MemoryStore {
    async fn insert_attempt(
        &self,
        attempt: &PaymentAttempt,
    ) -> Result<AttemptInsert, StoreError> {
        let mut inner = self.guard()?;
        let key = (attempt.provider, attempt.provider_reference.clone());
        if let Some(existing_id) = inner.attempt_refs.get(&key) {
            let existing = inner
                .attempts
                .get(existing_id)
                .cloned()
                .ok_or_else(|| StoreError::Backend("dangling attempt reference".to_string()))?;
            return Ok(AttemptInsert::Exists(existing));
        }
        inner.attempt_refs.insert(key, attempt.id);
        inner.attempts.insert(attempt.id, attempt.clone());
        Ok(AttemptInsert::Inserted(attempt.clone()))
    }

    async fn get_by_reference(
        &self,
        provider: Provider,
        reference: &str,
    ) -> Result<Option<PaymentAttempt>, StoreError> {
        let inner = self.guard()?;
        Ok(inner
            .attempt_refs
            .get(&(provider, reference.to_string()))
            .and_then(|id| inner.attempts.get(id))
            .cloned())
    }

    async fn attempts_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<PaymentAttempt>, StoreError> {
        let mut out: Vec<PaymentAttempt> = self
            .guard()?
            .attempts
            .values()
            .filter(|a| a.booking_id == booking_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.created_at);
        Ok(out)
    }

    async fn mark_succeeded(
        &self,
        provider: Provider,
        reference: &str,
        payload: &Value,
        tx_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError> {
        let mut inner = self.guard()?;
        let id = match inner.attempt_refs.get(&(provider, reference.to_string())) {
            Some(id) => *id,
            None => return Ok(MarkOutcome::NotFound),
        };
        let attempt = inner
            .attempts
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend("dangling attempt reference".to_string()))?;

        if attempt.status == PaymentAttemptStatus::Succeeded {
            // Diagnostic fields are last-write-wins; confirmed_at is not.
            attempt.provider_payload = payload.clone();
            if let Some(tx) = tx_id {
                attempt.provider_tx_id = Some(tx.to_string());
            }
            attempt.updated_at = now;
            return Ok(MarkOutcome::AlreadySucceeded(attempt.clone()));
        }

        attempt.status = PaymentAttemptStatus::Succeeded;
        attempt.confirmed_at.get_or_insert(now);
        attempt.provider_payload = payload.clone();
        if let Some(tx) = tx_id {
            attempt.provider_tx_id = Some(tx.to_string());
        }
        attempt.needs_reconcile = false;
        attempt.reconcile_reason = None;
        attempt.reconcile_locked_until = None;
        attempt.updated_at = now;
        Ok(MarkOutcome::Applied(attempt.clone()))
    }

    async fn mark_failed(
        &self,
        provider: Provider,
        reference: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError> {
        let mut inner = self.guard()?;
        let id = match inner.attempt_refs.get(&(provider, reference.to_string())) {
            Some(id) => *id,
            None => return Ok(MarkOutcome::NotFound),
        };
        let attempt = inner
            .attempts
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend("dangling attempt reference".to_string()))?;

        if attempt.status == PaymentAttemptStatus::Succeeded {
            return Ok(MarkOutcome::AlreadySucceeded(attempt.clone()));
        }

        attempt.status = PaymentAttemptStatus::Failed;
        attempt.reconcile_reason = Some(reason.to_string());
        attempt.needs_reconcile = false;
        attempt.reconcile_locked_until = None;
        attempt.updated_at = now;
        Ok(MarkOutcome::Applied(attempt.clone()))
    }

    async fn flag_for_reconcile(
        &self,
        provider: Provider,
        reference: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.guard()?;
        let id = match inner.attempt_refs.get(&(provider, reference.to_string())) {
            Some(id) => *id,
            None => return Ok(()),
        };
        if let Some(attempt) = inner.attempts.get_mut(&id) {
            if attempt.status == PaymentAttemptStatus::Initiated {
                attempt.needs_reconcile = true;
                attempt.reconcile_reason = Some(reason.to_string());
                attempt.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn due_for_reconcile(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<PaymentAttempt>, StoreError> {
        let mut out: Vec<PaymentAttempt> = self
            .guard()?
            .attempts
            .values()
            .filter(|a| {
                a.needs_reconcile
                    && a.reconcile_locked_until.is_none_or(|until| until <= now)
            })
            .cloned()
            .collect();
        out.sort_by_key(|a| a.created_at);
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn claim_for_reconcile(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.guard()?;
        match inner.attempts.get_mut(&id) {
            Some(a)
                if a.needs_reconcile
                    && a.reconcile_locked_until.is_none_or(|lock| lock <= now) =>
            {
                a.reconcile_locked_until = Some(until);
                a.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_verify_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let mut inner = self.guard()?;
        let attempt = inner
            .attempts
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("attempt {} vanished", id)))?;
        attempt.verify_attempts += 1;
        attempt.last_verified_at = Some(now);
        attempt.reconcile_locked_until = None;
        attempt.updated_at = now;
        Ok(attempt.verify_attempts)
    }
}

#[async_trait]
impl DispatchLog for MemoryStore {
    async fn record_if_new(&self, key: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.guard()?;
        if inner.dispatched.contains_key(key) {
            return Ok(false);
        }
        inner.dispatched.insert(key.to_string(), now);
        Ok(true)
    }
}

#[async_trait]
impl SweepStatusStore for MemoryStore {
    async fn append(
        &self,
        report: &SweepReport,
        ran_at: DateTime<Utc>,
    ) -> Result<SweepStatus, StoreError> {
        let mut inner = self.guard()?;
        let version = inner.sweeps.last().map(|s| s.version + 1).unwrap_or(1);
        let status = SweepStatus { version, ran_at, report: report.clone() };
        inner.sweeps.push(status.clone());
        Ok(status)
    }

    async fn latest(&self) -> Result<Option<SweepStatus>, StoreError> {
        Ok(self.guard()?.sweeps.last().cloned())
    }
}
