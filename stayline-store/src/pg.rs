use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use stayline_core::error::StoreError;
use stayline_core::store::{
    AttemptInsert, BookingStore, DispatchLog, InsertOutcome, MarkOutcome, PaymentLedgerStore,
    SweepStatusStore, TransitionOutcome, UnitDirectory,
};
use stayline_shared::{
    Block, BlockReason, Booking, BookingMode, BookingStatus, PaymentAttempt,
    PaymentAttemptStatus, Provider, StayRange, SweepReport, SweepStatus, Unit,
};

/// Postgres-backed store. Every conditional write is one SQL statement;
/// the database resolves races, not the application.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn sqlstate(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.code().map(|c| c.to_string()),
        _ => None,
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    unit_id: Uuid,
    guest_id: Uuid,
    host_id: Uuid,
    date_from: NaiveDate,
    date_to: NaiveDate,
    nights: i64,
    status: String,
    total_amount_minor: i64,
    currency: String,
    pricing_snapshot: Value,
    payment_reference: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, StoreError> {
        let status = BookingStatus::from_str(&self.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown booking status {}", self.status)))?;
        Ok(Booking {
            id: self.id,
            unit_id: self.unit_id,
            guest_id: self.guest_id,
            host_id: self.host_id,
            range: StayRange::new(self.date_from, self.date_to),
            nights: self.nights,
            status,
            total_amount_minor: self.total_amount_minor,
            currency: self.currency,
            pricing_snapshot: self.pricing_snapshot,
            payment_reference: self.payment_reference,
            expires_at: self.expires_at,
            cancel_reason: self.cancel_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: Uuid,
    booking_id: Uuid,
    provider: String,
    provider_reference: String,
    status: String,
    amount_total_minor: i64,
    currency: String,
    provider_payload: Value,
    provider_tx_id: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    last_verified_at: Option<DateTime<Utc>>,
    verify_attempts: i32,
    needs_reconcile: bool,
    reconcile_reason: Option<String>,
    reconcile_locked_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AttemptRow {
    fn into_attempt(self) -> Result<PaymentAttempt, StoreError> {
        let provider = Provider::from_str(&self.provider)
            .ok_or_else(|| StoreError::Backend(format!("unknown provider {}", self.provider)))?;
        let status = PaymentAttemptStatus::from_str(&self.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown attempt status {}", self.status)))?;
        Ok(PaymentAttempt {
            id: self.id,
            booking_id: self.booking_id,
            provider,
            provider_reference: self.provider_reference,
            status,
            amount_total_minor: self.amount_total_minor,
            currency: self.currency,
            provider_payload: self.provider_payload,
            provider_tx_id: self.provider_tx_id,
            confirmed_at: self.confirmed_at,
            last_verified_at: self.last_verified_at,
            verify_attempts: self.verify_attempts.max(0) as u32,
            needs_reconcile: self.needs_reconcile,
            reconcile_reason: self.reconcile_reason,
            reconcile_locked_until: self.reconcile_locked_until,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const BOOKING_COLS: &str = "id, unit_id, guest_id, host_id, date_from, date_to, nights, status, \
     total_amount_minor, currency, pricing_snapshot, payment_reference, expires_at, \
     cancel_reason, created_at, updated_at";

const ATTEMPT_COLS: &str = "id, booking_id, provider, provider_reference, status, \
     amount_total_minor, currency, provider_payload, provider_tx_id, confirmed_at, \
     last_verified_at, verify_attempts, needs_reconcile, reconcile_reason, \
     reconcile_locked_until, created_at, updated_at";

impl PgStore {
    async fn booking_status(&self, id: Uuid) -> Result<Option<BookingStatus>, StoreError> {
        let status: Option<(String,)> = sqlx::query_as("SELECT status FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match status {
            None => Ok(None),
            Some((s,)) => BookingStatus::from_str(&s)
                .map(Some)
                .ok_or_else(|| StoreError::Backend(format!("unknown booking status {}", s))),
        }
    }

    async fn fetch_attempt(
        &self,
        provider: Provider,
        reference: &str,
    ) -> Result<Option<PaymentAttempt>, StoreError> {
        let sql = format!(
            "SELECT {} FROM payment_attempts WHERE provider = $1 AND provider_reference = $2",
            ATTEMPT_COLS
        );
        let row: Option<AttemptRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(AttemptRow::into_attempt).transpose()
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn insert_if_free(&self, booking: &Booking) -> Result<InsertOutcome, StoreError> {
        let sql = "INSERT INTO bookings \
             (id, unit_id, guest_id, host_id, date_from, date_to, nights, status, \
              total_amount_minor, currency, pricing_snapshot, payment_reference, expires_at, \
              cancel_reason, created_at, updated_at) \
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM bookings \
                 WHERE unit_id = $2 AND status <> 'CANCELLED' \
                   AND date_from < $6 AND date_to > $5)";
        let result = sqlx::query(sql)
            .bind(booking.id)
            .bind(booking.unit_id)
            .bind(booking.guest_id)
            .bind(booking.host_id)
            .bind(booking.range.date_from)
            .bind(booking.range.date_to)
            .bind(booking.nights)
            .bind(booking.status.as_str())
            .bind(booking.total_amount_minor)
            .bind(&booking.currency)
            .bind(&booking.pricing_snapshot)
            .bind(&booking.payment_reference)
            .bind(booking.expires_at)
            .bind(&booking.cancel_reason)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(InsertOutcome::Inserted),
            Ok(_) => Ok(InsertOutcome::Overlap),
            // 23P01: the bookings_no_overlap exclusion constraint caught a
            // race the NOT EXISTS condition missed. Same domain outcome.
            Err(e) if sqlstate(&e).as_deref() == Some("23P01") => Ok(InsertOutcome::Overlap),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLS);
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn list_for_guest(&self, guest_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE guest_id = $1 ORDER BY created_at",
            BOOKING_COLS
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(guest_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn overlapping(
        &self,
        unit_id: Uuid,
        range: StayRange,
    ) -> Result<Vec<Booking>, StoreError> {
        let sql = format!(
            "SELECT {} FROM bookings \
             WHERE unit_id = $1 AND status <> 'CANCELLED' \
               AND date_from < $3 AND date_to > $2 \
             ORDER BY date_from",
            BOOKING_COLS
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(unit_id)
            .bind(range.date_from)
            .bind(range.date_to)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn confirm_if_pending(&self, id: Uuid) -> Result<TransitionOutcome, StoreError> {
        let sql = format!(
            "UPDATE bookings \
             SET status = 'CONFIRMED', expires_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = 'PENDING_PAYMENT' \
             RETURNING {}",
            BOOKING_COLS
        );
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => Ok(TransitionOutcome::Applied(r.into_booking()?)),
            None => match self.booking_status(id).await? {
                Some(status) => Ok(TransitionOutcome::WrongStatus(status)),
                None => Ok(TransitionOutcome::NotFound),
            },
        }
    }

    async fn cancel_if_active(
        &self,
        id: Uuid,
        reason: &str,
    ) -> Result<TransitionOutcome, StoreError> {
        let sql = format!(
            "UPDATE bookings \
             SET status = 'CANCELLED', cancel_reason = $2, updated_at = NOW() \
             WHERE id = $1 AND status IN ('PENDING_PAYMENT', 'CONFIRMED') \
             RETURNING {}",
            BOOKING_COLS
        );
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(reason)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => Ok(TransitionOutcome::Applied(r.into_booking()?)),
            None => match self.booking_status(id).await? {
                Some(status) => Ok(TransitionOutcome::WrongStatus(status)),
                None => Ok(TransitionOutcome::NotFound),
            },
        }
    }

    async fn cancel_expired(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<TransitionOutcome, StoreError> {
        let sql = format!(
            "UPDATE bookings \
             SET status = 'CANCELLED', cancel_reason = $3, updated_at = $2 \
             WHERE id = $1 AND status = 'PENDING_PAYMENT' \
               AND expires_at IS NOT NULL AND expires_at <= $2 \
             RETURNING {}",
            BOOKING_COLS
        );
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(now)
            .bind(reason)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => Ok(TransitionOutcome::Applied(r.into_booking()?)),
            None => match self.booking_status(id).await? {
                Some(status) => Ok(TransitionOutcome::WrongStatus(status)),
                None => Ok(TransitionOutcome::NotFound),
            },
        }
    }

    async fn set_payment_reference(&self, id: Uuid, reference: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE bookings SET payment_reference = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(reference)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, StoreError> {
        let sql = format!(
            "SELECT {} FROM bookings \
             WHERE status = 'PENDING_PAYMENT' AND expires_at IS NOT NULL AND expires_at <= $1 \
             ORDER BY expires_at",
            BOOKING_COLS
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }
}

#[derive(sqlx::FromRow)]
struct UnitRow {
    id: Uuid,
    host_id: Uuid,
    title: String,
    currency: String,
    mode: String,
    cancellation_policy: String,
    min_nights: i32,
    min_notice_hours: i32,
    hold_minutes: i32,
}

#[async_trait]
impl UnitDirectory for PgStore {
    async fn get_unit(&self, id: Uuid) -> Result<Option<Unit>, StoreError> {
        let row: Option<UnitRow> = sqlx::query_as(
            "SELECT id, host_id, title, currency, mode, cancellation_policy, min_nights, \
             min_notice_hours, hold_minutes FROM units WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            None => Ok(None),
            Some(r) => {
                let mode = match r.mode.as_str() {
                    "instant" => BookingMode::Instant,
                    "request" => BookingMode::Request,
                    other => {
                        return Err(StoreError::Backend(format!("unknown booking mode {}", other)))
                    }
                };
                Ok(Some(Unit {
                    id: r.id,
                    host_id: r.host_id,
                    title: r.title,
                    currency: r.currency,
                    mode,
                    cancellation_policy: r.cancellation_policy,
                    min_nights: r.min_nights.max(0) as u32,
                    min_notice_hours: r.min_notice_hours.max(0) as u32,
                    hold_minutes: r.hold_minutes.max(0) as u32,
                }))
            }
        }
    }

    async fn blocks_overlapping(
        &self,
        unit_id: Uuid,
        range: StayRange,
    ) -> Result<Vec<Block>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct BlockRow {
            id: Uuid,
            unit_id: Uuid,
            date_from: NaiveDate,
            date_to: NaiveDate,
            reason: String,
        }

        let rows: Vec<BlockRow> = sqlx::query_as(
            "SELECT id, unit_id, date_from, date_to, reason FROM blocks \
             WHERE unit_id = $1 AND date_from < $3 AND date_to > $2 \
             ORDER BY date_from",
        )
        .bind(unit_id)
        .bind(range.date_from)
        .bind(range.date_to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|r| {
                let reason = match r.reason.as_str() {
                    "host_block" => BlockReason::HostBlock,
                    "maintenance" => BlockReason::Maintenance,
                    other => {
                        return Err(StoreError::Backend(format!("unknown block reason {}", other)))
                    }
                };
                Ok(Block {
                    id: r.id,
                    unit_id: r.unit_id,
                    range: StayRange::new(r.date_from, r.date_to),
                    reason,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PaymentLedgerStore for PgStore {
    async fn insert_attempt(
        &self,
        attempt: &PaymentAttempt,
    ) -> Result<AttemptInsert, StoreError> {
        let sql = format!(
            "INSERT INTO payment_attempts \
             (id, booking_id, provider, provider_reference, status, amount_total_minor, \
              currency, provider_payload, provider_tx_id, confirmed_at, last_verified_at, \
              verify_attempts, needs_reconcile, reconcile_reason, reconcile_locked_until, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             ON CONFLICT ON CONSTRAINT payment_attempts_reference_key DO NOTHING \
             RETURNING {}",
            ATTEMPT_COLS
        );
        let row: Option<AttemptRow> = sqlx::query_as(&sql)
            .bind(attempt.id)
            .bind(attempt.booking_id)
            .bind(attempt.provider.as_str())
            .bind(&attempt.provider_reference)
            .bind(attempt.status.as_str())
            .bind(attempt.amount_total_minor)
            .bind(&attempt.currency)
            .bind(&attempt.provider_payload)
            .bind(&attempt.provider_tx_id)
            .bind(attempt.confirmed_at)
            .bind(attempt.last_verified_at)
            .bind(attempt.verify_attempts as i32)
            .bind(attempt.needs_reconcile)
            .bind(&attempt.reconcile_reason)
            .bind(attempt.reconcile_locked_until)
            .bind(attempt.created_at)
            .bind(attempt.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(r) => Ok(AttemptInsert::Inserted(r.into_attempt()?)),
            // Conflict: read and short-circuit to the original row.
            None => {
                let existing = self
                    .fetch_attempt(attempt.provider, &attempt.provider_reference)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Backend("attempt conflicted then vanished".to_string())
                    })?;
                Ok(AttemptInsert::Exists(existing))
            }
        }
    }

    async fn get_by_reference(
        &self,
        provider: Provider,
        reference: &str,
    ) -> Result<Option<PaymentAttempt>, StoreError> {
        self.fetch_attempt(provider, reference).await
    }

    async fn attempts_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<PaymentAttempt>, StoreError> {
        let sql = format!(
            "SELECT {} FROM payment_attempts WHERE booking_id = $1 ORDER BY created_at",
            ATTEMPT_COLS
        );
        let rows: Vec<AttemptRow> = sqlx::query_as(&sql)
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(AttemptRow::into_attempt).collect()
    }

    async fn mark_succeeded(
        &self,
        provider: Provider,
        reference: &str,
        payload: &Value,
        tx_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError> {
        let sql = format!(
            "UPDATE payment_attempts \
             SET status = 'SUCCEEDED', \
                 confirmed_at = COALESCE(confirmed_at, $4), \
                 provider_payload = $3, \
                 provider_tx_id = COALESCE($5, provider_tx_id), \
                 needs_reconcile = FALSE, \
                 reconcile_reason = NULL, \
                 reconcile_locked_until = NULL, \
                 updated_at = $4 \
             WHERE provider = $1 AND provider_reference = $2 AND status <> 'SUCCEEDED' \
             RETURNING {}",
            ATTEMPT_COLS
        );
        let row: Option<AttemptRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .bind(reference)
            .bind(payload)
            .bind(now)
            .bind(tx_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        if let Some(r) = row {
            return Ok(MarkOutcome::Applied(r.into_attempt()?));
        }

        // Already succeeded (refresh diagnostics only) or missing.
        let sql = format!(
            "UPDATE payment_attempts \
             SET provider_payload = $3, \
                 provider_tx_id = COALESCE($5, provider_tx_id), \
                 updated_at = $4 \
             WHERE provider = $1 AND provider_reference = $2 AND status = 'SUCCEEDED' \
             RETURNING {}",
            ATTEMPT_COLS
        );
        let row: Option<AttemptRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .bind(reference)
            .bind(payload)
            .bind(now)
            .bind(tx_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(r) => Ok(MarkOutcome::AlreadySucceeded(r.into_attempt()?)),
            None => Ok(MarkOutcome::NotFound),
        }
    }

    async fn mark_failed(
        &self,
        provider: Provider,
        reference: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError> {
        let sql = format!(
            "UPDATE payment_attempts \
             SET status = 'FAILED', \
                 reconcile_reason = $3, \
                 needs_reconcile = FALSE, \
                 reconcile_locked_until = NULL, \
                 updated_at = $4 \
             WHERE provider = $1 AND provider_reference = $2 AND status <> 'SUCCEEDED' \
             RETURNING {}",
            ATTEMPT_COLS
        );
        let row: Option<AttemptRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .bind(reference)
            .bind(reason)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        if let Some(r) = row {
            return Ok(MarkOutcome::Applied(r.into_attempt()?));
        }
        match self.fetch_attempt(provider, reference).await? {
            Some(a) if a.status == PaymentAttemptStatus::Succeeded => {
                Ok(MarkOutcome::AlreadySucceeded(a))
            }
            Some(_) => Ok(MarkOutcome::NotFound),
            None => Ok(MarkOutcome::NotFound),
        }
    }

    async fn flag_for_reconcile(
        &self,
        provider: Provider,
        reference: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE payment_attempts \
             SET needs_reconcile = TRUE, reconcile_reason = $3, updated_at = NOW() \
             WHERE provider = $1 AND provider_reference = $2 AND status = 'INITIATED'",
        )
        .bind(provider.as_str())
        .bind(reference)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn due_for_reconcile(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<PaymentAttempt>, StoreError> {
        let sql = format!(
            "SELECT {} FROM payment_attempts \
             WHERE needs_reconcile \
               AND (reconcile_locked_until IS NULL OR reconcile_locked_until <= $1) \
             ORDER BY created_at \
             LIMIT $2",
            ATTEMPT_COLS
        );
        let rows: Vec<AttemptRow> = sqlx::query_as(&sql)
            .bind(now)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(AttemptRow::into_attempt).collect()
    }

    async fn claim_for_reconcile(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let done = sqlx::query(
            "UPDATE payment_attempts \
             SET reconcile_locked_until = $3, updated_at = $2 \
             WHERE id = $1 AND needs_reconcile \
               AND (reconcile_locked_until IS NULL OR reconcile_locked_until <= $2)",
        )
        .bind(id)
        .bind(now)
        .bind(until)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(done.rows_affected() == 1)
    }

    async fn record_verify_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "UPDATE payment_attempts \
             SET verify_attempts = verify_attempts + 1, \
                 last_verified_at = $2, \
                 reconcile_locked_until = NULL, \
                 updated_at = $2 \
             WHERE id = $1 \
             RETURNING verify_attempts",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(|(n,)| n.max(0) as u32)
            .ok_or_else(|| StoreError::Backend(format!("attempt {} vanished", id)))
    }
}

#[async_trait]
impl DispatchLog for PgStore {
    async fn record_if_new(&self, key: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let done = sqlx::query(
            "INSERT INTO dispatch_log (dedupe_key, recorded_at) VALUES ($1, $2) \
             ON CONFLICT (dedupe_key) DO NOTHING",
        )
        .bind(key)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(done.rows_affected() == 1)
    }
}

#[async_trait]
impl SweepStatusStore for PgStore {
    async fn append(
        &self,
        report: &SweepReport,
        ran_at: DateTime<Utc>,
    ) -> Result<SweepStatus, StoreError> {
        let report_json = serde_json::to_value(report)?;
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO sweep_status (ran_at, report) VALUES ($1, $2) RETURNING version",
        )
        .bind(ran_at)
        .bind(&report_json)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(SweepStatus {
            version: row.0.max(0) as u64,
            ran_at,
            report: report.clone(),
        })
    }

    async fn latest(&self) -> Result<Option<SweepStatus>, StoreError> {
        let row: Option<(i64, DateTime<Utc>, Value)> = sqlx::query_as(
            "SELECT version, ran_at, report FROM sweep_status ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        match row {
            None => Ok(None),
            Some((version, ran_at, report)) => Ok(Some(SweepStatus {
                version: version.max(0) as u64,
                ran_at,
                report: serde_json::from_value(report)?,
            })),
        }
    }
}
