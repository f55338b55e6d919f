use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use stayline_booking::BookingEngine;
use stayline_core::error::PaymentError;
use stayline_core::provider::{
    AdapterRegistry, ProviderError, ProviderNotification, ProviderPaymentStatus,
    ProviderVerification,
};
use stayline_core::store::{PaymentLedgerStore, SweepStatusStore};
use stayline_payments::{NotificationOutcome, PaymentService};
use stayline_shared::{PaymentAttempt, Provider, SweepReport, SweepStatus};

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Exclusive claim window per attempt; a crashed sweeper's claims
    /// expire and the next run picks the work back up.
    pub lock_duration: chrono::Duration,
    pub max_verify_attempts: u32,
    /// Bounded timeout per provider verification call.
    pub verify_timeout: std::time::Duration,
    pub batch_limit: u32,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            lock_duration: chrono::Duration::seconds(120),
            max_verify_attempts: 8,
            verify_timeout: std::time::Duration::from_secs(5),
            batch_limit: 50,
        }
    }
}

enum AttemptResolution {
    Succeeded,
    Failed,
    Exhausted,
    Deferred,
}

/// Failure-recovery path for payments whose webhook never arrived (or
/// arrived malformed), plus the expiry pass for stale pending bookings.
/// Safe to run from several instances at once: every claim is a
/// conditional update on `reconcile_locked_until`.
pub struct ReconciliationSweeper {
    ledger: Arc<dyn PaymentLedgerStore>,
    status: Arc<dyn SweepStatusStore>,
    adapters: AdapterRegistry,
    payments: Arc<PaymentService>,
    engine: Arc<BookingEngine>,
    config: SweeperConfig,
}

impl ReconciliationSweeper {
    pub fn new(
        ledger: Arc<dyn PaymentLedgerStore>,
        status: Arc<dyn SweepStatusStore>,
        adapters: AdapterRegistry,
        payments: Arc<PaymentService>,
        engine: Arc<BookingEngine>,
        config: SweeperConfig,
    ) -> Self {
        Self { ledger, status, adapters, payments, engine, config }
    }

    /// One full pass: expire lapsed holds, then re-verify every due
    /// attempt against its provider. Writes a versioned status record.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepStatus, PaymentError> {
        let mut report = SweepReport::default();

        report.expired_bookings = self.engine.expire_stale(now).await?.len() as u32;

        let due = self.ledger.due_for_reconcile(now, self.config.batch_limit).await?;
        for attempt in due {
            report.attempts_scanned += 1;

            let until = now + self.config.lock_duration;
            if !self.ledger.claim_for_reconcile(attempt.id, now, until).await? {
                report.skipped_locked += 1;
                continue;
            }

            match self.verify_and_apply(&attempt, now).await? {
                AttemptResolution::Succeeded => report.verified_succeeded += 1,
                AttemptResolution::Failed => report.verified_failed += 1,
                AttemptResolution::Exhausted => report.verify_exhausted += 1,
                AttemptResolution::Deferred => report.deferred += 1,
            }
        }

        let status = self.status.append(&report, now).await?;
        info!(
            version = status.version,
            expired = report.expired_bookings,
            scanned = report.attempts_scanned,
            succeeded = report.verified_succeeded,
            failed = report.verified_failed,
            exhausted = report.verify_exhausted,
            deferred = report.deferred,
            "reconciliation sweep completed"
        );
        Ok(status)
    }

    /// Manual reconcile of one reference, for the admin surface. Verifies
    /// immediately instead of waiting for the next sweep.
    pub async fn reconcile_reference(
        &self,
        provider: Provider,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<NotificationOutcome, PaymentError> {
        let attempt = self
            .ledger
            .get_by_reference(provider, reference)
            .await?
            .ok_or_else(|| PaymentError::AttemptNotFound(reference.to_string()))?;

        let verification = self.verify(&attempt).await?;
        self.payments
            .apply_notification(
                ProviderNotification {
                    provider,
                    reference: attempt.provider_reference.clone(),
                    status: verification.status,
                    payload: verification.payload,
                    tx_id: verification.tx_id,
                },
                now,
            )
            .await
    }

    async fn verify(
        &self,
        attempt: &PaymentAttempt,
    ) -> Result<ProviderVerification, PaymentError> {
        let adapter = self
            .adapters
            .get(attempt.provider)
            .ok_or_else(|| PaymentError::UnknownProvider(attempt.provider.as_str().to_string()))?;

        match tokio::time::timeout(
            self.config.verify_timeout,
            adapter.verify(&attempt.provider_reference),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProviderError::Timeout.into()),
        }
    }

    async fn verify_and_apply(
        &self,
        attempt: &PaymentAttempt,
        now: DateTime<Utc>,
    ) -> Result<AttemptResolution, PaymentError> {
        let verification = match self.verify(attempt).await {
            Ok(v) => v,
            Err(PaymentError::Provider(e)) => {
                warn!(
                    reference = %attempt.provider_reference,
                    error = %e,
                    "provider verification failed, deferring"
                );
                return self.record_setback(attempt, now).await;
            }
            Err(e) => return Err(e),
        };

        match verification.status {
            ProviderPaymentStatus::Succeeded | ProviderPaymentStatus::Failed => {
                let resolution = match verification.status {
                    ProviderPaymentStatus::Succeeded => AttemptResolution::Succeeded,
                    _ => AttemptResolution::Failed,
                };
                self.payments
                    .apply_notification(
                        ProviderNotification {
                            provider: attempt.provider,
                            reference: attempt.provider_reference.clone(),
                            status: verification.status,
                            payload: verification.payload,
                            tx_id: verification.tx_id,
                        },
                        now,
                    )
                    .await?;
                Ok(resolution)
            }
            // Still not terminal at the provider: count a try and leave
            // the attempt for the next sweep.
            ProviderPaymentStatus::Pending => self.record_setback(attempt, now).await,
        }
    }

    async fn record_setback(
        &self,
        attempt: &PaymentAttempt,
        now: DateTime<Utc>,
    ) -> Result<AttemptResolution, PaymentError> {
        let tries = self.ledger.record_verify_failure(attempt.id, now).await?;
        if tries >= self.config.max_verify_attempts {
            warn!(
                reference = %attempt.provider_reference,
                tries,
                "verification budget exhausted, failing attempt terminally"
            );
            self.ledger
                .mark_failed(attempt.provider, &attempt.provider_reference, "verify_exhausted", now)
                .await?;
            Ok(AttemptResolution::Exhausted)
        } else {
            Ok(AttemptResolution::Deferred)
        }
    }
}
