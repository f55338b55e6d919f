use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Stripe,
    Paystack,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::Paystack => "paystack",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "stripe" => Some(Provider::Stripe),
            "paystack" => Some(Provider::Paystack),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentAttemptStatus {
    Initiated,
    Succeeded,
    Failed,
}

impl PaymentAttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentAttemptStatus::Initiated => "INITIATED",
            PaymentAttemptStatus::Succeeded => "SUCCEEDED",
            PaymentAttemptStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INITIATED" => Some(PaymentAttemptStatus::Initiated),
            "SUCCEEDED" => Some(PaymentAttemptStatus::Succeeded),
            "FAILED" => Some(PaymentAttemptStatus::Failed),
            _ => None,
        }
    }
}

/// One payment attempt per `(provider, provider_reference)` pair.
/// `provider_reference` is the idempotency anchor: deterministic, unique,
/// never reused. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider: Provider,
    pub provider_reference: String,
    pub status: PaymentAttemptStatus,
    pub amount_total_minor: i64,
    pub currency: String,
    /// Raw provider notification body, kept for diagnostics only.
    pub provider_payload: Value,
    pub provider_tx_id: Option<String>,
    /// Set exactly once, never cleared.
    pub confirmed_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub verify_attempts: u32,
    pub needs_reconcile: bool,
    pub reconcile_reason: Option<String>,
    pub reconcile_locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentAttempt {
    pub fn new(
        booking_id: Uuid,
        provider: Provider,
        provider_reference: String,
        amount_total_minor: i64,
        currency: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            provider,
            provider_reference,
            status: PaymentAttemptStatus::Initiated,
            amount_total_minor,
            currency,
            provider_payload: Value::Null,
            provider_tx_id: None,
            confirmed_at: None,
            last_verified_at: None,
            verify_attempts: 0,
            needs_reconcile: false,
            reconcile_reason: None,
            reconcile_locked_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Deterministic reference for the `seq`-th attempt on a booking.
    pub fn reference_for(booking_id: Uuid, seq: u32) -> String {
        format!("{}-{}", booking_id.simple(), seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_is_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(
            PaymentAttempt::reference_for(id, 1),
            PaymentAttempt::reference_for(id, 1)
        );
        assert_ne!(
            PaymentAttempt::reference_for(id, 1),
            PaymentAttempt::reference_for(id, 2)
        );
    }
}
