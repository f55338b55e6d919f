use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

use stayline_core::provider::{
    ProviderAdapter, ProviderError, ProviderPaymentStatus, ProviderVerification,
};
use stayline_shared::Provider;

/// Stand-in gateway for local runs and demos; real provider credentials
/// are wired per deployment. Unknown references report `Pending`, which
/// routes them to the reconciliation path instead of inventing an answer.
pub struct SandboxAdapter {
    provider: Provider,
    outcomes: Mutex<HashMap<String, ProviderPaymentStatus>>,
}

impl SandboxAdapter {
    pub fn new(provider: Provider) -> Self {
        Self { provider, outcomes: Mutex::new(HashMap::new()) }
    }

    /// Script the answer the sandbox will give for `reference`.
    pub fn resolve(&self, reference: &str, status: ProviderPaymentStatus) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.insert(reference.to_string(), status);
        }
    }
}

#[async_trait]
impl ProviderAdapter for SandboxAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn verify(&self, reference: &str) -> Result<ProviderVerification, ProviderError> {
        let status = self
            .outcomes
            .lock()
            .map_err(|_| ProviderError::Transport("sandbox state poisoned".to_string()))?
            .get(reference)
            .cloned()
            .unwrap_or(ProviderPaymentStatus::Pending);

        Ok(ProviderVerification {
            reference: reference.to_string(),
            status,
            payload: json!({"sandbox": true, "reference": reference}),
            tx_id: Some(format!("sandbox_{}", reference)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_reference_is_pending() {
        let adapter = SandboxAdapter::new(Provider::Stripe);
        let v = adapter.verify("never-seen").await.unwrap();
        assert_eq!(v.status, ProviderPaymentStatus::Pending);

        adapter.resolve("never-seen", ProviderPaymentStatus::Succeeded);
        let v = adapter.verify("never-seen").await.unwrap();
        assert_eq!(v.status, ProviderPaymentStatus::Succeeded);
    }
}
