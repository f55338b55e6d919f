use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use stayline_shared::Provider;

/// Provider-agnostic view of a payment's state. All provider payloads are
/// normalized into this shape by the adapter; the ledger and sweeper never
/// branch on provider identity beyond adapter lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderPaymentStatus {
    Succeeded,
    Failed,
    /// The provider has not reached a terminal answer yet.
    Pending,
}

#[derive(Debug, Clone)]
pub struct ProviderVerification {
    pub reference: String,
    pub status: ProviderPaymentStatus,
    pub payload: Value,
    pub tx_id: Option<String>,
}

/// A normalized inbound notification (webhook or poll result).
#[derive(Debug, Clone)]
pub struct ProviderNotification {
    pub provider: Provider,
    pub reference: String,
    pub status: ProviderPaymentStatus,
    pub payload: Value,
    pub tx_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request timed out")]
    Timeout,

    #[error("provider transport error: {0}")]
    Transport(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// One adapter per payment provider, translating provider-specific wire
/// shapes into the uniform verification result.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Ask the provider for the authoritative state of `reference`.
    async fn verify(&self, reference: &str) -> Result<ProviderVerification, ProviderError>;
}

/// Lookup table used by the sweeper and the manual reconcile path.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self { adapters: HashMap::new() }
    }

    pub fn register(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }
}
