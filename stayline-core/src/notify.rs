use async_trait::async_trait;
use stayline_shared::{Audience, NotificationEvent};

use crate::error::StoreError;

/// Delivery transport for notifications. Push/email transport is an
/// external collaborator; this seam only guarantees each event reaches it
/// once per audience.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(
        &self,
        event: &NotificationEvent,
        audience: Audience,
    ) -> Result<(), StoreError>;
}

/// Default sink: structured log line per delivery. Stands in for the real
/// transport in local runs.
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(
        &self,
        event: &NotificationEvent,
        audience: Audience,
    ) -> Result<(), StoreError> {
        tracing::info!(
            booking_id = %event.booking_id,
            kind = event.kind.as_str(),
            audience = audience.as_str(),
            amount_minor = event.amount_minor,
            currency = %event.currency,
            "notification dispatched"
        );
        Ok(())
    }
}
