use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use stayline_core::provider::{ProviderNotification, ProviderPaymentStatus};
use stayline_payments::NotificationOutcome;
use stayline_shared::Provider;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StripeWebhook {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: StripeWebhookData,
}

#[derive(Debug, Deserialize)]
pub struct StripeWebhookData {
    pub object: StripeIntentObject,
}

#[derive(Debug, Deserialize)]
pub struct StripeIntentObject {
    pub id: String,
    pub status: String,
    pub metadata: Option<StripeMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct StripeMetadata {
    /// Our `provider_reference`, set on the intent at creation.
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaystackWebhook {
    pub event: String,
    pub data: PaystackChargeData,
}

#[derive(Debug, Deserialize)]
pub struct PaystackChargeData {
    /// Merchant-supplied reference, ours verbatim.
    pub reference: String,
    pub id: Option<i64>,
    pub status: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/webhooks/payments/stripe", post(handle_stripe_webhook))
        .route("/v1/webhooks/payments/paystack", post(handle_paystack_webhook))
}

/// POST /v1/webhooks/payments/stripe
///
/// Signature verification happens at the edge gateway; by the time a
/// payload lands here it is trusted but may be a duplicate or arrive
/// out of order.
async fn handle_stripe_webhook(
    State(state): State<AppState>,
    Json(payload): Json<StripeWebhook>,
) -> Result<Response, AppError> {
    tracing::info!(
        event = %payload.type_,
        intent = %payload.data.object.id,
        "stripe webhook received"
    );

    let status = match payload.type_.as_str() {
        "payment_intent.succeeded" => ProviderPaymentStatus::Succeeded,
        "payment_intent.payment_failed" | "payment_intent.canceled" => {
            ProviderPaymentStatus::Failed
        }
        // Event types we do not act on still get a 200 so Stripe stops
        // retrying them.
        other => {
            tracing::debug!(event = other, "ignoring unhandled stripe event type");
            return Ok(StatusCode::OK.into_response());
        }
    };

    let reference = payload
        .data
        .object
        .metadata
        .as_ref()
        .and_then(|m| m.reference.clone())
        .ok_or_else(|| AppError::BadRequest("missing metadata.reference".to_string()))?;

    let raw = serde_json::json!({
        "intent_id": payload.data.object.id,
        "intent_status": payload.data.object.status,
        "event_type": payload.type_,
        "event_id": payload.id,
    });

    apply(&state, Provider::Stripe, reference, status, raw, Some(payload.data.object.id)).await
}

/// POST /v1/webhooks/payments/paystack
async fn handle_paystack_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaystackWebhook>,
) -> Result<Response, AppError> {
    tracing::info!(
        event = %payload.event,
        reference = %payload.data.reference,
        "paystack webhook received"
    );

    let status = match (payload.event.as_str(), payload.data.status.as_str()) {
        ("charge.success", "success") => ProviderPaymentStatus::Succeeded,
        ("charge.failed", _) | (_, "failed") | (_, "abandoned") => ProviderPaymentStatus::Failed,
        // Paystack sends non-terminal states for some channels (e.g.
        // bank transfers pending settlement).
        _ => ProviderPaymentStatus::Pending,
    };

    let tx_id = payload.data.id.map(|id| id.to_string());
    let raw = serde_json::json!({
        "event": payload.event,
        "charge_status": payload.data.status,
        "charge_id": payload.data.id,
    });

    apply(&state, Provider::Paystack, payload.data.reference, status, raw, tx_id).await
}

async fn apply(
    state: &AppState,
    provider: Provider,
    reference: String,
    status: ProviderPaymentStatus,
    payload: Value,
    tx_id: Option<String>,
) -> Result<Response, AppError> {
    let outcome: NotificationOutcome = state
        .payments
        .apply_notification(
            ProviderNotification { provider, reference, status, payload, tx_id },
            chrono::Utc::now(),
        )
        .await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}
