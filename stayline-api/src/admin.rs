use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use stayline_payments::NotificationOutcome;
use stayline_shared::{Provider, SweepStatus};

use crate::auth::require_admin;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReconcileQuery {
    pub provider: Provider,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/reconcile/sweep", post(trigger_sweep))
        .route("/v1/admin/reconcile/status", get(sweep_status))
        .route("/v1/admin/reconcile/{reference}", post(reconcile_reference))
}

/// POST /v1/admin/reconcile/{reference}?provider=stripe
///
/// Verify one attempt against its provider right now instead of waiting
/// for the next sweep. Support uses this when a guest reports a charge
/// the dashboard does not show.
async fn reconcile_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Query(q): Query<ReconcileQuery>,
    headers: HeaderMap,
) -> Result<Json<NotificationOutcome>, AppError> {
    let actor = require_admin(&headers)?;
    tracing::info!(
        admin = %actor.id,
        provider = q.provider.as_str(),
        reference = %reference,
        "manual reconcile requested"
    );

    let outcome = state
        .sweeper
        .reconcile_reference(q.provider, &reference, Utc::now())
        .await?;
    Ok(Json(outcome))
}

/// POST /v1/admin/reconcile/sweep
async fn trigger_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepStatus>, AppError> {
    let actor = require_admin(&headers)?;
    tracing::info!(admin = %actor.id, "manual sweep requested");

    let status = state.sweeper.run_once(Utc::now()).await?;
    Ok(Json(status))
}

/// GET /v1/admin/reconcile/status
async fn sweep_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepStatus>, AppError> {
    require_admin(&headers)?;

    state
        .sweep_status
        .latest()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no sweep has run yet".to_string()))
}
