use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use stayline_booking::CreateBooking;
use stayline_shared::{Booking, BookingMode, PaymentAttempt, Provider};

use crate::auth::actor_from_headers;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub unit_id: Uuid,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub mode: BookingMode,
    pub total_amount_minor: i64,
    pub currency: String,
    #[serde(default)]
    pub pricing_snapshot: Value,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub guest_id: Uuid,
    pub status: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub nights: i64,
    pub total_amount_minor: i64,
    pub currency: String,
    pub payment_reference: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingResponse {
    fn from_booking(b: Booking, today: NaiveDate) -> Self {
        Self {
            id: b.id,
            unit_id: b.unit_id,
            guest_id: b.guest_id,
            status: b.effective_status(today).as_str().to_string(),
            date_from: b.range.date_from,
            date_to: b.range.date_to,
            nights: b.nights,
            total_amount_minor: b.total_amount_minor,
            currency: b.currency,
            payment_reference: b.payment_reference,
            expires_at: b.expires_at,
            cancel_reason: b.cancel_reason,
            created_at: b.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub provider: Provider,
}

#[derive(Debug, Serialize)]
pub struct PaymentAttemptResponse {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider: Provider,
    pub provider_reference: String,
    pub status: String,
    pub amount_minor: i64,
    pub currency: String,
}

impl From<PaymentAttempt> for PaymentAttemptResponse {
    fn from(a: PaymentAttempt) -> Self {
        Self {
            id: a.id,
            booking_id: a.booking_id,
            provider: a.provider,
            provider_reference: a.provider_reference,
            status: a.status.as_str().to_string(),
            amount_minor: a.amount_total_minor,
            currency: a.currency,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/payments", post(initiate_payment))
}

async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let actor = actor_from_headers(&headers)?;
    let now = Utc::now();

    let booking = state
        .engine
        .create_booking(
            CreateBooking {
                unit_id: req.unit_id,
                guest_id: actor.id,
                date_from: req.date_from,
                date_to: req.date_to,
                mode: req.mode,
                total_amount_minor: req.total_amount_minor,
                currency: req.currency,
                pricing_snapshot: req.pricing_snapshot,
            },
            now,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::from_booking(booking, now.date_naive())),
    ))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.engine.get_booking(id).await?;
    Ok(Json(BookingResponse::from_booking(
        booking,
        Utc::now().date_naive(),
    )))
}

async fn list_bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let today = Utc::now().date_naive();
    let bookings = state.engine.list_for_guest(actor.id).await?;
    Ok(Json(
        bookings
            .into_iter()
            .map(|b| BookingResponse::from_booking(b, today))
            .collect(),
    ))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<CancelRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let reason = req.reason.unwrap_or_else(|| "cancelled_by_request".to_string());

    let booking = state.engine.cancel_booking(id, actor, &reason).await?;
    state.payments.handle_cancellation(&booking).await?;

    Ok(Json(BookingResponse::from_booking(
        booking,
        Utc::now().date_naive(),
    )))
}

async fn initiate_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentAttemptResponse>), AppError> {
    let actor = actor_from_headers(&headers)?;
    let booking = state.engine.get_booking(id).await?;
    if booking.guest_id != actor.id {
        return Err(AppError::Forbidden("booking belongs to another guest".to_string()));
    }

    let attempt = state.payments.initiate_payment(id, req.provider).await?;
    Ok((StatusCode::CREATED, Json(attempt.into())))
}
