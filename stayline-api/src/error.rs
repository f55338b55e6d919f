use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use stayline_core::{BookingError, PaymentError};

#[derive(Debug)]
pub enum AppError {
    Booking(BookingError),
    Payment(PaymentError),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Anyhow(anyhow::Error),
}

fn booking_status(e: &BookingError) -> StatusCode {
    match e {
        BookingError::DatesUnavailable { .. } | BookingError::InvalidStatus { .. } => {
            StatusCode::CONFLICT
        }
        BookingError::NightsBelowMinimum { .. }
        | BookingError::NoticeWindowViolated { .. }
        | BookingError::UnitNotBookable { .. }
        | BookingError::InvalidRange => StatusCode::BAD_REQUEST,
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::Forbidden => StatusCode::FORBIDDEN,
        BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Booking(e) => (booking_status(&e), e.code(), e.to_string()),
            AppError::Payment(e) => {
                let status = match &e {
                    PaymentError::AttemptNotFound(_) => StatusCode::NOT_FOUND,
                    PaymentError::UnknownProvider(_) => StatusCode::BAD_REQUEST,
                    PaymentError::Provider(_) => StatusCode::BAD_GATEWAY,
                    PaymentError::Booking(b) => booking_status(b),
                    PaymentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.code(), e.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Anyhow(err) => {
                tracing::error!("internal server error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                )
            }
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(code, "request failed: {}", message);
        }

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        Self::Booking(e)
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        Self::Payment(e)
    }
}

impl From<stayline_core::StoreError> for AppError {
    fn from(e: stayline_core::StoreError) -> Self {
        Self::Anyhow(e.into())
    }
}
