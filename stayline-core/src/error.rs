use stayline_shared::BookingStatus;
use uuid::Uuid;

/// Failures surfaced by the durable store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Domain errors from the booking state machine. `code()` is the stable
/// machine-readable tag clients branch on.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("dates unavailable for unit {unit_id}")]
    DatesUnavailable { unit_id: Uuid },

    #[error("stay of {requested} nights is below the unit minimum of {minimum}")]
    NightsBelowMinimum { minimum: u32, requested: i64 },

    #[error("booking must be made at least {required_hours}h before check-in")]
    NoticeWindowViolated { required_hours: u32 },

    #[error("unit {unit_id} is not bookable in the requested mode")]
    UnitNotBookable { unit_id: Uuid },

    #[error("invalid date range")]
    InvalidRange,

    #[error("booking {0} not found")]
    NotFound(Uuid),

    #[error("actor is not allowed to modify this booking")]
    Forbidden,

    #[error("booking is {status:?} and cannot be transitioned")]
    InvalidStatus { status: BookingStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::DatesUnavailable { .. } => "DATES_UNAVAILABLE",
            BookingError::NightsBelowMinimum { .. } => "NIGHTS_BELOW_MINIMUM",
            BookingError::NoticeWindowViolated { .. } => "NOTICE_WINDOW_VIOLATED",
            BookingError::UnitNotBookable { .. } => "UNIT_NOT_BOOKABLE",
            BookingError::InvalidRange => "INVALID_RANGE",
            BookingError::NotFound(_) => "BOOKING_NOT_FOUND",
            BookingError::Forbidden => "FORBIDDEN",
            BookingError::InvalidStatus { .. } => "INVALID_STATUS",
            BookingError::Store(_) => "INTERNAL",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment attempt not found for reference {0}")]
    AttemptNotFound(String),

    #[error("no adapter registered for provider {0}")]
    UnknownProvider(String),

    #[error(transparent)]
    Provider(#[from] crate::provider::ProviderError),

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PaymentError {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::AttemptNotFound(_) => "ATTEMPT_NOT_FOUND",
            PaymentError::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            PaymentError::Provider(_) => "PROVIDER_ERROR",
            PaymentError::Booking(e) => e.code(),
            PaymentError::Store(_) => "INTERNAL",
        }
    }
}
