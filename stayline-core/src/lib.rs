pub mod error;
pub mod notify;
pub mod provider;
pub mod store;

pub use error::{BookingError, PaymentError, StoreError};
