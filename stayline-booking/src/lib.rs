pub mod availability;
pub mod engine;

pub use availability::AvailabilityView;
pub use engine::{BookingEngine, ConfirmOutcome, CreateBooking};
