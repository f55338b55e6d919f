pub mod booking;
pub mod events;
pub mod payment;
pub mod range;
pub mod sweep;
pub mod unit;

pub use booking::{Actor, ActorRole, Booking, BookingStatus};
pub use events::{dedupe_key, Audience, EventKind, NotificationEvent};
pub use payment::{PaymentAttempt, PaymentAttemptStatus, Provider};
pub use range::{BlockingRange, RangeSource, StayRange};
pub use sweep::{SweepReport, SweepStatus};
pub use unit::{Block, BlockReason, BookingMode, Unit};
