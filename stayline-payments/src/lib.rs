pub mod dispatch;
pub mod ledger;
pub mod sandbox;

pub use dispatch::SideEffectDispatcher;
pub use ledger::{NotificationOutcome, PaymentService};
pub use sandbox::SandboxAdapter;
