use std::sync::Arc;

use stayline_booking::{AvailabilityView, BookingEngine};
use stayline_core::store::SweepStatusStore;
use stayline_payments::PaymentService;
use stayline_sweeper::ReconciliationSweeper;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
    pub payments: Arc<PaymentService>,
    pub sweeper: Arc<ReconciliationSweeper>,
    pub availability: Arc<AvailabilityView>,
    pub sweep_status: Arc<dyn SweepStatusStore>,
}
