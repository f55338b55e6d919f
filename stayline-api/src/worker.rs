use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::error;

use stayline_sweeper::ReconciliationSweeper;

/// Background sweep loop. A failed run is logged and retried on the next
/// tick; the conditional reconcile locks make overlapping runs safe.
pub async fn start_sweep_worker(sweeper: Arc<ReconciliationSweeper>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = sweeper.run_once(chrono::Utc::now()).await {
            error!("sweep run failed: {}", e);
        }
    }
}
