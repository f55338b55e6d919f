use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stayline_api::{app, worker, AppState};
use stayline_booking::{AvailabilityView, BookingEngine};
use stayline_core::notify::TracingSink;
use stayline_core::provider::AdapterRegistry;
use stayline_payments::{PaymentService, SandboxAdapter, SideEffectDispatcher};
use stayline_shared::Provider;
use stayline_store::PgStore;
use stayline_sweeper::{ReconciliationSweeper, SweeperConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stayline=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = stayline_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Stayline API on port {}", config.server.port);

    let db = stayline_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let store = Arc::new(PgStore::new(db.pool.clone()));

    let engine = Arc::new(BookingEngine::new(store.clone(), store.clone()));
    let availability = Arc::new(AvailabilityView::new(store.clone(), store.clone()));
    let dispatcher = Arc::new(SideEffectDispatcher::new(
        store.clone(),
        Arc::new(TracingSink),
        store.clone(),
    ));
    let payments = Arc::new(PaymentService::new(store.clone(), engine.clone(), dispatcher));

    // Real gateway credentials are wired per deployment; the sandbox
    // adapters keep local runs honest by reporting Pending.
    let adapters = AdapterRegistry::new()
        .register(Arc::new(SandboxAdapter::new(Provider::Stripe)))
        .register(Arc::new(SandboxAdapter::new(Provider::Paystack)));

    let sweeper_settings = &config.sweeper;
    let sweeper = Arc::new(ReconciliationSweeper::new(
        store.clone(),
        store.clone(),
        adapters,
        payments.clone(),
        engine.clone(),
        SweeperConfig {
            lock_duration: chrono::Duration::seconds(sweeper_settings.lock_seconds as i64),
            max_verify_attempts: sweeper_settings.max_verify_attempts,
            verify_timeout: std::time::Duration::from_millis(sweeper_settings.verify_timeout_ms),
            batch_limit: sweeper_settings.batch_limit,
        },
    ));

    tokio::spawn(worker::start_sweep_worker(
        sweeper.clone(),
        std::time::Duration::from_secs(sweeper_settings.interval_seconds),
    ));

    let app_state = AppState {
        engine,
        payments,
        sweeper,
        availability,
        sweep_status: store,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
