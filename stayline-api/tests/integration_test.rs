use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use stayline_api::{app, AppState};
use stayline_booking::{AvailabilityView, BookingEngine};
use stayline_core::notify::TracingSink;
use stayline_core::provider::AdapterRegistry;
use stayline_payments::{PaymentService, SandboxAdapter, SideEffectDispatcher};
use stayline_shared::{BookingMode, Provider, Unit};
use stayline_store::MemoryStore;
use stayline_sweeper::{ReconciliationSweeper, SweeperConfig};

struct TestApp {
    router: Router,
    unit: Unit,
}

fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let unit = Unit {
        id: Uuid::new_v4(),
        host_id: Uuid::new_v4(),
        title: "Lekki Waterfront Flat".to_string(),
        currency: "NGN".to_string(),
        mode: BookingMode::Instant,
        cancellation_policy: "moderate".to_string(),
        min_nights: 1,
        min_notice_hours: 0,
        hold_minutes: 30,
    };
    store.add_unit(unit.clone());

    let engine = Arc::new(BookingEngine::new(store.clone(), store.clone()));
    let availability = Arc::new(AvailabilityView::new(store.clone(), store.clone()));
    let dispatcher = Arc::new(SideEffectDispatcher::new(
        store.clone(),
        Arc::new(TracingSink),
        store.clone(),
    ));
    let payments = Arc::new(PaymentService::new(store.clone(), engine.clone(), dispatcher));
    let adapters = AdapterRegistry::new()
        .register(Arc::new(SandboxAdapter::new(Provider::Stripe)))
        .register(Arc::new(SandboxAdapter::new(Provider::Paystack)));
    let sweeper = Arc::new(ReconciliationSweeper::new(
        store.clone(),
        store.clone(),
        adapters,
        payments.clone(),
        engine.clone(),
        SweeperConfig::default(),
    ));

    let state = AppState {
        engine,
        payments,
        sweeper,
        availability,
        sweep_status: store,
    };
    TestApp { router: app(state), unit }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, actor: Option<(Uuid, &str)>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some((id, role)) = actor {
        builder = builder
            .header("x-actor-id", id.to_string())
            .header("x-actor-role", role);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_req(uri: &str, actor: Option<(Uuid, &str)>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some((id, role)) = actor {
        builder = builder
            .header("x-actor-id", id.to_string())
            .header("x-actor-role", role);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_booking_and_payment_flow() {
    let t = test_app();
    let guest = Uuid::new_v4();
    let rival = Uuid::new_v4();

    let check_in = Utc::now().date_naive() + Duration::days(30);
    let check_out = check_in + Duration::days(3);

    // Create a three-night hold.
    let (status, body) = send(
        &t.router,
        post_json(
            "/v1/bookings",
            Some((guest, "guest")),
            json!({
                "unit_id": t.unit.id,
                "date_from": check_in,
                "date_to": check_out,
                "mode": "instant",
                "total_amount_minor": 120_000,
                "currency": "NGN",
                "pricing_snapshot": {"nightly": 40_000},
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "PENDING_PAYMENT");
    assert_eq!(body["nights"], 3);
    let booking_id = body["id"].as_str().unwrap().to_string();

    // Overlapping dates lose definitively while the hold is live.
    let (status, body) = send(
        &t.router,
        post_json(
            "/v1/bookings",
            Some((rival, "guest")),
            json!({
                "unit_id": t.unit.id,
                "date_from": check_in + Duration::days(2),
                "date_to": check_out + Duration::days(1),
                "mode": "instant",
                "total_amount_minor": 90_000,
                "currency": "NGN",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DATES_UNAVAILABLE");

    // Start a payment attempt; the reference is deterministic per booking.
    let (status, body) = send(
        &t.router,
        post_json(
            &format!("/v1/bookings/{booking_id}/payments"),
            Some((guest, "guest")),
            json!({"provider": "paystack"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let reference = body["provider_reference"].as_str().unwrap().to_string();
    assert!(reference.ends_with("-1"));

    // Provider webhook lands: booking confirms.
    let webhook = json!({
        "event": "charge.success",
        "data": {"reference": reference, "id": 991_144, "status": "success"},
    });
    let (status, body) = send(
        &t.router,
        post_json("/v1/webhooks/payments/paystack", None, webhook.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);
    assert_eq!(body["already_succeeded"], false);
    let confirmed_at = body["confirmed_at"].clone();
    assert!(!confirmed_at.is_null());

    let (status, body) = send(&t.router, get_req(&format!("/v1/bookings/{booking_id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");

    // At-least-once delivery: the retry is a no-op with the original
    // confirmation timestamp.
    let (status, body) = send(
        &t.router,
        post_json("/v1/webhooks/payments/paystack", None, webhook),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["already_succeeded"], true);
    assert_eq!(body["confirmed_at"], confirmed_at);

    // The stay shows up on the unit calendar.
    let (status, body) = send(
        &t.router,
        get_req(&format!("/v1/units/{}/calendar", t.unit.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let blocked = body["blocked"].as_array().unwrap();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0]["source"], "booking");
    assert_eq!(blocked[0]["date_from"], json!(check_in));
}

#[tokio::test]
async fn test_validation_and_auth_errors() {
    let t = test_app();
    let guest = Uuid::new_v4();
    let check_in = Utc::now().date_naive() + Duration::days(10);

    // Missing actor header.
    let (status, body) = send(
        &t.router,
        post_json(
            "/v1/bookings",
            None,
            json!({
                "unit_id": t.unit.id,
                "date_from": check_in,
                "date_to": check_in + Duration::days(1),
                "mode": "instant",
                "total_amount_minor": 40_000,
                "currency": "NGN",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    // Inverted range.
    let (status, body) = send(
        &t.router,
        post_json(
            "/v1/bookings",
            Some((guest, "guest")),
            json!({
                "unit_id": t.unit.id,
                "date_from": check_in,
                "date_to": check_in - Duration::days(1),
                "mode": "instant",
                "total_amount_minor": 40_000,
                "currency": "NGN",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_RANGE");

    // Unknown booking.
    let (status, body) = send(
        &t.router,
        get_req(&format!("/v1/bookings/{}", Uuid::new_v4()), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "BOOKING_NOT_FOUND");
}

#[tokio::test]
async fn test_cancel_frees_calendar() {
    let t = test_app();
    let guest = Uuid::new_v4();
    let check_in = Utc::now().date_naive() + Duration::days(14);

    let (_, body) = send(
        &t.router,
        post_json(
            "/v1/bookings",
            Some((guest, "guest")),
            json!({
                "unit_id": t.unit.id,
                "date_from": check_in,
                "date_to": check_in + Duration::days(2),
                "mode": "instant",
                "total_amount_minor": 80_000,
                "currency": "NGN",
            }),
        ),
    )
    .await;
    let booking_id = body["id"].as_str().unwrap().to_string();

    // A stranger cannot cancel it.
    let (status, _) = send(
        &t.router,
        post_json(
            &format!("/v1/bookings/{booking_id}/cancel"),
            Some((Uuid::new_v4(), "guest")),
            json!({"reason": "not mine"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The guest can.
    let (status, body) = send(
        &t.router,
        post_json(
            &format!("/v1/bookings/{booking_id}/cancel"),
            Some((guest, "guest")),
            json!({"reason": "change of plans"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(body["cancel_reason"], "change of plans");

    // The dates are free again.
    let (status, body) = send(
        &t.router,
        get_req(&format!("/v1/units/{}/calendar", t.unit.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["blocked"].as_array().unwrap().is_empty());

    let (status, _) = send(
        &t.router,
        post_json(
            "/v1/bookings",
            Some((Uuid::new_v4(), "guest")),
            json!({
                "unit_id": t.unit.id,
                "date_from": check_in,
                "date_to": check_in + Duration::days(2),
                "mode": "instant",
                "total_amount_minor": 80_000,
                "currency": "NGN",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_admin_surface_requires_role() {
    let t = test_app();
    let admin = Uuid::new_v4();

    // No sweep has run yet.
    let (status, _) = send(
        &t.router,
        get_req("/v1/admin/reconcile/status", Some((admin, "admin"))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Guests are rejected.
    let (status, _) = send(
        &t.router,
        post_json("/v1/admin/reconcile/sweep", Some((admin, "guest")), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // An admin can trigger a sweep; the status read reflects it.
    let (status, body) = send(
        &t.router,
        post_json("/v1/admin/reconcile/sweep", Some((admin, "admin")), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["version"], 1);

    let (status, body) = send(
        &t.router,
        get_req("/v1/admin/reconcile/status", Some((admin, "admin"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 1);

    // Manual reconcile of a reference nobody issued.
    let (status, body) = send(
        &t.router,
        post_json(
            "/v1/admin/reconcile/deadbeef-1?provider=stripe",
            Some((admin, "admin")),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ATTEMPT_NOT_FOUND");
}
