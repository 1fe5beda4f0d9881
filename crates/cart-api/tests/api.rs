//! HTTP API tests driven in-process through the router.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use cart_api::{create_router, AppConfig, AppState};
use cart_backend::{FlutterwaveConfig, FlutterwaveInlineGateway};
use cart_core::{
    CatalogEntry, Currency, FileCartStore, ItemKind, MemoryCartStore, MemoryLedger, Price,
    StaticCatalog,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot`

const ANON: &[(&str, &str)] = &[("x-session-id", "sess-1")];
const OTHER_SHOPPER: &[(&str, &str)] = &[
    ("x-session-id", "sess-1"),
    ("x-user-id", "user-77"),
    ("x-user-email", "bob@example.com"),
];
const SHOPPER_ON_SECOND_SESSION: &[(&str, &str)] = &[
    ("x-session-id", "sess-2"),
    ("x-user-id", "user-42"),
    ("x-user-email", "ada@example.com"),
];
const SHOPPER: &[(&str, &str)] = &[
    ("x-session-id", "sess-1"),
    ("x-user-id", "user-42"),
    ("x-user-email", "ada@example.com"),
    ("x-user-name", "Ada Lovelace"),
];

fn catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_entry(CatalogEntry::new(
            "tpl-1",
            "SaaS Landing Template",
            Price::new(29.99, Currency::USD),
            ItemKind::Template,
        ))
        .with_entry(CatalogEntry::new(
            "consult-general",
            "General Consultation",
            Price::new(25.0, Currency::USD),
            ItemKind::Consultation,
        ))
}

fn config() -> AppConfig {
    AppConfig {
        ready_timeout: Duration::from_secs(60),
        payment_timeout: Duration::from_secs(3600),
        session_idle: Duration::from_secs(120),
        ..Default::default()
    }
}

fn gateway() -> FlutterwaveInlineGateway {
    FlutterwaveInlineGateway::new(FlutterwaveConfig::new("FLWPUBK_TEST-abc123-X"))
}

fn state() -> (AppState, Arc<MemoryLedger>) {
    let ledger = Arc::new(MemoryLedger::new());
    let state = AppState::with_components(
        config(),
        catalog(),
        Arc::new(MemoryCartStore::new()),
        ledger.clone(),
        gateway(),
    );
    (state, ledger)
}

fn app() -> (Router, Arc<MemoryLedger>) {
    let (state, ledger) = state();
    (create_router(state), ledger)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = send(&app, "GET", "/health", &[], None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn test_cart_requires_session_header() {
    let (app, _) = app();
    let (status, body) = send(&app, "GET", "/api/v1/cart", &[], None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_add_merges_and_totals() {
    let (app, _) = app();

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/cart/items",
        ANON,
        Some(json!({ "product_id": "tpl-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(
        &app,
        "POST",
        "/api/v1/cart/items",
        ANON,
        Some(json!({ "product_id": "tpl-1", "quantity": 2 })),
    )
    .await;

    assert_eq!(body["item"]["quantity"], 3);
    assert_eq!(body["cart"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["cart"]["totals"]["total_items"], 3);
    assert_eq!(body["cart"]["totals"]["total_price"]["amount"], 8997);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let (app, _) = app();

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/cart/items",
        ANON,
        Some(json!({ "product_id": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/v1/products/nope", &[], None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_and_remove_lines() {
    let (app, _) = app();
    send(
        &app,
        "POST",
        "/api/v1/cart/items",
        ANON,
        Some(json!({ "product_id": "tpl-1" })),
    )
    .await;

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/cart/items/tpl-1",
        ANON,
        Some(json!({ "quantity": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totals"]["total_items"], 4);

    let (status, body) = send(&app, "DELETE", "/api/v1/cart/items/tpl-1", ANON, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_anonymous_checkout_is_unauthorized() {
    let (app, _) = app();
    send(
        &app,
        "POST",
        "/api/v1/cart/items",
        ANON,
        Some(json!({ "product_id": "tpl-1" })),
    )
    .await;

    let (status, body) = send(&app, "POST", "/api/v1/checkout", ANON, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["details"], "Please log in to complete checkout.");
}

#[tokio::test]
async fn test_consultation_checkout_round_trip() {
    let (app, ledger) = app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/cart/consultations",
        SHOPPER,
        Some(json!({ "product_id": "consult-general" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["item"]["type"], "consultation");

    let (status, checkout) = send(&app, "POST", "/api/v1/checkout", SHOPPER, None).await;
    assert_eq!(status, StatusCode::OK);
    let reference = checkout["reference"].as_str().unwrap().to_string();
    assert_eq!(checkout["amount_display"], "$25.00");
    assert_eq!(checkout["payment"]["config"]["tx_ref"], reference.as_str());
    assert_eq!(checkout["payment"]["config"]["customer"]["email"], "ada@example.com");

    // A second attempt is rejected while the first is open
    let (status, _) = send(&app, "POST", "/api/v1/checkout", SHOPPER, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, ready) = send(
        &app,
        "POST",
        &format!("/api/v1/checkout/{}/ready", reference),
        &[],
        None,
    )
    .await;
    assert_eq!(ready["disposition"]["disposition"], "applied");

    let (status, done) = send(
        &app,
        "POST",
        &format!("/api/v1/checkout/{}/success", reference),
        &[],
        Some(json!({
            "status": "successful",
            "tx_ref": reference,
            "transaction_id": 4455661,
            "amount": 25,
            "currency": "USD"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["disposition"]["phase"], "succeeded");

    let records = ledger.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].amount.amount, 2500);
    assert_eq!(records[0].user_id, "user-42");

    let (_, cart) = send(&app, "GET", "/api/v1/cart", SHOPPER, None).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(cart["checkout"]["phase"], "succeeded");

    // Late duplicate callback changes nothing
    let (_, late) = send(
        &app,
        "POST",
        &format!("/api/v1/checkout/{}/cancel", reference),
        &[],
        None,
    )
    .await;
    assert_eq!(late["disposition"]["disposition"], "ignored");

    let (status, reset) = send(&app, "POST", "/api/v1/checkout/reset", SHOPPER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["phase"], "idle");
}

#[tokio::test]
async fn test_failure_callback_keeps_cart() {
    let (app, ledger) = app();
    send(
        &app,
        "POST",
        "/api/v1/cart/items",
        SHOPPER,
        Some(json!({ "product_id": "tpl-1" })),
    )
    .await;

    let (_, checkout) = send(&app, "POST", "/api/v1/checkout", SHOPPER, None).await;
    let reference = checkout["reference"].as_str().unwrap().to_string();

    let (_, failed) = send(
        &app,
        "POST",
        &format!("/api/v1/checkout/{}/failure", reference),
        &[],
        Some(json!({ "reason": "card declined" })),
    )
    .await;
    assert_eq!(failed["disposition"]["phase"], "failed");

    let (_, status) = send(&app, "GET", "/api/v1/checkout", SHOPPER, None).await;
    assert_eq!(status["phase"], "failed");
    assert!(status["message"].as_str().unwrap().contains("card declined"));

    let (_, cart) = send(&app, "GET", "/api/v1/cart", SHOPPER, None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert!(ledger.records().await.is_empty());
}

#[tokio::test]
async fn test_mismatched_callback_reference_is_rejected() {
    let (app, _) = app();

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/checkout/tx-1/success",
        &[],
        Some(json!({ "status": "successful", "tx_ref": "tx-2" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_switches_to_user_cart() {
    let (app, _) = app();
    send(
        &app,
        "POST",
        "/api/v1/cart/items",
        ANON,
        Some(json!({ "product_id": "tpl-1" })),
    )
    .await;

    let (_, cart) = send(&app, "GET", "/api/v1/cart", SHOPPER, None).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(cart["scope"]["kind"], "user");

    let (_, cart) = send(&app, "GET", "/api/v1/cart", ANON, None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let build = || {
        let state = AppState::with_components(
            config(),
            catalog(),
            Arc::new(FileCartStore::new(dir.path())),
            Arc::new(MemoryLedger::new()),
            gateway(),
        );
        create_router(state)
    };

    let first = build();
    send(
        &first,
        "POST",
        "/api/v1/cart/items",
        ANON,
        Some(json!({ "product_id": "tpl-1", "quantity": 2 })),
    )
    .await;

    let second = build();
    let (_, cart) = send(&second, "GET", "/api/v1/cart", ANON, None).await;
    assert_eq!(cart["totals"]["total_items"], 2);
}

#[tokio::test]
async fn test_identity_switch_refused_during_checkout() {
    let (app, _) = app();
    send(
        &app,
        "POST",
        "/api/v1/cart/items",
        SHOPPER,
        Some(json!({ "product_id": "tpl-1" })),
    )
    .await;
    let (_, checkout) = send(&app, "POST", "/api/v1/checkout", SHOPPER, None).await;
    let reference = checkout["reference"].as_str().unwrap().to_string();

    // Another user on the same browser session sees nothing of the open attempt
    let (status, body) = send(&app, "GET", "/api/v1/cart", OTHER_SHOPPER, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(!body["error"].as_str().unwrap().contains(&reference));
    assert!(body.get("items").is_none());
    assert!(body.get("checkout").is_none());

    let (status, cart) = send(&app, "GET", "/api/v1/cart", SHOPPER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["checkout"]["reference"], reference.as_str());

    send(
        &app,
        "POST",
        &format!("/api/v1/checkout/{}/cancel", reference),
        &[],
        None,
    )
    .await;

    let (status, cart) = send(&app, "GET", "/api/v1/cart", OTHER_SHOPPER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["scope"]["id"], "user-77");
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(cart["checkout"]["phase"], "idle");
}

#[tokio::test(start_paused = true)]
async fn test_idle_sessions_are_swept() {
    let (state, _) = state();
    let app = create_router(state.clone());

    send(
        &app,
        "POST",
        "/api/v1/cart/items",
        ANON,
        Some(json!({ "product_id": "tpl-1" })),
    )
    .await;
    send(
        &app,
        "POST",
        "/api/v1/cart/items",
        SHOPPER_ON_SECOND_SESSION,
        Some(json!({ "product_id": "tpl-1" })),
    )
    .await;
    let (_, checkout) = send(
        &app,
        "POST",
        "/api/v1/checkout",
        SHOPPER_ON_SECOND_SESSION,
        None,
    )
    .await;
    let reference = checkout["reference"].as_str().unwrap().to_string();
    send(
        &app,
        "POST",
        &format!("/api/v1/checkout/{}/ready", reference),
        &[],
        None,
    )
    .await;
    assert_eq!(state.session_count().await, 2);

    assert_eq!(state.sweep_idle_sessions().await, 0);

    tokio::time::advance(config().session_idle + Duration::from_secs(1)).await;

    // The session with an open checkout survives
    assert_eq!(state.sweep_idle_sessions().await, 1);
    assert_eq!(state.session_count().await, 1);

    // An evicted session picks its cart back up from the store
    let (_, cart) = send(&app, "GET", "/api/v1/cart", ANON, None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(state.session_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_widget_releases_registration() {
    let (state, _) = state();
    let app = create_router(state.clone());

    send(
        &app,
        "POST",
        "/api/v1/cart/items",
        SHOPPER,
        Some(json!({ "product_id": "tpl-1" })),
    )
    .await;
    let (_, checkout) = send(&app, "POST", "/api/v1/checkout", SHOPPER, None).await;
    let reference = checkout["reference"].as_str().unwrap().to_string();
    send(
        &app,
        "POST",
        &format!("/api/v1/checkout/{}/ready", reference),
        &[],
        None,
    )
    .await;
    assert_eq!(state.gateway.pending_count(), 1);

    // Tab closed after the modal opened: nothing ever reports back
    tokio::time::sleep(config().payment_timeout + Duration::from_secs(1)).await;

    assert_eq!(state.gateway.pending_count(), 0);
    let (_, status) = send(&app, "GET", "/api/v1/checkout", SHOPPER, None).await;
    assert_eq!(status["phase"], "timed_out");

    let (status, _) = send(&app, "DELETE", "/api/v1/cart", SHOPPER, None).await;
    assert_eq!(status, StatusCode::OK);
}
