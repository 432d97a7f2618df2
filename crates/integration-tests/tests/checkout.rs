//! Checkout through the HTTP API: pricing, validation, stock and idempotency.

use axum::http::{Method, StatusCode};
use driftwood_integration_tests::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_checkout_below_threshold_pays_shipping() {
    let app = TestApp::new();
    let lamp = app.product("table-lamp", "25.00", 10).await;
    let mut alice = app.customer("alice@example.com").await;
    alice.add_address("Alice").await;

    let response = alice
        .post(
            "/api/orders",
            json!({ "items": [{ "product_id": lamp.id, "quantity": 2 }] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    let order = &response.body;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["subtotal"], "50.00");
    assert_eq!(order["tax"], "4.00");
    assert_eq!(order["shipping"], "10.00");
    assert_eq!(order["total"], "64.00");

    let number = order["order_number"].as_str().unwrap_or_default();
    let digits = number.strip_prefix("ORD").unwrap_or_default();
    assert_eq!(digits.len(), 11);
    assert!(digits.bytes().all(|b| b.is_ascii_digit()));

    assert_eq!(order["items"][0]["unit_price"], "25.00");
    assert_eq!(order["items"][0]["line_total"], "50.00");
    assert_eq!(order["shipping_address"]["country"], "GB");
    assert!(order.get("idempotency_key").is_none());

    assert_eq!(app.stock(lamp.id).await, 8);
}

#[tokio::test]
async fn test_checkout_at_threshold_ships_free() {
    let app = TestApp::new();
    let throw = app.product("linen-throw", "150.00", 3).await;
    let mut alice = app.customer("alice@example.com").await;
    alice.add_address("Alice").await;

    let response = alice
        .post(
            "/api/orders",
            json!({ "items": [{ "product_id": throw.id, "quantity": 1 }] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["tax"], "12.00");
    assert_eq!(response.body["shipping"], "0.00");
    assert_eq!(response.body["total"], "162.00");
}

#[tokio::test]
async fn test_checkout_uses_and_clears_session_cart() {
    let app = TestApp::new();
    let mug = app.product("stoneware-mug", "16.50", 10).await;
    let mut alice = app.customer("alice@example.com").await;
    alice.add_address("Alice").await;

    let cart = alice
        .post("/api/cart/items", json!({ "product_id": mug.id, "quantity": 2 }))
        .await;
    assert_eq!(cart.status, StatusCode::OK);
    let cart = alice
        .post("/api/cart/items", json!({ "product_id": mug.id }))
        .await;
    assert_eq!(cart.body["items"][0]["quantity"], 3);

    let response = alice.post("/api/orders", json!({})).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    assert_eq!(response.body["items"][0]["quantity"], 3);
    assert_eq!(response.body["subtotal"], "49.50");

    let cart = alice.get("/api/cart").await;
    assert_eq!(cart.body["items"].as_array().map(Vec::len), Some(0));
    assert!(cart.body["totals"].is_null());
}

#[tokio::test]
async fn test_empty_checkout_is_rejected() {
    let app = TestApp::new();
    let mut alice = app.customer("alice@example.com").await;
    alice.add_address("Alice").await;

    let response = alice.post("/api/orders", json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "validation_error");
}

#[tokio::test]
async fn test_checkout_without_address_is_rejected() {
    let app = TestApp::new();
    let lamp = app.product("table-lamp", "25.00", 10).await;
    let mut alice = app.customer("alice@example.com").await;

    let response = alice
        .post(
            "/api/orders",
            json!({ "items": [{ "product_id": lamp.id, "quantity": 1 }] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "validation_error");
    assert_eq!(app.stock(lamp.id).await, 10);
}

#[tokio::test]
async fn test_malformed_body_is_a_validation_error() {
    let app = TestApp::new();
    let mut alice = app.customer("alice@example.com").await;

    let response = alice
        .post(
            "/api/orders",
            json!({ "items": [{ "product_id": 1, "quantity": -1 }] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "validation_error");
}

#[tokio::test]
async fn test_insufficient_stock_creates_nothing() {
    let app = TestApp::new();
    let plenty = app.product("salt-bowl", "9.99", 50).await;
    let scarce = app.product("sea-glass-pendant", "129.00", 1).await;
    let mut alice = app.customer("alice@example.com").await;
    alice.add_address("Alice").await;

    let response = alice
        .post(
            "/api/orders",
            json!({ "items": [
                { "product_id": plenty.id, "quantity": 5 },
                { "product_id": scarce.id, "quantity": 2 },
            ] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.code(), "insufficient_stock");
    assert_eq!(app.stock(plenty.id).await, 50);
    assert_eq!(app.stock(scarce.id).await, 1);

    let orders = alice.get("/api/orders").await;
    assert_eq!(orders.body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_oversized_totals_are_rejected() {
    let app = TestApp::new();
    let yacht = app.product("motor-yacht", "2000000000.00", 100).await;
    let mut alice = app.customer("alice@example.com").await;
    alice.add_address("Alice").await;

    let response = alice
        .post(
            "/api/orders",
            json!({ "items": [{ "product_id": yacht.id, "quantity": 99 }] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "validation_error");
    assert_eq!(app.stock(yacht.id).await, 100);

    let cart = alice
        .post("/api/cart/items", json!({ "product_id": yacht.id, "quantity": 99 }))
        .await;
    assert_eq!(cart.status, StatusCode::BAD_REQUEST);
    assert_eq!(cart.code(), "validation_error");
    assert_eq!(alice.get("/api/cart").await.body["item_count"], 0);
}

#[tokio::test]
async fn test_idempotency_key_replays_original_order() {
    let app = TestApp::new();
    let lamp = app.product("table-lamp", "25.00", 10).await;
    let mut alice = app.customer("alice@example.com").await;
    alice.add_address("Alice").await;

    let body = json!({ "items": [{ "product_id": lamp.id, "quantity": 1 }] });
    let key = [("idempotency-key", "checkout-7f3a")];

    let first = alice
        .send(Method::POST, "/api/orders", Some(body.clone()), &key)
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = alice
        .send(Method::POST, "/api/orders", Some(body), &key)
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["id"], first.body["id"]);
    assert_eq!(second.body["order_number"], first.body["order_number"]);

    assert_eq!(app.stock(lamp.id).await, 9);
}

#[tokio::test]
async fn test_concurrent_checkouts_never_oversell() {
    let app = TestApp::new();
    let lamp = app.product("table-lamp", "25.00", 5).await;

    let mut clients = Vec::new();
    for i in 0..12 {
        let mut client = app.customer(&format!("shopper{i}@example.com")).await;
        client.add_address("Shopper").await;
        clients.push(client);
    }

    let body = json!({ "items": [{ "product_id": lamp.id, "quantity": 1 }] });
    let responses = futures::future::join_all(
        clients
            .iter_mut()
            .map(|client| client.post("/api/orders", body.clone())),
    )
    .await;

    let created = responses
        .iter()
        .filter(|r| r.status == StatusCode::CREATED)
        .count();
    let rejected = responses
        .iter()
        .filter(|r| r.code() == "insufficient_stock")
        .count();

    assert_eq!(created, 5);
    assert_eq!(rejected, 7);
    assert_eq!(app.stock(lamp.id).await, 0);
}
