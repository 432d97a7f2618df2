//! Session cart: add, merge, update, remove and pricing preview.

use axum::http::StatusCode;
use driftwood_integration_tests::TestApp;
use driftwood_storefront::models::NewProduct;
use rust_decimal::Decimal;
use serde_json::json;

#[tokio::test]
async fn test_anonymous_cart_is_priced() {
    let app = TestApp::new();
    let mug = app.product("stoneware-mug", "16.50", 10).await;
    let lamp = app.product("table-lamp", "25.00", 10).await;
    let mut anon = app.client();

    let empty = anon.get("/api/cart").await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["item_count"], 0);
    assert!(empty.body["totals"].is_null());

    anon.post("/api/cart/items", json!({ "product_id": mug.id, "quantity": 2 }))
        .await;
    let cart = anon
        .post("/api/cart/items", json!({ "product_id": lamp.id }))
        .await;

    assert_eq!(cart.status, StatusCode::OK, "{}", cart.body);
    assert_eq!(cart.body["item_count"], 3);
    assert_eq!(cart.body["items"][0]["line_total"], "33.00");
    assert_eq!(cart.body["totals"]["subtotal"], "58.00");
    assert_eq!(cart.body["totals"]["tax"], "4.64");
    assert_eq!(cart.body["totals"]["shipping"], "10.00");
    assert_eq!(cart.body["totals"]["total"], "72.64");

    // Nothing is reserved before checkout.
    assert_eq!(app.stock(mug.id).await, 10);
}

#[tokio::test]
async fn test_update_and_remove_lines() {
    let app = TestApp::new();
    let mug = app.product("stoneware-mug", "16.50", 10).await;
    let lamp = app.product("table-lamp", "25.00", 10).await;
    let mut anon = app.client();

    anon.post("/api/cart/items", json!({ "product_id": mug.id }))
        .await;
    anon.post("/api/cart/items", json!({ "product_id": lamp.id }))
        .await;

    let updated = anon
        .put(&format!("/api/cart/items/{}", mug.id), json!({ "quantity": 4 }))
        .await;
    assert_eq!(updated.body["item_count"], 5);

    let zeroed = anon
        .put(&format!("/api/cart/items/{}", mug.id), json!({ "quantity": 0 }))
        .await;
    assert_eq!(zeroed.body["items"].as_array().map(Vec::len), Some(1));

    let removed = anon.delete(&format!("/api/cart/items/{}", lamp.id)).await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body["item_count"], 0);

    let missing = anon.delete(&format!("/api/cart/items/{}", lamp.id)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_rejects_bad_lines() {
    let app = TestApp::new();
    let mug = app.product("stoneware-mug", "16.50", 10).await;
    let mut anon = app.client();

    let zero = anon
        .post("/api/cart/items", json!({ "product_id": mug.id, "quantity": 0 }))
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let huge = anon
        .post("/api/cart/items", json!({ "product_id": mug.id, "quantity": 100 }))
        .await;
    assert_eq!(huge.status, StatusCode::BAD_REQUEST);

    let unknown = anon
        .post("/api/cart/items", json!({ "product_id": 9999 }))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    anon.post("/api/cart/items", json!({ "product_id": mug.id, "quantity": 60 }))
        .await;
    let merged = anon
        .post("/api/cart/items", json!({ "product_id": mug.id, "quantity": 60 }))
        .await;
    assert_eq!(merged.status, StatusCode::BAD_REQUEST);
    assert_eq!(merged.code(), "validation_error");
}

#[tokio::test]
async fn test_cart_survives_login_and_clears() {
    let app = TestApp::new();
    let mug = app.product("stoneware-mug", "16.50", 10).await;
    let mut client = app.client();

    client
        .post("/api/cart/items", json!({ "product_id": mug.id, "quantity": 2 }))
        .await;
    let registered = client
        .post(
            "/api/auth/register",
            json!({ "email": "carol@example.com", "password": driftwood_integration_tests::PASSWORD }),
        )
        .await;
    assert_eq!(registered.status, StatusCode::CREATED);

    let cart = client.get("/api/cart").await;
    assert_eq!(cart.body["item_count"], 2);

    let cleared = client.delete("/api/cart").await;
    assert_eq!(cleared.status, StatusCode::NO_CONTENT);
    let cart = client.get("/api/cart").await;
    assert_eq!(cart.body["item_count"], 0);
}

#[tokio::test]
async fn test_inactive_product_cannot_be_added() {
    let app = TestApp::new();
    let retired = app
        .repos
        .catalog
        .create_product(&NewProduct {
            category_id: None,
            slug: "retired-vase".to_owned(),
            name: "Retired Vase".to_owned(),
            description: String::new(),
            price: Decimal::new(4200, 2),
            stock: 3,
            active: false,
        })
        .await
        .expect("create product");
    let mut anon = app.client();

    let response = anon
        .post("/api/cart/items", json!({ "product_id": retired.id }))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.code(), "not_found");
}
