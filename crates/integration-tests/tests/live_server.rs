//! Smoke tests against a running storefront.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied (`dw-cli migrate`)
//! - The storefront running (cargo run -p driftwood-storefront)
//!
//! Run with: cargo test -p driftwood-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use driftwood_integration_tests::PASSWORD;

/// Base URL for the storefront (configurable via environment).
fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Register a throwaway account; the client keeps its session cookie.
async fn register(client: &Client) -> Value {
    let email = format!("live-{}@example.com", Uuid::new_v4().simple());
    let resp = client
        .post(format!("{}/api/auth/register", base_url()))
        .json(&json!({ "email": email, "password": PASSWORD }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("user JSON")
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_live_health() {
    let resp = client()
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_live_session_round_trip() {
    let client = client();
    let user = register(&client).await;

    let me: Value = client
        .get(format!("{}/api/auth/me", base_url()))
        .send()
        .await
        .expect("Failed to fetch account")
        .json()
        .await
        .expect("user JSON");
    assert_eq!(me["id"], user["id"]);

    let resp = client
        .post(format!("{}/api/auth/logout", base_url()))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .get(format!("{}/api/auth/me", base_url()))
        .send()
        .await
        .expect("Failed to fetch account");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront and seeded catalog"]
async fn test_live_checkout_from_seeded_catalog() {
    let client = client();
    register(&client).await;

    let products: Vec<Value> = client
        .get(format!("{}/api/products", base_url()))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("products JSON");
    let Some(product) = products.iter().find(|p| p["stock"].as_i64() > Some(0)) else {
        panic!("seed the catalog first: dw-cli seed --file crates/cli/data/catalog.example.yaml");
    };

    let resp = client
        .post(format!("{}/api/users/addresses", base_url()))
        .json(&json!({
            "full_name": "Live Test",
            "line1": "1 Harbour Road",
            "city": "Falmouth",
            "region": "Cornwall",
            "postal_code": "TR11 2AA",
            "country": "GB",
        }))
        .send()
        .await
        .expect("Failed to add address");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .post(format!("{}/api/orders", base_url()))
        .header("idempotency-key", Uuid::new_v4().to_string())
        .json(&json!({ "items": [{ "product_id": product["id"], "quantity": 1 }] }))
        .send()
        .await
        .expect("Failed to check out");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.expect("order JSON");
    assert!(
        order["order_number"]
            .as_str()
            .is_some_and(|n| n.starts_with("ORD"))
    );

    let resp = client
        .post(format!("{}/api/orders/{}/cancel", base_url(), order["id"]))
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(resp.status(), StatusCode::OK);
}
