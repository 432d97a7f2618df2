//! Address book: defaults, promotion on delete, and owner-only access.

use axum::http::StatusCode;
use driftwood_integration_tests::TestApp;
use serde_json::json;

fn address(full_name: &str, country: &str) -> serde_json::Value {
    json!({
        "full_name": full_name,
        "line1": "8 Quay Street",
        "city": "Whitby",
        "region": "North Yorkshire",
        "postal_code": "YO22 4DE",
        "country": country,
    })
}

#[tokio::test]
async fn test_first_address_becomes_default() {
    let app = TestApp::new();
    let mut alice = app.customer("alice@example.com").await;

    let first = alice.add_address("Home").await;
    let second = alice.add_address("Work").await;

    let list = alice.get("/api/users/addresses").await;
    assert_eq!(list.status, StatusCode::OK);
    let list = list.body.as_array().cloned().unwrap_or_default();
    assert_eq!(list.len(), 2);

    let defaults: Vec<i64> = list
        .iter()
        .filter(|a| a["is_default"] == true)
        .filter_map(|a| a["id"].as_i64())
        .collect();
    assert_eq!(defaults, vec![first]);

    let promoted = alice
        .post(&format!("/api/users/addresses/{second}/default"), json!({}))
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["is_default"], true);

    let old = alice.get(&format!("/api/users/addresses/{first}")).await;
    assert_eq!(old.body["is_default"], false);

    let after = alice.get("/api/users/addresses").await;
    let defaults: Vec<i64> = after
        .body
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter(|a| a["is_default"] == true)
        .filter_map(|a| a["id"].as_i64())
        .collect();
    assert_eq!(defaults, vec![second]);
}

#[tokio::test]
async fn test_deleting_default_promotes_another() {
    let app = TestApp::new();
    let mut alice = app.customer("alice@example.com").await;

    let first = alice.add_address("Home").await;
    let second = alice.add_address("Work").await;

    let deleted = alice.delete(&format!("/api/users/addresses/{first}")).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let remaining = alice.get(&format!("/api/users/addresses/{second}")).await;
    assert_eq!(remaining.body["is_default"], true);

    let gone = alice.get(&format!("/api/users/addresses/{first}")).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_normalizes_fields() {
    let app = TestApp::new();
    let mut alice = app.customer("alice@example.com").await;
    let id = alice.add_address("Home").await;

    let updated = alice
        .put(
            &format!("/api/users/addresses/{id}"),
            address("  Alice Liddell  ", "ie"),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
    assert_eq!(updated.body["full_name"], "Alice Liddell");
    assert_eq!(updated.body["country"], "IE");

    let invalid = alice
        .put(&format!("/api/users/addresses/{id}"), address("Alice", "Ireland"))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.code(), "validation_error");
}

#[tokio::test]
async fn test_other_users_address_is_forbidden() {
    let app = TestApp::new();
    let mut alice = app.customer("alice@example.com").await;
    let id = alice.add_address("Home").await;
    let mut mallory = app.customer("mallory@example.com").await;
    let uri = format!("/api/users/addresses/{id}");

    let read = mallory.get(&uri).await;
    assert_eq!(read.status, StatusCode::FORBIDDEN);
    assert!(read.body.get("line1").is_none());

    let write = mallory.put(&uri, address("Mallory", "gb")).await;
    assert_eq!(write.status, StatusCode::FORBIDDEN);

    let delete = mallory.delete(&uri).await;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);

    let default = mallory.post(&format!("{uri}/default"), json!({})).await;
    assert_eq!(default.status, StatusCode::FORBIDDEN);

    let mine = mallory.get("/api/users/addresses").await;
    assert_eq!(mine.body.as_array().map(Vec::len), Some(0));

    let still_there = alice.get(&uri).await;
    assert_eq!(still_there.body["full_name"], "Home");
}

#[tokio::test]
async fn test_admin_cannot_read_customer_address() {
    let app = TestApp::new();
    let mut alice = app.customer("alice@example.com").await;
    let id = alice.add_address("Home").await;
    let mut admin = app.admin("ops@example.com").await;

    let response = admin.get(&format!("/api/users/addresses/{id}")).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_checkout_snapshot_survives_address_edit() {
    let app = TestApp::new();
    let lamp = app.product("table-lamp", "25.00", 10).await;
    let mut alice = app.customer("alice@example.com").await;
    let id = alice.add_address("Home").await;

    let order = alice
        .post(
            "/api/orders",
            json!({ "address_id": id, "items": [{ "product_id": lamp.id, "quantity": 1 }] }),
        )
        .await;
    assert_eq!(order.status, StatusCode::CREATED);

    alice
        .put(&format!("/api/users/addresses/{id}"), address("Moved Away", "fr"))
        .await;
    alice.delete(&format!("/api/users/addresses/{id}")).await;

    let shown = alice.get(&format!("/api/orders/{}", order.body["id"])).await;
    assert_eq!(shown.body["shipping_address"]["full_name"], "Home");
    assert_eq!(shown.body["shipping_address"]["country"], "GB");
}
