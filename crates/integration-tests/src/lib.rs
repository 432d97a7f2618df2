//! Integration tests for the Driftwood storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (no database needed)
//! cargo test -p driftwood-integration-tests
//!
//! # Live-server tests against a running storefront
//! STOREFRONT_BASE_URL=http://localhost:3000 \
//!     cargo test -p driftwood-integration-tests -- --ignored
//! ```
//!
//! In-process tests drive the real router with `tower::ServiceExt::oneshot`
//! over in-memory repositories and an in-memory session store. [`TestApp`]
//! builds the app; [`TestClient`] carries one session cookie between requests.

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use driftwood_core::{Email, ProductId, UserRole};
use driftwood_storefront::config::StorefrontConfig;
use driftwood_storefront::db::Repositories;
use driftwood_storefront::models::{NewProduct, Product};
use driftwood_storefront::state::AppState;

/// Password used for every test account.
pub const PASSWORD: &str = "correct horse battery";

/// The storefront router over fresh in-memory stores.
#[derive(Clone)]
pub struct TestApp {
    pub router: Router,
    pub repos: Repositories,
}

impl TestApp {
    /// App with default pricing and rate limiting off.
    #[must_use]
    pub fn new() -> Self {
        Self::with_env(&[])
    }

    /// App with extra environment overrides (e.g. `STOREFRONT_RATE_LIMIT`).
    #[must_use]
    pub fn with_env(vars: &[(&str, &str)]) -> Self {
        let config = StorefrontConfig::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_owned())
                .or_else(|| match key {
                    "STOREFRONT_DATABASE_URL" => Some("postgres://unused/driftwood".to_owned()),
                    "STOREFRONT_RATE_LIMIT" => Some("false".to_owned()),
                    _ => None,
                })
        })
        .expect("test configuration is valid");

        let repos = Repositories::in_memory();
        let router = driftwood_storefront::app(
            AppState::new(config, repos.clone()),
            MemoryStore::default(),
        );
        Self { router, repos }
    }

    /// A client with no session.
    #[must_use]
    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// Register a customer and return a logged-in client.
    pub async fn customer(&self, email: &str) -> TestClient {
        let mut client = self.client();
        let response = client
            .post(
                "/api/auth/register",
                serde_json::json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        client
    }

    /// Register an account, promote it to admin, and log in again so the
    /// session carries the new role.
    pub async fn admin(&self, email: &str) -> TestClient {
        let mut client = self.customer(email).await;
        self.repos
            .users
            .set_role(&Email::parse(email).expect("valid email"), UserRole::Admin)
            .await
            .expect("promote to admin");
        let response = client
            .post(
                "/api/auth/login",
                serde_json::json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        client
    }

    /// Insert an active product directly through the catalog repository.
    pub async fn product(&self, slug: &str, price: &str, stock: i32) -> Product {
        self.repos
            .catalog
            .create_product(&NewProduct {
                category_id: None,
                slug: slug.to_owned(),
                name: slug.replace('-', " "),
                description: String::new(),
                price: price.parse::<Decimal>().expect("valid price"),
                stock,
                active: true,
            })
            .await
            .expect("create product")
    }

    /// Current stock of a product.
    pub async fn stock(&self, id: ProductId) -> i32 {
        self.repos
            .catalog
            .get_product(id)
            .await
            .expect("load product")
            .expect("product exists")
            .stock
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// JSON body, `Value::Null` for an empty body, or `Value::String` for
    /// anything that is not JSON.
    pub body: Value,
}

impl TestResponse {
    /// The error envelope's `code`.
    #[must_use]
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

/// One browser-like session against the in-process router.
#[derive(Clone)]
pub struct TestClient {
    router: Router,
    cookie: Option<String>,
}

impl TestClient {
    /// Send a request, remembering any session cookie the response sets.
    pub async fn send(
        &mut self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            && let Some(pair) = set_cookie.split(';').next()
        {
            self.cookie = Some(pair.to_owned());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        // Plain-text bodies (health checks) come back as a JSON string
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None, &[]).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body), &[]).await
    }

    pub async fn put(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(body), &[]).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None, &[]).await
    }

    /// Save an address and return its id.
    pub async fn add_address(&mut self, full_name: &str) -> i64 {
        let response = self
            .post(
                "/api/users/addresses",
                serde_json::json!({
                    "full_name": full_name,
                    "line1": "1 Harbour Road",
                    "city": "Falmouth",
                    "region": "Cornwall",
                    "postal_code": "TR11 2AA",
                    "country": "gb",
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_i64().expect("address id")
    }
}
