//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                            - Liveness
//! GET    /health/ready                      - Database readiness
//!
//! # Auth (rate limited)
//! POST   /api/auth/register                 - Create account, start session
//! POST   /api/auth/login                    - Password login
//! POST   /api/auth/logout                   - End session
//! GET    /api/auth/me                       - Current user
//!
//! # Catalog
//! GET    /api/categories                    - Category list
//! POST   /api/categories                    - Create category (admin)
//! GET    /api/products                      - Product list (?category=slug)
//! POST   /api/products                      - Create product (admin)
//! GET    /api/products/{id}                 - Product detail
//! PUT    /api/products/{id}/stock           - Set stock (admin)
//!
//! # Cart (session)
//! GET    /api/cart                          - Priced cart with totals preview
//! DELETE /api/cart                          - Empty cart
//! POST   /api/cart/items                    - Add line
//! PUT    /api/cart/items/{product_id}       - Set quantity (0 removes)
//! DELETE /api/cart/items/{product_id}       - Remove line
//!
//! # Orders
//! POST   /api/orders                        - Checkout (Idempotency-Key header)
//! GET    /api/orders                        - Own orders
//! GET    /api/orders/statistics             - Aggregates (admin)
//! GET    /api/orders/{id}                   - Order (owner or admin)
//! POST   /api/orders/{id}/cancel            - Cancel (owner or admin)
//! PUT    /api/orders/{id}/status            - Change status (admin)
//! GET    /api/admin/orders                  - Back-office list (?status=)
//!
//! # Address book (owner only)
//! GET    /api/users/addresses               - List
//! POST   /api/users/addresses               - Create
//! GET    /api/users/addresses/{id}          - Read
//! PUT    /api/users/addresses/{id}          - Update
//! DELETE /api/users/addresses/{id}          - Delete
//! POST   /api/users/addresses/{id}/default  - Make default
//! ```

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod health;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(products::categories).post(products::create_category),
        )
        .route("/products", get(products::index).post(products::create))
        .route("/products/{id}", get(products::show))
        .route("/products/{id}/stock", put(products::set_stock))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            put(cart::update).delete(cart::remove),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/statistics", get(orders::statistics))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/status", put(orders::update_status))
}

/// Create the address book routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route(
            "/{id}",
            get(addresses::show)
                .put(addresses::update)
                .delete(addresses::delete),
        )
        .route("/{id}/default", post(addresses::set_default))
}

/// Everything under `/api` except auth.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .route("/admin/orders", get(orders::admin_index))
        .nest("/users/addresses", address_routes())
}

/// Create all routes for the storefront.
///
/// With `rate_limit` set, auth routes get the strict per-IP limiter and the
/// rest of `/api` the relaxed one.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    let mut auth = auth_routes();
    let mut api = api_routes();
    if rate_limit {
        auth = auth.layer(auth_rate_limiter());
        api = api.layer(api_rate_limiter());
    }

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/auth", auth)
        .nest("/api", api)
}
