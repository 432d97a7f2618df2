//! Driftwood storefront library.
//!
//! JSON API for the catalog, session cart, checkout, order lifecycle and
//! address book. The binary in `main.rs` wires it to `PostgreSQL` and Sentry;
//! tests build the same router over in-memory stores.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::Request,
    middleware::{from_fn, map_response},
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::error::AppError;
use crate::state::AppState;

/// Build the application router.
///
/// Sentry layers are added by the binary on top of this.
pub fn app<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer =
        middleware::create_session_layer(session_store, state.config().secure_cookies());

    routes::routes(state.config().rate_limit)
        .fallback(not_found)
        .layer(map_response(middleware::rate_limit_envelope))
        .layer(session_layer)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("route".to_owned())
}
