//! Order route handlers.
//!
//! Checkout, order history, cancellation and the back-office order views.
//! Access is checked in two places: extractors reject missing sessions and
//! non-admins up front, and [`OrderService`] applies the owner-or-admin rule
//! after loading an order.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use driftwood_core::{AddressId, OrderId, OrderStatus, TransitionMode};

use crate::error::{ApiJson, ApiPath, ApiQuery, AppError, Result, add_breadcrumb};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{CartLine, Order, OrderFilter, OrderStatistics, StatisticsScope};
use crate::routes::cart::{clear_cart, load_cart};
use crate::services::{Checkout, CheckoutRequest, OrderService};
use crate::state::AppState;

/// Header carrying the client's retry key for checkout.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Checkout request body.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
    /// Shipping address; the user's default when absent.
    #[serde(default)]
    pub address_id: Option<AddressId>,
    /// Explicit lines; the session cart when absent.
    #[serde(default)]
    pub items: Option<Vec<CartLine>>,
}

/// Status change request body.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    /// Allow skipping forward along the lifecycle.
    #[serde(default, rename = "override")]
    pub override_: bool,
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|value| {
            value
                .to_str()
                .map(str::to_owned)
                .map_err(|_| AppError::Validation("Idempotency-Key must be ASCII".to_owned()))
        })
        .transpose()
}

/// Empty the session cart once an order is committed. A session failure is
/// logged and the order still stands.
async fn clear_cart_after_checkout(session: &Session, order_id: OrderId) {
    if let Err(e) = clear_cart(session).await {
        tracing::warn!(%order_id, error = %e, "failed to clear cart after checkout");
    }
}

/// Place an order.
///
/// Responds `201` with the new order, or `200` with the original order when
/// the `Idempotency-Key` was already used by this user.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    headers: HeaderMap,
    ApiJson(body): ApiJson<CheckoutBody>,
) -> Result<(StatusCode, ApiJson<Order>)> {
    let idempotency_key = idempotency_key(&headers)?;
    let from_cart = body.items.is_none();
    let lines = match body.items {
        Some(items) => items,
        None => load_cart(&session).await?,
    };

    add_breadcrumb(
        "checkout",
        "Checkout started",
        &[
            ("lines", lines.len().to_string()),
            ("from_cart", from_cart.to_string()),
        ],
    );

    let service = OrderService::new(state.repos(), state.pricing());
    let outcome = service
        .create_order(
            &user,
            CheckoutRequest {
                lines,
                address_id: body.address_id,
                idempotency_key,
            },
        )
        .await?;

    match outcome {
        Checkout::Created(order) => {
            if from_cart {
                clear_cart_after_checkout(&session, order.id).await;
            }
            Ok((StatusCode::CREATED, ApiJson(order)))
        }
        Checkout::Replayed(order) => Ok((StatusCode::OK, ApiJson(order))),
    }
}

/// The caller's orders, newest first.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiJson<Vec<Order>>> {
    let service = OrderService::new(state.repos(), state.pricing());
    Ok(ApiJson(service.list_orders(&user).await?))
}

/// One order (owner or admin).
#[instrument(skip_all, fields(order_id = %id, user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiJson<Order>> {
    let service = OrderService::new(state.repos(), state.pricing());
    Ok(ApiJson(service.get_order(&user, id).await?))
}

/// Cancel an order and return its stock (owner or admin).
#[instrument(skip_all, fields(order_id = %id, user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiJson<Order>> {
    let service = OrderService::new(state.repos(), state.pricing());
    Ok(ApiJson(service.cancel_order(id, &user).await?))
}

/// Change an order's status (admin).
#[instrument(skip_all, fields(order_id = %id, admin_id = %admin.id, to = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusUpdate>,
) -> Result<ApiJson<Order>> {
    let mode = if body.override_ {
        TransitionMode::Override
    } else {
        TransitionMode::Standard
    };
    let service = OrderService::new(state.repos(), state.pricing());
    Ok(ApiJson(
        service
            .update_order_status(id, body.status, &admin, mode)
            .await?,
    ))
}

/// Aggregate order figures (admin).
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn statistics(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiQuery(scope): ApiQuery<StatisticsScope>,
) -> Result<ApiJson<OrderStatistics>> {
    let service = OrderService::new(state.repos(), state.pricing());
    Ok(ApiJson(service.order_statistics(scope).await?))
}

/// Back-office order list (admin).
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiQuery(filter): ApiQuery<OrderFilter>,
) -> Result<ApiJson<Vec<Order>>> {
    let service = OrderService::new(state.repos(), state.pricing());
    Ok(ApiJson(service.list_all_orders(filter).await?))
}
