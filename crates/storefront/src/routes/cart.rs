//! Session cart route handlers.
//!
//! The cart is a list of `(product_id, quantity)` lines kept in the session;
//! nothing is reserved until checkout. Viewing the cart prices it against the
//! current catalog and previews totals with the configured pricing policy.

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use driftwood_core::pricing::round_currency;
use driftwood_core::{OrderTotals, PricingError, ProductId};

use crate::error::{ApiJson, ApiPath, AppError, Result};
use crate::models::{CartLine, session_keys};
use crate::services::orders::MAX_LINE_QUANTITY;
use crate::state::AppState;

/// A priced cart line.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    /// Current stock; checkout fails if this is below `quantity`.
    pub in_stock: i32,
}

/// Cart contents with a totals preview.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    /// Absent for an empty cart.
    pub totals: Option<OrderTotals>,
}

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Quantity update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateItem {
    pub quantity: u32,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Read the cart lines from the session.
pub(crate) async fn load_cart(session: &Session) -> Result<Vec<CartLine>> {
    Ok(session
        .get::<Vec<CartLine>>(session_keys::CART)
        .await?
        .unwrap_or_default())
}

async fn save_cart(session: &Session, lines: &[CartLine]) -> Result<()> {
    if lines.is_empty() {
        session.remove::<Vec<CartLine>>(session_keys::CART).await?;
    } else {
        session.insert(session_keys::CART, lines).await?;
    }
    Ok(())
}

/// Empty the cart (after a successful checkout).
pub(crate) async fn clear_cart(session: &Session) -> Result<()> {
    save_cart(session, &[]).await
}

fn check_quantity(quantity: u32) -> Result<()> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::Validation(format!(
            "quantity must be at most {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// Price the cart against the catalog. Lines for products that no longer
/// exist or were deactivated are dropped.
async fn render(state: &AppState, lines: &[CartLine]) -> Result<CartView> {
    let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
    let products: HashMap<ProductId, _> = state
        .repos()
        .catalog
        .get_products(&ids)
        .await?
        .into_iter()
        .filter(|p| p.active)
        .map(|p| (p.id, p))
        .collect();

    let too_large = || AppError::Validation(PricingError::AmountTooLarge.to_string());
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(product) = products.get(&line.product_id) else {
            continue;
        };
        let line_total = product
            .price
            .checked_mul(Decimal::from(line.quantity))
            .map(round_currency)
            .ok_or_else(too_large)?;
        items.push(CartItemView {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity: line.quantity,
            line_total,
            in_stock: product.stock,
        });
    }

    let totals = if items.is_empty() {
        None
    } else {
        let subtotal = items
            .iter()
            .try_fold(Decimal::ZERO, |sum, i| sum.checked_add(i.line_total))
            .ok_or_else(too_large)?;
        let totals = state.pricing().compute_totals(subtotal).map_err(|e| match e {
            PricingError::AmountTooLarge => AppError::Validation(e.to_string()),
            PricingError::NegativeSubtotal(_) => AppError::Internal(e.to_string()),
        })?;
        Some(totals)
    };

    Ok(CartView {
        item_count: items.iter().map(|i| i.quantity).sum(),
        items,
        totals,
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Show the cart.
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<ApiJson<CartView>> {
    let lines = load_cart(&session).await?;
    Ok(ApiJson(render(&state, &lines).await?))
}

/// Add a product; quantities for the same product are merged.
///
/// The cart is only saved if it can still be priced.
#[instrument(skip_all, fields(product_id = %body.product_id, quantity = body.quantity))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<AddItem>,
) -> Result<ApiJson<CartView>> {
    if body.quantity == 0 {
        return Err(AppError::Validation("quantity must be at least 1".to_owned()));
    }
    check_quantity(body.quantity)?;

    state
        .repos()
        .catalog
        .get_product(body.product_id)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::NotFound("product".to_owned()))?;

    let mut lines = load_cart(&session).await?;
    if let Some(line) = lines.iter_mut().find(|l| l.product_id == body.product_id) {
        let merged = line.quantity.saturating_add(body.quantity);
        check_quantity(merged)?;
        line.quantity = merged;
    } else {
        lines.push(CartLine {
            product_id: body.product_id,
            quantity: body.quantity,
        });
    }

    let view = render(&state, &lines).await?;
    save_cart(&session, &lines).await?;
    Ok(ApiJson(view))
}

/// Set a line's quantity; zero removes it.
#[instrument(skip_all, fields(product_id = %product_id, quantity = body.quantity))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<UpdateItem>,
) -> Result<ApiJson<CartView>> {
    check_quantity(body.quantity)?;

    let mut lines = load_cart(&session).await?;
    let position = lines
        .iter()
        .position(|l| l.product_id == product_id)
        .ok_or_else(|| AppError::NotFound("cart item".to_owned()))?;

    if body.quantity == 0 {
        lines.remove(position);
    } else if let Some(line) = lines.get_mut(position) {
        line.quantity = body.quantity;
    }

    let view = render(&state, &lines).await?;
    save_cart(&session, &lines).await?;
    Ok(ApiJson(view))
}

/// Remove a line.
#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<ApiJson<CartView>> {
    let mut lines = load_cart(&session).await?;
    let before = lines.len();
    lines.retain(|l| l.product_id != product_id);
    if lines.len() == before {
        return Err(AppError::NotFound("cart item".to_owned()));
    }

    let view = render(&state, &lines).await?;
    save_cart(&session, &lines).await?;
    Ok(ApiJson(view))
}

/// Empty the cart.
#[instrument(skip_all)]
pub async fn clear(session: Session) -> Result<StatusCode> {
    clear_cart(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
