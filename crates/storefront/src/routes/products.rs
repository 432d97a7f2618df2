//! Catalog route handlers.
//!
//! Browsing is public and only shows active products; admins may pass
//! `include_inactive=true` and manage products and stock.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use driftwood_core::ProductId;

use crate::error::{ApiJson, ApiPath, ApiQuery, AppError, Result};
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::{Category, NewCategory, NewProduct, Product, ProductFilter};
use crate::state::AppState;

/// Stock update request body.
#[derive(Debug, Deserialize)]
pub struct StockUpdate {
    pub stock: i32,
}

/// List all categories.
#[instrument(skip_all)]
pub async fn categories(State(state): State<AppState>) -> Result<ApiJson<Vec<Category>>> {
    Ok(ApiJson(state.repos().catalog.list_categories().await?))
}

/// Create a category (admin).
#[instrument(skip_all, fields(slug = %body.slug, admin_id = %admin.id))]
pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<NewCategory>,
) -> Result<(StatusCode, ApiJson<Category>)> {
    body.validate().map_err(AppError::Validation)?;
    let category = state.repos().catalog.create_category(&body).await?;
    tracing::info!(category_id = %category.id, "category created");
    Ok((StatusCode::CREATED, ApiJson(category)))
}

/// List products, optionally filtered by category slug.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    ApiQuery(mut filter): ApiQuery<ProductFilter>,
) -> Result<ApiJson<Vec<Product>>> {
    // Inactive products are back-office only
    filter.include_inactive &= user.as_ref().is_some_and(|u| u.is_admin());
    Ok(ApiJson(state.repos().catalog.list_products(&filter).await?))
}

/// Product detail.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<ApiJson<Product>> {
    let is_admin = user.as_ref().is_some_and(|u| u.is_admin());
    let product = state
        .repos()
        .catalog
        .get_product(id)
        .await?
        .filter(|p| p.active || is_admin)
        .ok_or_else(|| AppError::NotFound("product".to_owned()))?;
    Ok(ApiJson(product))
}

/// Create a product (admin).
#[instrument(skip_all, fields(slug = %body.slug, admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<NewProduct>,
) -> Result<(StatusCode, ApiJson<Product>)> {
    body.validate().map_err(AppError::Validation)?;
    let product = state.repos().catalog.create_product(&body).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, ApiJson(product)))
}

/// Overwrite a product's stock level (admin).
#[instrument(skip_all, fields(product_id = %id, admin_id = %admin.id))]
pub async fn set_stock(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<StockUpdate>,
) -> Result<ApiJson<Product>> {
    if body.stock < 0 {
        return Err(AppError::Validation("stock must not be negative".to_owned()));
    }
    let product = state
        .repos()
        .catalog
        .set_stock(id, body.stock)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => AppError::NotFound("product".to_owned()),
            other => other,
        })?;
    tracing::info!(stock = product.stock, "stock updated");
    Ok(ApiJson(product))
}
