//! Catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use driftwood_core::{CategoryId, MAX_AMOUNT, ProductId};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub slug: String,
    pub name: String,
}

/// A sellable product with its current stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    /// Inactive products are hidden from listings and cannot be ordered.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data needed to create a category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCategory {
    pub slug: String,
    pub name: String,
}

/// Data needed to create a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl NewProduct {
    /// Check slug shape, name, price and stock.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_slug(&self.slug)?;
        if self.name.trim().is_empty() {
            return Err("name is required".to_owned());
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err("price must not be negative".to_owned());
        }
        if self.price.scale() > 2 {
            return Err("price must have at most two decimal places".to_owned());
        }
        if self.price > MAX_AMOUNT {
            return Err(format!("price must not exceed {MAX_AMOUNT}"));
        }
        if self.stock < 0 {
            return Err("stock must not be negative".to_owned());
        }
        Ok(())
    }
}

impl NewCategory {
    /// Check slug shape and name.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_slug(&self.slug)?;
        if self.name.trim().is_empty() {
            return Err("name is required".to_owned());
        }
        Ok(())
    }
}

/// Slugs are lowercase ASCII letters, digits and single dashes.
fn validate_slug(slug: &str) -> Result<(), String> {
    let well_formed = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if well_formed {
        Ok(())
    } else {
        Err(format!("invalid slug: {slug:?}"))
    }
}

/// Listing filter for products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    /// Include inactive products (back-office only).
    #[serde(default)]
    pub include_inactive: bool,
}
