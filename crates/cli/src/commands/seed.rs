//! Seed the catalog from a YAML file.
//!
//! The file is parsed and validated before connecting to the database.
//! Categories and products whose slug already exists are skipped, so the
//! command can be re-run safely.
//!
//! ```yaml
//! categories:
//!   - slug: lighting
//!     name: Lighting
//! products:
//!   - slug: driftwood-lamp
//!     name: Driftwood Lamp
//!     price: "54.00"
//!     stock: 12
//!     category: lighting
//! ```

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use driftwood_storefront::db::{CatalogRepository, Repositories, RepositoryError};
use driftwood_storefront::models::{NewCategory, NewProduct};

use super::connect;

/// Errors from seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error("product {product} references unknown category {category}")]
    UnknownCategory { product: String, category: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Top-level catalog file.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<NewCategory>,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

/// One product in the catalog file; `category` is a slug.
#[derive(Debug, Deserialize)]
pub struct ProductEntry {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// What a seeding run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories_created: usize,
    pub products_created: usize,
    pub skipped: usize,
}

impl ProductEntry {
    fn to_new_product(&self, category_id: Option<driftwood_core::CategoryId>) -> NewProduct {
        NewProduct {
            category_id,
            slug: self.slug.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            stock: self.stock,
            active: self.active,
        }
    }
}

/// Every problem in the file, one message each.
#[must_use]
pub fn validate(file: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    for category in &file.categories {
        if let Err(e) = category.validate() {
            errors.push(format!("category {}: {e}", category.slug));
        }
    }
    for product in &file.products {
        if let Err(e) = product.to_new_product(None).validate() {
            errors.push(format!("product {}: {e}", product.slug));
        }
    }
    errors
}

/// Insert the file's contents through `catalog`.
///
/// # Errors
///
/// Returns `UnknownCategory` if a product names a category that is neither in
/// the file nor in the store, or `Repository` on a store failure.
pub async fn seed_into(
    catalog: &dyn CatalogRepository,
    file: &CatalogFile,
) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();

    for category in &file.categories {
        match catalog.create_category(category).await {
            Ok(created) => {
                info!(slug = %created.slug, "Created category");
                summary.categories_created += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                warn!(slug = %category.slug, "Category exists, skipping");
                summary.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let categories: HashMap<String, _> = catalog
        .list_categories()
        .await?
        .into_iter()
        .map(|c| (c.slug, c.id))
        .collect();

    for entry in &file.products {
        let category_id = match &entry.category {
            Some(slug) => Some(*categories.get(slug).ok_or_else(|| {
                SeedError::UnknownCategory {
                    product: entry.slug.clone(),
                    category: slug.clone(),
                }
            })?),
            None => None,
        };

        match catalog.create_product(&entry.to_new_product(category_id)).await {
            Ok(created) => {
                info!(slug = %created.slug, stock = created.stock, "Created product");
                summary.products_created += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                warn!(slug = %entry.slug, "Product exists, skipping");
                summary.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(summary)
}

/// Seed the catalog from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is invalid, or if database
/// operations fail.
pub async fn catalog(file_path: &str) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let file: CatalogFile = serde_yaml::from_str(&content)?;

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()).into());
    }
    info!(
        categories = file.categories.len(),
        products = file.products.len(),
        "Catalog validated"
    );

    let repos = Repositories::postgres(connect().await?);
    Ok(seed_into(repos.catalog.as_ref(), &file).await?)
}
