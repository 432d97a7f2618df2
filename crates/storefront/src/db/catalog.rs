//! `PostgreSQL` catalog and inventory storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use driftwood_core::{CategoryId, ProductId};

use super::{CatalogRepository, InventoryRepository, PgStore, RepositoryError, conflict_on_unique};
use crate::models::{Category, NewCategory, NewProduct, Product, ProductFilter};

const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.slug, p.name, p.description, p.price, \
                               p.stock, p.active, p.created_at, p.updated_at";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    slug: String,
    name: String,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self {
            id: r.id,
            slug: r.slug,
            name: r.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: Option<CategoryId>,
    slug: String,
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            category_id: r.category_id,
            slug: r.slug,
            name: r.name,
            description: r.description,
            price: r.price,
            stock: r.stock,
            active: r.active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> =
            sqlx::query_as("SELECT id, slug, name FROM storefront.categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn create_category(&self, category: &NewCategory) -> Result<Category, RepositoryError> {
        let row: CategoryRow = sqlx::query_as(
            "INSERT INTO storefront.categories (slug, name) VALUES ($1, $2)
             RETURNING id, slug, name",
        )
        .bind(&category.slug)
        .bind(&category.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "category slug already exists"))?;
        Ok(row.into())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM storefront.products p
             LEFT JOIN storefront.categories c ON c.id = p.category_id
             WHERE ($1::text IS NULL OR c.slug = $1)
               AND (p.active OR $2)
             ORDER BY p.name, p.id"
        ))
        .bind(&filter.category)
        .bind(filter.include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.products p
             WHERE p.id = ANY($1)
             ORDER BY p.id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(&format!(
            "INSERT INTO storefront.products AS p
                 (category_id, slug, name, description, price, stock, active)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.category_id)
        .bind(&product.slug)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product slug already exists"))?;
        Ok(row.into())
    }

    async fn set_stock(&self, id: ProductId, stock: i32) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "UPDATE storefront.products AS p SET stock = $2, updated_at = now()
             WHERE p.id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(stock)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Product::from).ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl InventoryRepository for PgStore {
    async fn release_stock(&self, lines: &[(ProductId, i32)]) -> Result<(), RepositoryError> {
        let mut lines = lines.to_vec();
        lines.sort_unstable_by_key(|(id, _)| *id);

        let mut tx = self.pool.begin().await?;
        for (product_id, quantity) in lines {
            sqlx::query(
                "UPDATE storefront.products SET stock = stock + $2, updated_at = now()
                 WHERE id = $1",
            )
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
