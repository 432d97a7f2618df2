//! `PostgreSQL` order storage.
//!
//! Orders are always returned with their items. Item rows for a page of
//! orders are fetched with a single `order_id = ANY($1)` query.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;

use driftwood_core::{
    AddressId, OrderId, OrderItemId, OrderNumber, OrderStatus, ProductId, UserId,
};

use super::{CreateOrderError, OrderRepository, PgStore, RepositoryError};
use crate::models::{
    AddressSnapshot, NewOrder, Order, OrderFilter, OrderItem, StatisticsScope, StatusSummary,
};

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, subtotal, tax, shipping, total, \
                             address_id, shipping_address, idempotency_key, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, unit_price, quantity, line_total";

const ORDER_NUMBER_CONSTRAINT: &str = "order_number_unique";
const IDEMPOTENCY_CONSTRAINT: &str = "order_idempotency_key_unique";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    status: OrderStatus,
    subtotal: Decimal,
    tax: Decimal,
    shipping: Decimal,
    total: Decimal,
    address_id: Option<AddressId>,
    shipping_address: Json<AddressSnapshot>,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let order_number = OrderNumber::parse(&self.order_number).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order number in database: {e}"))
        })?;
        Ok(Order {
            id: self.id,
            order_number,
            user_id: self.user_id,
            status: self.status,
            subtotal: self.subtotal,
            tax: self.tax,
            shipping: self.shipping,
            total: self.total,
            address_id: self.address_id,
            shipping_address: self.shipping_address.0,
            idempotency_key: self.idempotency_key,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            product_name: r.product_name,
            unit_price: r.unit_price,
            quantity: r.quantity,
            line_total: r.line_total,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatusSummaryRow {
    status: OrderStatus,
    count: i64,
    total: Decimal,
}

fn map_insert_error(e: sqlx::Error) -> CreateOrderError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        match db_err.constraint() {
            Some(ORDER_NUMBER_CONSTRAINT) => return CreateOrderError::DuplicateOrderNumber,
            Some(IDEMPOTENCY_CONSTRAINT) => return CreateOrderError::DuplicateIdempotencyKey,
            _ => {}
        }
    }
    CreateOrderError::from(e)
}

impl PgStore {
    /// Attach items to a page of order rows, preserving row order.
    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM storefront.order_items
             WHERE order_id = ANY($1)
             ORDER BY order_id, id"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }

    async fn fetch_one_order(&self, row: Option<OrderRow>) -> Result<Option<Order>, RepositoryError> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, CreateOrderError> {
        let mut tx = self.pool.begin().await?;

        // Lock products in id order so concurrent checkouts cannot deadlock.
        let mut lines = order.items.clone();
        lines.sort_unstable_by_key(|item| item.product_id);

        for line in &lines {
            let updated = sqlx::query(
                "UPDATE storefront.products SET stock = stock - $2, updated_at = now()
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT stock FROM storefront.products WHERE id = $1")
                        .bind(line.product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                return Err(CreateOrderError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available: available.unwrap_or(0),
                });
            }
        }

        let row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO storefront.orders
                 (order_number, user_id, status, subtotal, tax, shipping, total,
                  address_id, shipping_address, idempotency_key)
             VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.order_number.as_str())
        .bind(order.user_id)
        .bind(order.totals.subtotal)
        .bind(order.totals.tax)
        .bind(order.totals.shipping)
        .bind(order.totals.total)
        .bind(order.address_id)
        .bind(Json(&order.shipping_address))
        .bind(&order.idempotency_key)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let item_row: OrderItemRow = sqlx::query_as(&format!(
                "INSERT INTO storefront.order_items
                     (order_id, product_id, product_name, unit_price, quantity, line_total)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING {ITEM_COLUMNS}"
            ))
            .bind(row.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(item.line_total)
            .fetch_one(&mut *tx)
            .await?;
            items.push(OrderItem::from(item_row));
        }

        tx.commit().await?;
        Ok(row.into_order(items)?)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        self.fetch_one_order(row).await
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders
             WHERE user_id = $1 AND idempotency_key = $2"
        ))
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        self.fetch_one_order(row).await
    }

    async fn order_number_exists(&self, number: &OrderNumber) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM storefront.orders WHERE order_number = $1)",
        )
        .bind(number.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        self.list(OrderFilter {
            status: None,
            user_id: Some(user_id),
        })
        .await
    }

    async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders
             WHERE ($1::storefront.order_status IS NULL OR status = $1)
               AND ($2::int IS NULL OR user_id = $2)
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(filter.status)
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE storefront.orders SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;
        self.fetch_one_order(row).await
    }

    async fn status_summary(
        &self,
        scope: StatisticsScope,
    ) -> Result<Vec<StatusSummary>, RepositoryError> {
        let rows: Vec<StatusSummaryRow> = sqlx::query_as(
            "SELECT status, COUNT(*) AS count, COALESCE(SUM(total), 0) AS total
             FROM storefront.orders
             WHERE ($1::timestamptz IS NULL OR created_at >= $1)
               AND ($2::timestamptz IS NULL OR created_at < $2)
               AND ($3::int IS NULL OR user_id = $3)
             GROUP BY status",
        )
        .bind(scope.from)
        .bind(scope.to)
        .bind(scope.user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| StatusSummary {
                status: r.status,
                count: r.count,
                total: r.total,
            })
            .collect())
    }
}
