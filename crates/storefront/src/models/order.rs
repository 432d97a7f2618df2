//! Order aggregate and statistics types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use driftwood_core::pricing::round_currency;
use driftwood_core::{
    AddressId, MAX_AMOUNT, OrderId, OrderItemId, OrderNumber, OrderStatus, OrderTotals, ProductId,
    UserId,
};

use super::AddressSnapshot;

/// A persisted order with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    /// Saved address used at checkout; cleared if that address is deleted.
    pub address_id: Option<AddressId>,
    pub shipping_address: AddressSnapshot,
    #[serde(skip_serializing)]
    pub idempotency_key: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The totals captured at checkout.
    #[must_use]
    pub const fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            tax: self.tax,
            shipping: self.shipping,
            total: self.total,
        }
    }
}

/// One line of an order, with product name and price frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Everything needed to persist a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub totals: OrderTotals,
    pub address_id: Option<AddressId>,
    pub shipping_address: AddressSnapshot,
    pub idempotency_key: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// A priced order line awaiting persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

impl NewOrderItem {
    /// Price a line, freezing `unit_price × quantity` rounded to cents.
    ///
    /// Returns `None` when the line total would exceed [`MAX_AMOUNT`].
    #[must_use]
    pub fn priced(
        product_id: ProductId,
        product_name: String,
        unit_price: Decimal,
        quantity: i32,
    ) -> Option<Self> {
        let line_total = unit_price
            .checked_mul(Decimal::from(quantity))
            .map(round_currency)
            .filter(|total| *total <= MAX_AMOUNT)?;
        Some(Self {
            product_id,
            product_name,
            unit_price,
            quantity,
            line_total,
        })
    }
}

/// Back-office listing filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
}

/// Window and owner for [`OrderStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct StatisticsScope {
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    pub user_id: Option<UserId>,
}

impl StatisticsScope {
    /// Whether an order created at `at` by `user_id` falls inside this scope.
    #[must_use]
    pub fn contains(&self, user_id: UserId, at: DateTime<Utc>) -> bool {
        self.user_id.is_none_or(|id| id == user_id)
            && self.from.is_none_or(|from| at >= from)
            && self.to.is_none_or(|to| at < to)
    }
}

/// Count and value of orders in one status, as returned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSummary {
    pub status: OrderStatus,
    pub count: i64,
    pub total: Decimal,
}

/// Per-status line of [`OrderStatistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    pub status: OrderStatus,
    pub count: i64,
    pub total: Decimal,
}

/// Aggregate order figures over a [`StatisticsScope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderStatistics {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub user_id: Option<UserId>,
    pub total_orders: i64,
    /// Sum of order totals excluding cancelled orders.
    pub revenue: Decimal,
    /// `revenue` divided by the number of non-cancelled orders.
    pub average_order_value: Decimal,
    /// One entry per status, in lifecycle order, zero-filled.
    pub by_status: Vec<StatusBreakdown>,
}

impl OrderStatistics {
    /// Fold per-status summaries into the full report.
    #[must_use]
    pub fn from_summaries(scope: StatisticsScope, summaries: &[StatusSummary]) -> Self {
        let by_status: Vec<StatusBreakdown> = OrderStatus::ALL
            .into_iter()
            .map(|status| {
                let (count, total) = summaries
                    .iter()
                    .filter(|s| s.status == status)
                    .fold((0, Decimal::ZERO), |(count, total), s| {
                        (count + s.count, total + s.total)
                    });
                StatusBreakdown {
                    status,
                    count,
                    total,
                }
            })
            .collect();

        let total_orders = by_status.iter().map(|b| b.count).sum();
        let (paid_orders, revenue) = by_status
            .iter()
            .filter(|b| b.status != OrderStatus::Cancelled)
            .fold((0_i64, Decimal::ZERO), |(count, revenue), b| {
                (count + b.count, revenue + b.total)
            });
        let average_order_value = if paid_orders == 0 {
            Decimal::ZERO
        } else {
            round_currency(revenue / Decimal::from(paid_orders))
        };

        Self {
            from: scope.from,
            to: scope.to,
            user_id: scope.user_id,
            total_orders,
            revenue,
            average_order_value,
            by_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(status: OrderStatus, count: i64, cents: i64) -> StatusSummary {
        StatusSummary {
            status,
            count,
            total: Decimal::new(cents, 2),
        }
    }

    #[test]
    fn test_statistics_zero_fill_and_revenue() {
        let stats = OrderStatistics::from_summaries(
            StatisticsScope::default(),
            &[
                summary(OrderStatus::Pending, 2, 12_800),
                summary(OrderStatus::Delivered, 1, 16_200),
                summary(OrderStatus::Cancelled, 3, 30_000),
            ],
        );

        assert_eq!(stats.by_status.len(), 5);
        assert_eq!(stats.by_status[1].status, OrderStatus::Confirmed);
        assert_eq!(stats.by_status[1].count, 0);
        assert_eq!(stats.total_orders, 6);
        assert_eq!(stats.revenue, Decimal::new(29_000, 2));
        assert_eq!(stats.average_order_value, Decimal::new(9_667, 2));
    }

    #[test]
    fn test_statistics_empty() {
        let stats = OrderStatistics::from_summaries(StatisticsScope::default(), &[]);
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.revenue, Decimal::ZERO);
        assert_eq!(stats.average_order_value, Decimal::ZERO);
        assert!(stats.by_status.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_scope_contains() {
        let now = Utc::now();
        let scope = StatisticsScope {
            from: Some(now - chrono::Duration::days(1)),
            to: Some(now),
            user_id: Some(UserId::new(7)),
        };
        assert!(scope.contains(UserId::new(7), now - chrono::Duration::hours(1)));
        assert!(!scope.contains(UserId::new(8), now - chrono::Duration::hours(1)));
        assert!(!scope.contains(UserId::new(7), now));
    }

    #[test]
    fn test_priced_line() {
        let lamp = |price: Decimal, quantity| {
            NewOrderItem::priced(ProductId::new(1), "Lamp".to_owned(), price, quantity)
        };

        let line = lamp(Decimal::new(1250, 2), 3).map(|l| l.line_total);
        assert_eq!(line.map(|t| t.to_string()), Some("37.50".to_owned()));

        assert!(lamp(MAX_AMOUNT, 1).is_some());
        assert!(lamp(MAX_AMOUNT, 2).is_none());
        assert!(lamp(Decimal::MAX, 2).is_none());
    }
}
