//! Order lifecycle service.
//!
//! Checkout turns cart lines into a persisted order: lines are validated and
//! merged, prices are frozen from the catalog, totals come from the
//! [`PricingPolicy`], and the repository writes order, items and stock
//! decrements in one transaction. Status changes go through the
//! [`OrderStatus`] state machine and are written compare-and-set.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;

use driftwood_core::{
    AddressId, OrderId, OrderStatus, PricingError, PricingPolicy, ProductId, TransitionError,
    TransitionMode,
};

use crate::db::{
    AddressRepository, CatalogRepository, CreateOrderError, InventoryRepository, OrderRepository,
    Repositories, RepositoryError,
};
use crate::middleware::access::{Access, authorize};
use crate::models::{
    Address, AddressSnapshot, CartLine, CurrentUser, NewOrder, NewOrderItem, Order, OrderFilter,
    OrderStatistics, StatisticsScope,
};
use crate::services::order_number::{GenerationError, OrderNumberGenerator};

/// Largest quantity accepted for a single product in one order.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Insert attempts when the order number loses a race on the unique index.
pub const INSERT_ATTEMPTS: u32 = 3;

/// Longest accepted `Idempotency-Key`.
pub const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 255;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("order not found")]
    NotFound,

    #[error("not allowed to access this order")]
    Forbidden,

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// No unique order number could be allocated; safe to retry.
    #[error("could not allocate an order number, try again")]
    GenerationExhausted,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<GenerationError> for OrderError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::Exhausted { attempts } => {
                tracing::error!(attempts, "order number generation exhausted");
                Self::GenerationExhausted
            }
            GenerationError::Invalid(e) => {
                Self::Repository(RepositoryError::DataCorruption(e.to_string()))
            }
            GenerationError::Repository(e) => Self::Repository(e),
        }
    }
}

/// A checkout request.
#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    pub lines: Vec<CartLine>,
    /// Explicit shipping address; the user's default is used when absent.
    pub address_id: Option<AddressId>,
    pub idempotency_key: Option<String>,
}

/// Result of a checkout.
#[derive(Debug, Clone)]
pub enum Checkout {
    /// A new order was placed.
    Created(Order),
    /// The idempotency key was already used; this is the original order.
    Replayed(Order),
}

impl Checkout {
    #[must_use]
    pub fn into_order(self) -> Order {
        match self {
            Self::Created(order) | Self::Replayed(order) => order,
        }
    }
}

/// Order creation, lookup, status changes and statistics.
pub struct OrderService<'a> {
    orders: &'a dyn OrderRepository,
    catalog: &'a dyn CatalogRepository,
    addresses: &'a dyn AddressRepository,
    inventory: &'a dyn InventoryRepository,
    pricing: PricingPolicy,
    numbers: OrderNumberGenerator<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub fn new(repos: &'a Repositories, pricing: PricingPolicy) -> Self {
        Self {
            orders: repos.orders.as_ref(),
            catalog: repos.catalog.as_ref(),
            addresses: repos.addresses.as_ref(),
            inventory: repos.inventory.as_ref(),
            pricing,
            numbers: OrderNumberGenerator::new(repos.orders.as_ref()),
        }
    }

    /// Replace the order number generator.
    #[must_use]
    pub fn with_numbers(mut self, numbers: OrderNumberGenerator<'a>) -> Self {
        self.numbers = numbers;
        self
    }

    /// Place an order for `actor`.
    ///
    /// # Errors
    ///
    /// - `Validation` for empty carts, bad quantities, unknown or inactive
    ///   products, or no usable address
    /// - `Forbidden` for an address owned by someone else
    /// - `InsufficientStock` if any line cannot be fulfilled (nothing is written)
    /// - `GenerationExhausted` if no order number could be allocated
    pub async fn create_order(
        &self,
        actor: &CurrentUser,
        request: CheckoutRequest,
    ) -> Result<Checkout, OrderError> {
        let idempotency_key = validate_idempotency_key(request.idempotency_key)?;
        if let Some(key) = &idempotency_key
            && let Some(existing) = self.orders.find_by_idempotency_key(actor.id, key).await?
        {
            tracing::info!(order_id = %existing.id, user_id = %actor.id, "checkout replayed by idempotency key");
            return Ok(Checkout::Replayed(existing));
        }

        let lines = merge_lines(&request.lines)?;
        let address = self.resolve_address(actor, request.address_id).await?;
        let items = self.price_lines(&lines).await?;

        let subtotal = items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.line_total))
            .ok_or_else(|| OrderError::Validation(PricingError::AmountTooLarge.to_string()))?;
        let totals = self
            .pricing
            .compute_totals(subtotal)
            .map_err(|e| OrderError::Validation(e.to_string()))?;

        for attempt in 1..=INSERT_ATTEMPTS {
            let order_number = self.numbers.generate().await?;
            let new_order = NewOrder {
                order_number,
                user_id: actor.id,
                totals,
                address_id: Some(address.id),
                shipping_address: AddressSnapshot::from(&address),
                idempotency_key: idempotency_key.clone(),
                items: items.clone(),
            };

            match self.orders.insert(new_order).await {
                Ok(order) => {
                    tracing::info!(
                        order_id = %order.id,
                        order_number = %order.order_number,
                        user_id = %actor.id,
                        total = %order.total,
                        items = order.items.len(),
                        "order created"
                    );
                    return Ok(Checkout::Created(order));
                }
                Err(CreateOrderError::DuplicateOrderNumber) => {
                    tracing::warn!(attempt, "order number taken at insert, retrying");
                }
                Err(CreateOrderError::DuplicateIdempotencyKey) => {
                    let key = idempotency_key.as_deref().unwrap_or_default();
                    let existing = self
                        .orders
                        .find_by_idempotency_key(actor.id, key)
                        .await?
                        .ok_or(OrderError::NotFound)?;
                    return Ok(Checkout::Replayed(existing));
                }
                Err(CreateOrderError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                }) => {
                    return Err(OrderError::InsufficientStock {
                        product_id,
                        requested,
                        available,
                    });
                }
                Err(CreateOrderError::Repository(e)) => return Err(e.into()),
            }
        }

        tracing::error!(user_id = %actor.id, "order insert kept colliding on order number");
        Err(OrderError::GenerationExhausted)
    }

    /// Explicit address (owned by the actor), else the actor's default.
    async fn resolve_address(
        &self,
        actor: &CurrentUser,
        address_id: Option<AddressId>,
    ) -> Result<Address, OrderError> {
        match address_id {
            Some(id) => {
                let address = self
                    .addresses
                    .get(id)
                    .await?
                    .ok_or_else(|| OrderError::Validation(format!("unknown address {id}")))?;
                authorize(Some(actor), Access::Owner(address.user_id))
                    .into_result()
                    .map_err(|_| OrderError::Forbidden)?;
                Ok(address)
            }
            None => self
                .addresses
                .get_default(actor.id)
                .await?
                .ok_or_else(|| {
                    OrderError::Validation("no shipping address: add one or pass address_id".to_owned())
                }),
        }
    }

    /// Freeze names and prices for merged lines, checking availability.
    async fn price_lines(
        &self,
        lines: &BTreeMap<ProductId, i32>,
    ) -> Result<Vec<NewOrderItem>, OrderError> {
        let ids: Vec<ProductId> = lines.keys().copied().collect();
        let products = self.catalog.get_products(&ids).await?;

        lines
            .iter()
            .map(|(&product_id, &quantity)| {
                let product = products
                    .iter()
                    .find(|p| p.id == product_id && p.active)
                    .ok_or_else(|| {
                        OrderError::Validation(format!("product {product_id} is not available"))
                    })?;
                if product.stock < quantity {
                    return Err(OrderError::InsufficientStock {
                        product_id,
                        requested: quantity,
                        available: product.stock,
                    });
                }
                NewOrderItem::priced(product_id, product.name.clone(), product.price, quantity)
                    .ok_or_else(|| {
                        OrderError::Validation(format!(
                            "line total for product {product_id} is too large"
                        ))
                    })
            })
            .collect()
    }

    /// Load an order the actor may see.
    async fn visible_order(&self, actor: &CurrentUser, id: OrderId) -> Result<Order, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
        authorize(Some(actor), Access::OwnerOrAdmin(order.user_id))
            .into_result()
            .map_err(|_| OrderError::Forbidden)?;
        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden` (owner-or-admin).
    pub async fn get_order(&self, actor: &CurrentUser, id: OrderId) -> Result<Order, OrderError> {
        self.visible_order(actor, id).await
    }

    /// The actor's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the store fails.
    pub async fn list_orders(&self, actor: &CurrentUser) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(actor.id).await?)
    }

    /// Every order matching `filter` (back-office).
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the store fails.
    pub async fn list_all_orders(&self, filter: OrderFilter) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list(filter).await?)
    }

    /// Move an order to `new_status`.
    ///
    /// Customers may only cancel their own orders; every other change, and
    /// any [`TransitionMode::Override`], needs an admin.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the order does not exist
    /// - `Forbidden` if the actor may not make this change
    /// - `InvalidTransition` if the state machine rejects it, including when
    ///   a concurrent change got there first
    pub async fn update_order_status(
        &self,
        id: OrderId,
        new_status: OrderStatus,
        actor: &CurrentUser,
        mode: TransitionMode,
    ) -> Result<Order, OrderError> {
        let order = self.visible_order(actor, id).await?;

        if !actor.is_admin()
            && (mode == TransitionMode::Override || new_status != OrderStatus::Cancelled)
        {
            return Err(OrderError::Forbidden);
        }

        order.status.check_transition(new_status, mode)?;

        let Some(updated) = self
            .orders
            .transition_status(id, order.status, new_status)
            .await?
        else {
            let current = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
            return Err(TransitionError {
                from: current.status,
                to: new_status,
            }
            .into());
        };

        tracing::info!(
            order_id = %id,
            from = %order.status,
            to = %new_status,
            actor_id = %actor.id,
            ?mode,
            "order status changed"
        );

        if new_status == OrderStatus::Cancelled {
            self.release_stock(&updated).await?;
        }

        Ok(updated)
    }

    /// Cancel an order and return its stock.
    ///
    /// # Errors
    ///
    /// As [`Self::update_order_status`]; shipped and delivered orders give
    /// `InvalidTransition`.
    pub async fn cancel_order(&self, id: OrderId, actor: &CurrentUser) -> Result<Order, OrderError> {
        self.update_order_status(id, OrderStatus::Cancelled, actor, TransitionMode::Standard)
            .await
    }

    async fn release_stock(&self, order: &Order) -> Result<(), OrderError> {
        let lines: Vec<(ProductId, i32)> = order
            .items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();

        if let Err(e) = self.inventory.release_stock(&lines).await {
            tracing::error!(order_id = %order.id, error = %e, "failed to release stock for cancelled order");
            return Err(e.into());
        }
        tracing::info!(order_id = %order.id, lines = lines.len(), "stock released");
        Ok(())
    }

    /// Aggregate order figures.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `from` is after `to`.
    pub async fn order_statistics(
        &self,
        scope: StatisticsScope,
    ) -> Result<OrderStatistics, OrderError> {
        if let (Some(from), Some(to)) = (scope.from, scope.to)
            && from > to
        {
            return Err(OrderError::Validation("`from` must not be after `to`".to_owned()));
        }
        let summaries = self.orders.status_summary(scope).await?;
        Ok(OrderStatistics::from_summaries(scope, &summaries))
    }
}

fn validate_idempotency_key(key: Option<String>) -> Result<Option<String>, OrderError> {
    let Some(key) = key else {
        return Ok(None);
    };
    let key = key.trim().to_owned();
    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LENGTH {
        return Err(OrderError::Validation(format!(
            "Idempotency-Key must be 1 to {MAX_IDEMPOTENCY_KEY_LENGTH} characters"
        )));
    }
    Ok(Some(key))
}

/// Check quantities and merge repeated products, keyed in id order.
fn merge_lines(lines: &[CartLine]) -> Result<BTreeMap<ProductId, i32>, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::Validation(
            "order must contain at least one item".to_owned(),
        ));
    }

    let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();
    for line in lines {
        if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
            return Err(OrderError::Validation(format!(
                "quantity for product {} must be between 1 and {MAX_LINE_QUANTITY}",
                line.product_id
            )));
        }
        *merged.entry(line.product_id).or_default() += line.quantity;
    }

    merged
        .into_iter()
        .map(|(product_id, quantity)| {
            if quantity > MAX_LINE_QUANTITY {
                return Err(OrderError::Validation(format!(
                    "quantity for product {product_id} must be between 1 and {MAX_LINE_QUANTITY}"
                )));
            }
            let quantity = i32::try_from(quantity)
                .map_err(|_| OrderError::Validation("quantity out of range".to_owned()))?;
            Ok((product_id, quantity))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use driftwood_core::{Email, UserId, UserRole};

    use super::*;
    use crate::models::{AddressInput, NewProduct};

    struct Fixture {
        repos: Repositories,
        customer: CurrentUser,
        stranger: CurrentUser,
        admin: CurrentUser,
    }

    fn user(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse(&format!("user{id}@example.com")).unwrap(),
            role,
        }
    }

    impl Fixture {
        async fn new() -> Self {
            let repos = Repositories::in_memory();
            let customer = user(1, UserRole::Customer);
            for owner in [1, 2] {
                repos
                    .addresses
                    .create(
                        UserId::new(owner),
                        &AddressInput {
                            full_name: "Ada Lovelace".to_owned(),
                            line1: "12 Harbour Rd".to_owned(),
                            line2: None,
                            city: "Portsmouth".to_owned(),
                            region: "Hampshire".to_owned(),
                            postal_code: "PO1 2AB".to_owned(),
                            country: "GB".to_owned(),
                            phone: None,
                            is_default: false,
                        },
                    )
                    .await
                    .unwrap();
            }
            Self {
                repos,
                customer,
                stranger: user(2, UserRole::Customer),
                admin: user(3, UserRole::Admin),
            }
        }

        fn service(&self) -> OrderService<'_> {
            OrderService::new(&self.repos, PricingPolicy::default())
        }

        async fn product(&self, slug: &str, cents: i64, stock: i32) -> ProductId {
            self.repos
                .catalog
                .create_product(&NewProduct {
                    category_id: None,
                    slug: slug.to_owned(),
                    name: slug.to_owned(),
                    description: String::new(),
                    price: Decimal::new(cents, 2),
                    stock,
                    active: true,
                })
                .await
                .unwrap()
                .id
        }

        async fn stock(&self, id: ProductId) -> i32 {
            self.repos.catalog.get_product(id).await.unwrap().unwrap().stock
        }
    }

    fn line(product_id: ProductId, quantity: u32) -> CartLine {
        CartLine {
            product_id,
            quantity,
        }
    }

    fn checkout(lines: Vec<CartLine>) -> CheckoutRequest {
        CheckoutRequest {
            lines,
            ..CheckoutRequest::default()
        }
    }

    #[tokio::test]
    async fn test_checkout_prices_and_decrements_stock() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 1250, 10).await;
        let print = fx.product("print", 2500, 5).await;

        let order = fx
            .service()
            .create_order(&fx.customer, checkout(vec![line(mug, 2), line(print, 1)]))
            .await
            .unwrap()
            .into_order();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.subtotal, Decimal::new(5000, 2));
        assert_eq!(order.tax, Decimal::new(400, 2));
        assert_eq!(order.shipping, Decimal::new(1000, 2));
        assert_eq!(order.total, Decimal::new(6400, 2));
        assert_eq!(order.total, order.subtotal + order.tax + order.shipping);
        assert!(order.order_number.as_str().starts_with("ORD"));
        assert_eq!(order.shipping_address.city, "Portsmouth");
        assert_eq!(fx.stock(mug).await, 8);
        assert_eq!(fx.stock(print).await, 4);
    }

    #[tokio::test]
    async fn test_free_shipping_order() {
        let fx = Fixture::new().await;
        let lamp = fx.product("lamp", 7500, 10).await;

        let order = fx
            .service()
            .create_order(&fx.customer, checkout(vec![line(lamp, 2)]))
            .await
            .unwrap()
            .into_order();

        assert_eq!(order.subtotal, Decimal::new(15000, 2));
        assert_eq!(order.shipping, Decimal::ZERO);
        assert_eq!(order.total, Decimal::new(16200, 2));
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_merged() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 1000, 10).await;

        let order = fx
            .service()
            .create_order(&fx.customer, checkout(vec![line(mug, 2), line(mug, 3)]))
            .await
            .unwrap()
            .into_order();

        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 5);
        assert_eq!(order.items[0].line_total, Decimal::new(5000, 2));
    }

    #[tokio::test]
    async fn test_checkout_validation() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 1000, 10).await;
        let service = fx.service();

        for request in [
            checkout(vec![]),
            checkout(vec![line(mug, 0)]),
            checkout(vec![line(mug, 100)]),
            checkout(vec![line(mug, 60), line(mug, 40)]),
            checkout(vec![line(ProductId::new(999), 1)]),
        ] {
            assert!(matches!(
                service.create_order(&fx.customer, request).await,
                Err(OrderError::Validation(_))
            ));
        }
        assert_eq!(fx.stock(mug).await, 10);
    }

    #[tokio::test]
    async fn test_amounts_beyond_money_columns_are_rejected() {
        let fx = Fixture::new().await;
        let yacht = fx.product("yacht", 200_000_000_000, 100).await;
        let unbounded = fx
            .repos
            .catalog
            .create_product(&NewProduct {
                category_id: None,
                slug: "unbounded".to_owned(),
                name: "Unbounded".to_owned(),
                description: String::new(),
                price: Decimal::MAX,
                stock: 10,
                active: true,
            })
            .await
            .unwrap()
            .id;
        let service = fx.service();

        for request in [
            checkout(vec![line(yacht, 99)]),
            checkout(vec![line(unbounded, 2)]),
            checkout(vec![line(yacht, 1), line(unbounded, 1)]),
        ] {
            assert!(matches!(
                service.create_order(&fx.customer, request).await,
                Err(OrderError::Validation(_))
            ));
        }
        assert_eq!(fx.stock(yacht).await, 100);
        assert_eq!(fx.stock(unbounded).await, 10);

        // Largest order that still fits.
        let order = service
            .create_order(&fx.customer, checkout(vec![line(yacht, 4)]))
            .await
            .unwrap()
            .into_order();
        assert_eq!(order.subtotal, Decimal::new(800_000_000_000, 2));
        assert_eq!(order.total, Decimal::new(864_000_000_000, 2));
    }

    #[tokio::test]
    async fn test_no_address_is_a_validation_error() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 1000, 10).await;
        let homeless = user(50, UserRole::Customer);

        assert!(matches!(
            fx.service()
                .create_order(&homeless, checkout(vec![line(mug, 1)]))
                .await,
            Err(OrderError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_foreign_address_is_forbidden() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 1000, 10).await;
        let stranger_address = fx
            .repos
            .addresses
            .get_default(fx.stranger.id)
            .await
            .unwrap()
            .unwrap();

        let request = CheckoutRequest {
            lines: vec![line(mug, 1)],
            address_id: Some(stranger_address.id),
            idempotency_key: None,
        };
        assert!(matches!(
            fx.service().create_order(&fx.customer, request).await,
            Err(OrderError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_no_partial_order() {
        let fx = Fixture::new().await;
        let plenty = fx.product("plenty", 1000, 10).await;
        let scarce = fx.product("scarce", 1000, 1).await;

        let result = fx
            .service()
            .create_order(
                &fx.customer,
                checkout(vec![line(plenty, 3), line(scarce, 2)]),
            )
            .await;

        assert!(matches!(
            result,
            Err(OrderError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            })
        ));
        assert_eq!(fx.stock(plenty).await, 10);
        assert_eq!(fx.stock(scarce).await, 1);
        assert!(
            fx.service()
                .list_orders(&fx.customer)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_idempotency_key_replays_original_order() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 1000, 10).await;
        let service = fx.service();
        let request = CheckoutRequest {
            lines: vec![line(mug, 1)],
            address_id: None,
            idempotency_key: Some("checkout-1".to_owned()),
        };

        let first = service
            .create_order(&fx.customer, request.clone())
            .await
            .unwrap();
        let second = service.create_order(&fx.customer, request).await.unwrap();

        let (Checkout::Created(first), Checkout::Replayed(second)) = (first, second) else {
            panic!("expected created then replayed");
        };
        assert_eq!(first.id, second.id);
        assert_eq!(fx.stock(mug).await, 9);
    }

    #[tokio::test]
    async fn test_order_number_race_is_retried() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 1000, 10).await;

        let taken = fx
            .service()
            .create_order(&fx.customer, checkout(vec![line(mug, 1)]))
            .await
            .unwrap()
            .into_order();

        // The existence check never sees the collision; only the insert does.
        struct Blind<'a>(&'a dyn OrderRepository);
        #[async_trait::async_trait]
        impl OrderRepository for Blind<'_> {
            async fn insert(&self, order: NewOrder) -> Result<Order, CreateOrderError> {
                self.0.insert(order).await
            }
            async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
                self.0.get(id).await
            }
            async fn find_by_idempotency_key(
                &self,
                user_id: UserId,
                key: &str,
            ) -> Result<Option<Order>, RepositoryError> {
                self.0.find_by_idempotency_key(user_id, key).await
            }
            async fn order_number_exists(
                &self,
                _: &driftwood_core::OrderNumber,
            ) -> Result<bool, RepositoryError> {
                Ok(false)
            }
            async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
                self.0.list_for_user(user_id).await
            }
            async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, RepositoryError> {
                self.0.list(filter).await
            }
            async fn transition_status(
                &self,
                id: OrderId,
                from: OrderStatus,
                to: OrderStatus,
            ) -> Result<Option<Order>, RepositoryError> {
                self.0.transition_status(id, from, to).await
            }
            async fn status_summary(
                &self,
                scope: StatisticsScope,
            ) -> Result<Vec<crate::models::StatusSummary>, RepositoryError> {
                self.0.status_summary(scope).await
            }
        }

        let blind = Blind(fx.repos.orders.as_ref());
        let taken_sequence = taken.order_number.sequence();
        let draws = AtomicU64::new(0);
        let numbers = OrderNumberGenerator::new(&blind).with_draw(|| {
            if draws.fetch_add(1, Ordering::SeqCst) == 0 {
                taken_sequence
            } else {
                taken_sequence + 1
            }
        });

        let order = fx
            .service()
            .with_numbers(numbers)
            .create_order(&fx.customer, checkout(vec![line(mug, 1)]))
            .await
            .unwrap()
            .into_order();
        assert_ne!(order.order_number, taken.order_number);
        assert_eq!(draws.load(Ordering::SeqCst), 2);
        assert_eq!(fx.stock(mug).await, 8);

        let always_taken = OrderNumberGenerator::new(&blind).with_draw(move || taken_sequence);
        assert!(matches!(
            fx.service()
                .with_numbers(always_taken)
                .create_order(&fx.customer, checkout(vec![line(mug, 1)]))
                .await,
            Err(OrderError::GenerationExhausted)
        ));
        assert_eq!(fx.stock(mug).await, 8);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_cannot_oversell() {
        let fx = Fixture::new().await;
        let last_one = fx.product("last-one", 1000, 3).await;
        let service = fx.service();

        let results = futures::future::join_all(
            (0..10).map(|_| service.create_order(&fx.customer, checkout(vec![line(last_one, 1)]))),
        )
        .await;

        let placed: Vec<Order> = results
            .into_iter()
            .filter_map(Result::ok)
            .map(Checkout::into_order)
            .collect();
        assert_eq!(placed.len(), 3);
        assert_eq!(fx.stock(last_one).await, 0);

        let numbers: std::collections::HashSet<_> =
            placed.iter().map(|o| o.order_number.clone()).collect();
        assert_eq!(numbers.len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_releases_stock_once() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 1000, 10).await;
        let service = fx.service();
        let order = service
            .create_order(&fx.customer, checkout(vec![line(mug, 4)]))
            .await
            .unwrap()
            .into_order();
        assert_eq!(fx.stock(mug).await, 6);

        let cancelled = service.cancel_order(order.id, &fx.customer).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(fx.stock(mug).await, 10);

        assert!(matches!(
            service.cancel_order(order.id, &fx.customer).await,
            Err(OrderError::InvalidTransition(_))
        ));
        assert_eq!(fx.stock(mug).await, 10);
    }

    #[tokio::test]
    async fn test_shipped_and_delivered_cannot_be_cancelled() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 1000, 10).await;
        let service = fx.service();

        for target in [OrderStatus::Shipped, OrderStatus::Delivered] {
            let order = service
                .create_order(&fx.customer, checkout(vec![line(mug, 1)]))
                .await
                .unwrap()
                .into_order();
            service
                .update_order_status(order.id, target, &fx.admin, TransitionMode::Override)
                .await
                .unwrap();

            for actor in [&fx.customer, &fx.admin] {
                assert!(matches!(
                    service.cancel_order(order.id, actor).await,
                    Err(OrderError::InvalidTransition(TransitionError { to: OrderStatus::Cancelled, .. }))
                ));
            }
        }
    }

    #[tokio::test]
    async fn test_status_change_permissions() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 1000, 10).await;
        let service = fx.service();
        let order = service
            .create_order(&fx.customer, checkout(vec![line(mug, 1)]))
            .await
            .unwrap()
            .into_order();

        // Owners may only cancel.
        assert!(matches!(
            service
                .update_order_status(order.id, OrderStatus::Confirmed, &fx.customer, TransitionMode::Standard)
                .await,
            Err(OrderError::Forbidden)
        ));
        // Strangers may do nothing.
        assert!(matches!(
            service.cancel_order(order.id, &fx.stranger).await,
            Err(OrderError::Forbidden)
        ));
        assert!(matches!(
            service.get_order(&fx.stranger, order.id).await,
            Err(OrderError::Forbidden)
        ));
        // Skips need override.
        assert!(matches!(
            service
                .update_order_status(order.id, OrderStatus::Delivered, &fx.admin, TransitionMode::Standard)
                .await,
            Err(OrderError::InvalidTransition(_))
        ));
        let delivered = service
            .update_order_status(order.id, OrderStatus::Delivered, &fx.admin, TransitionMode::Override)
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert!(matches!(
            service
                .update_order_status(order.id, OrderStatus::Shipped, &fx.admin, TransitionMode::Override)
                .await,
            Err(OrderError::InvalidTransition(_))
        ));
        assert!(matches!(
            service
                .update_order_status(OrderId::new(9999), OrderStatus::Confirmed, &fx.admin, TransitionMode::Standard)
                .await,
            Err(OrderError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_statistics() {
        let fx = Fixture::new().await;
        let mug = fx.product("mug", 5000, 10).await;
        let service = fx.service();

        let first = service
            .create_order(&fx.customer, checkout(vec![line(mug, 1)]))
            .await
            .unwrap()
            .into_order();
        service
            .create_order(&fx.customer, checkout(vec![line(mug, 2)]))
            .await
            .unwrap();
        service
            .create_order(&fx.stranger, checkout(vec![line(mug, 1)]))
            .await
            .unwrap();
        service.cancel_order(first.id, &fx.customer).await.unwrap();

        let all = service
            .order_statistics(StatisticsScope::default())
            .await
            .unwrap();
        assert_eq!(all.total_orders, 3);
        // 50.00 -> 64.00 and 100.00 -> 108.00; the cancelled 64.00 is excluded.
        assert_eq!(all.revenue, Decimal::new(17200, 2));
        assert_eq!(all.average_order_value, Decimal::new(8600, 2));
        assert_eq!(all.by_status.len(), 5);

        let mine = service
            .order_statistics(StatisticsScope {
                user_id: Some(fx.customer.id),
                ..StatisticsScope::default()
            })
            .await
            .unwrap();
        assert_eq!(mine.total_orders, 2);
        assert_eq!(mine.revenue, Decimal::new(10800, 2));

        let now = chrono::Utc::now();
        assert!(matches!(
            service
                .order_statistics(StatisticsScope {
                    from: Some(now),
                    to: Some(now - chrono::Duration::days(1)),
                    user_id: None,
                })
                .await,
            Err(OrderError::Validation(_))
        ));
    }
}
