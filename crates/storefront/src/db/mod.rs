//! Persistence for the storefront.
//!
//! # Database schema: `storefront`
//!
//! ## Tables
//!
//! - `users` - Accounts with Argon2id password hashes and roles
//! - `addresses` - Saved shipping addresses (one default per user)
//! - `categories`, `products` - Catalog and stock levels
//! - `orders`, `order_items` - Placed orders with frozen prices
//! - `tower_sessions.session` - Session storage (created by `PostgresStore::migrate`)
//!
//! # Repositories
//!
//! Handlers and services only see the traits in this module. [`PgStore`]
//! implements them against `PostgreSQL`; [`InMemoryStore`] implements the same
//! contract in process memory for tests and local demos.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p driftwood-cli -- migrate
//! ```

mod addresses;
mod catalog;
pub mod memory;
mod orders;
mod users;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use driftwood_core::{
    AddressId, Email, OrderId, OrderNumber, OrderStatus, ProductId, UserId, UserRole,
};

use crate::models::{
    Address, AddressInput, Category, NewCategory, NewOrder, NewProduct, NewUser, Order,
    OrderFilter, Product, ProductFilter, StatisticsScope, StatusSummary, User,
};

pub use memory::InMemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Errors raised while persisting a new order.
#[derive(Debug, thiserror::Error)]
pub enum CreateOrderError {
    /// A product did not have enough stock; nothing was written.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// The order number was taken by a concurrent insert.
    #[error("order number already in use")]
    DuplicateOrderNumber,

    /// The user already placed an order with this idempotency key.
    #[error("idempotency key already used")]
    DuplicateIdempotencyKey,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CreateOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Account storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Look up a user together with their password hash.
    async fn get_credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Change a user's role. Fails with [`RepositoryError::NotFound`].
    async fn set_role(&self, email: &Email, role: UserRole) -> Result<User, RepositoryError>;
}

/// Saved shipping addresses.
///
/// Implementations keep "at most one default per user" atomic: the first
/// address a user saves becomes the default, and deleting the default promotes
/// the most recently created remaining address.
#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// A user's addresses, default first, then newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError>;

    async fn get(&self, id: AddressId) -> Result<Option<Address>, RepositoryError>;

    async fn get_default(&self, user_id: UserId) -> Result<Option<Address>, RepositoryError>;

    /// Insert an address (input must already be normalized).
    async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError>;

    /// Replace an address's fields. `input.is_default = true` also makes it
    /// the default; `false` leaves the current default flag unchanged.
    async fn update(&self, id: AddressId, input: &AddressInput)
    -> Result<Address, RepositoryError>;

    async fn delete(&self, id: AddressId) -> Result<(), RepositoryError>;

    /// Make `id` the user's only default address.
    async fn set_default(&self, user_id: UserId, id: AddressId)
    -> Result<Address, RepositoryError>;
}

/// Categories and products.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;

    /// Insert a category. Fails with [`RepositoryError::Conflict`] on a taken slug.
    async fn create_category(&self, category: &NewCategory) -> Result<Category, RepositoryError>;

    async fn list_products(&self, filter: &ProductFilter)
    -> Result<Vec<Product>, RepositoryError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Load several products at once; missing ids are simply absent.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Insert a product. Fails with [`RepositoryError::Conflict`] on a taken slug.
    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    /// Overwrite a product's stock level.
    async fn set_stock(&self, id: ProductId, stock: i32) -> Result<Product, RepositoryError>;
}

/// Stock adjustments outside checkout.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Return reserved quantities to stock (compensation for a cancelled order).
    async fn release_stock(&self, lines: &[(ProductId, i32)]) -> Result<(), RepositoryError>;
}

/// Order storage.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist an order in one transaction: decrement stock for every line
    /// (only where sufficient), insert the order, insert its items.
    ///
    /// On any failure nothing is written.
    async fn insert(&self, order: NewOrder) -> Result<Order, CreateOrderError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    async fn order_number_exists(&self, number: &OrderNumber) -> Result<bool, RepositoryError>;

    /// A user's orders, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// All orders matching `filter`, newest first.
    async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, RepositoryError>;

    /// Compare-and-set the status: only writes if the order is still in `from`.
    ///
    /// Returns `None` when the order is missing or its status changed.
    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Order count and summed totals per status within `scope`.
    async fn status_summary(
        &self,
        scope: StatisticsScope,
    ) -> Result<Vec<StatusSummary>, RepositoryError>;
}

/// Backend liveness probe used by `/health/ready`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Handles to every repository, shared through `AppState`.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub addresses: Arc<dyn AddressRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub inventory: Arc<dyn InventoryRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub health: Arc<dyn HealthCheck>,
}

impl Repositories {
    /// Use one store for every repository.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + AddressRepository
            + CatalogRepository
            + InventoryRepository
            + OrderRepository
            + HealthCheck
            + 'static,
    {
        Self {
            users: store.clone(),
            addresses: store.clone(),
            catalog: store.clone(),
            inventory: store.clone(),
            orders: store.clone(),
            health: store,
        }
    }

    /// `PostgreSQL`-backed repositories.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_store(Arc::new(PgStore::new(pool)))
    }

    /// Fresh, empty in-memory repositories.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStore::default()))
    }
}

/// `PostgreSQL` implementation of every repository trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map a unique violation to [`RepositoryError::Conflict`].
fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
