//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`]. Orders are always loaded as full aggregates (with their
//! items) so callers never trigger hidden per-item queries.

pub mod address;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput, AddressSnapshot};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, OrderStatistics, StatisticsScope,
    StatusBreakdown, StatusSummary,
};
pub use product::{Category, NewCategory, NewProduct, Product, ProductFilter};
pub use session::{CartLine, CurrentUser, keys as session_keys};
pub use user::{NewUser, User};
