//! Business logic services for the storefront.
//!
//! Services borrow repository trait objects from [`crate::db::Repositories`]
//! and are constructed per request; they hold no state of their own.
//!
//! # Services
//!
//! - `auth` - Password registration and login (Argon2id)
//! - `addresses` - Owner-scoped address book with a single default
//! - `order_number` - Collision-checked `ORD` + 11 digit numbers
//! - `orders` - Checkout, status lifecycle, cancellation, statistics

pub mod addresses;
pub mod auth;
pub mod order_number;
pub mod orders;

pub use addresses::{AddressError, AddressService};
pub use auth::{AuthError, AuthService};
pub use order_number::{GenerationError, OrderNumberGenerator};
pub use orders::{Checkout, CheckoutRequest, OrderError, OrderService};
