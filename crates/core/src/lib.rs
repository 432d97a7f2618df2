//! Driftwood Core - shared domain types and pricing rules.
//!
//! This crate provides the types used across all Driftwood components:
//! - `storefront` - JSON storefront API (catalog, cart, checkout, accounts, back-office)
//! - `cli` - Command-line tools for migrations, seeding, and user management
//!
//! # Architecture
//!
//! The core crate contains only types, traits and pure functions - no I/O, no
//! database access, no HTTP. Order totals and the order status state machine
//! live here so they can be tested without a server.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, order numbers and statuses
//! - [`pricing`] - Subtotal/tax/shipping/total calculation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::{MAX_AMOUNT, OrderTotals, PricingError, PricingPolicy};
pub use types::*;
