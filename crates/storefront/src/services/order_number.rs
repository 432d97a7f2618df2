//! Order number allocation.
//!
//! Numbers are `ORD` followed by 11 random digits. Each candidate is checked
//! against the order store before use; the unique index on
//! `orders.order_number` still arbitrates races between concurrent checkouts
//! (see [`crate::services::orders`]).

use rand::Rng;
use thiserror::Error;

use driftwood_core::{OrderNumber, OrderNumberError};

use crate::db::{OrderRepository, RepositoryError};

/// Attempts before giving up on finding a free number.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Errors from [`OrderNumberGenerator::generate`].
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Every candidate collided with an existing order.
    #[error("no free order number after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// The draw function produced an unusable value.
    #[error("invalid order number candidate: {0}")]
    Invalid(#[from] OrderNumberError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

type Draw<'a> = Box<dyn Fn() -> u64 + Send + Sync + 'a>;

/// Uniform draw over the full 11-digit space.
fn random_sequence() -> u64 {
    rand::rng().random_range(0..=OrderNumber::MAX_SEQUENCE)
}

/// Collision-checked random order number generator.
pub struct OrderNumberGenerator<'a> {
    orders: &'a dyn OrderRepository,
    draw: Draw<'a>,
    max_attempts: u32,
}

impl<'a> OrderNumberGenerator<'a> {
    #[must_use]
    pub fn new(orders: &'a dyn OrderRepository) -> Self {
        Self {
            orders,
            draw: Box::new(random_sequence),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Replace the random source (tests use deterministic sequences).
    #[must_use]
    pub fn with_draw(mut self, draw: impl Fn() -> u64 + Send + Sync + 'a) -> Self {
        self.draw = Box::new(draw);
        self
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Mint a number not currently used by any order.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Exhausted` once `max_attempts` candidates
    /// have all collided.
    pub async fn generate(&self) -> Result<OrderNumber, GenerationError> {
        for attempt in 1..=self.max_attempts {
            let candidate = OrderNumber::from_sequence((self.draw)())?;
            if !self.orders.order_number_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::warn!(attempt, order_number = %candidate, "order number collision");
        }
        Err(GenerationError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::db::InMemoryStore;

    fn is_well_formed(number: &OrderNumber) -> bool {
        let s = number.as_str();
        s.len() == 14 && s.starts_with("ORD") && s[3..].bytes().all(|b| b.is_ascii_digit())
    }

    #[tokio::test]
    async fn test_generated_numbers_match_pattern() {
        let store = InMemoryStore::new();
        let generator = OrderNumberGenerator::new(&store);
        for _ in 0..50 {
            assert!(is_well_formed(&generator.generate().await.unwrap()));
        }
    }

    #[tokio::test]
    async fn test_zero_pads_small_draws() {
        let store = InMemoryStore::new();
        let generator = OrderNumberGenerator::new(&store).with_draw(|| 42);
        assert_eq!(generator.generate().await.unwrap().as_str(), "ORD00000000042");
    }

    #[tokio::test]
    async fn test_concurrent_generation_is_unique() {
        let store = InMemoryStore::new();
        let generator = OrderNumberGenerator::new(&store);
        let numbers = futures::future::join_all((0..200).map(|_| generator.generate())).await;
        let unique: HashSet<String> = numbers
            .into_iter()
            .map(|n| n.unwrap().as_str().to_owned())
            .collect();
        assert_eq!(unique.len(), 200);
    }

    #[tokio::test]
    async fn test_exhaustion_after_bounded_attempts() {
        use crate::db::CatalogRepository;
        use crate::models::{AddressSnapshot, NewOrder, NewOrderItem, NewProduct};
        use driftwood_core::{OrderTotals, UserId};
        use rust_decimal::Decimal;

        let store = InMemoryStore::new();
        let product = store
            .create_product(&NewProduct {
                category_id: None,
                slug: "lamp".to_owned(),
                name: "Lamp".to_owned(),
                description: String::new(),
                price: Decimal::ONE,
                stock: 5,
                active: true,
            })
            .await
            .unwrap();
        store
            .insert(NewOrder {
                order_number: OrderNumber::from_sequence(7).unwrap(),
                user_id: UserId::new(1),
                totals: OrderTotals {
                    subtotal: Decimal::ONE,
                    tax: Decimal::ZERO,
                    shipping: Decimal::ZERO,
                    total: Decimal::ONE,
                },
                address_id: None,
                shipping_address: AddressSnapshot {
                    full_name: "A".to_owned(),
                    line1: "B".to_owned(),
                    line2: None,
                    city: "C".to_owned(),
                    region: "D".to_owned(),
                    postal_code: "E".to_owned(),
                    country: "GB".to_owned(),
                    phone: None,
                },
                idempotency_key: None,
                items: vec![NewOrderItem {
                    product_id: product.id,
                    product_name: "Lamp".to_owned(),
                    unit_price: Decimal::ONE,
                    quantity: 1,
                    line_total: Decimal::ONE,
                }],
            })
            .await
            .unwrap();

        let calls = AtomicU64::new(0);
        let always_taken = OrderNumberGenerator::new(&store).with_draw(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            7
        });
        assert!(matches!(
            always_taken.generate().await,
            Err(GenerationError::Exhausted { attempts: 5 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let counter = AtomicU64::new(6);
        let second_try = OrderNumberGenerator::new(&store).with_draw(|| {
            counter.fetch_add(1, Ordering::SeqCst) + 1
        });
        // 7 collides, 8 is free.
        assert_eq!(
            second_try.generate().await.unwrap().as_str(),
            "ORD00000000008"
        );
    }
}
