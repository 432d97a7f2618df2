//! Order total calculation.
//!
//! Amounts are [`Decimal`] values in the store currency's standard unit
//! (dollars, not cents). Every derived amount is rounded to two decimal places
//! with half-up rounding (`MidpointAwayFromZero`; amounts are never negative).

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors raised by [`PricingPolicy::compute_totals`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingError {
    /// The subtotal handed to the calculator was negative.
    #[error("subtotal must not be negative (got {0})")]
    NegativeSubtotal(Decimal),

    /// An amount would not fit in a stored money column.
    #[error("amount exceeds the maximum of 9999999999.99")]
    AmountTooLarge,
}

/// Largest amount a stored money column holds (`NUMERIC(12, 2)`):
/// `9999999999.99`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Rates used to price an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Sales tax rate applied to the subtotal (0.08 = 8%).
    pub tax_rate: Decimal,
    /// Shipping fee charged below the free-shipping threshold.
    pub flat_shipping_fee: Decimal,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            flat_shipping_fee: Decimal::new(1000, 2),
            free_shipping_threshold: Decimal::new(10000, 2),
        }
    }
}

/// Computed totals for an order.
///
/// `total == subtotal + tax + shipping` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Round a currency amount to cents, half-up, always carrying two decimal
/// places (`0` becomes `0.00`).
#[must_use]
pub fn round_currency(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

impl PricingPolicy {
    /// Compute subtotal, tax, shipping and total for a cart subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::NegativeSubtotal`] if `subtotal` is below zero,
    /// or [`PricingError::AmountTooLarge`] if the subtotal or total would
    /// exceed [`MAX_AMOUNT`].
    ///
    /// # Example
    ///
    /// ```
    /// use driftwood_core::PricingPolicy;
    /// use rust_decimal::Decimal;
    ///
    /// let totals = PricingPolicy::default()
    ///     .compute_totals(Decimal::new(15000, 2))
    ///     .unwrap();
    /// assert_eq!(totals.tax, Decimal::new(1200, 2));
    /// assert_eq!(totals.shipping, Decimal::ZERO);
    /// assert_eq!(totals.total, Decimal::new(16200, 2));
    /// ```
    pub fn compute_totals(&self, subtotal: Decimal) -> Result<OrderTotals, PricingError> {
        if subtotal.is_sign_negative() && !subtotal.is_zero() {
            return Err(PricingError::NegativeSubtotal(subtotal));
        }

        if subtotal > MAX_AMOUNT {
            return Err(PricingError::AmountTooLarge);
        }

        let subtotal = round_currency(subtotal);
        let tax = round_currency(
            subtotal
                .checked_mul(self.tax_rate)
                .ok_or(PricingError::AmountTooLarge)?,
        );
        let shipping = if self.qualifies_for_free_shipping(subtotal) {
            round_currency(Decimal::ZERO)
        } else {
            round_currency(self.flat_shipping_fee)
        };
        let total = subtotal
            .checked_add(tax)
            .and_then(|sum| sum.checked_add(shipping))
            .map(round_currency)
            .filter(|total| *total <= MAX_AMOUNT)
            .ok_or(PricingError::AmountTooLarge)?;

        Ok(OrderTotals {
            subtotal,
            tax,
            shipping,
            total,
        })
    }

    /// Whether `subtotal` reaches the free-shipping threshold.
    #[must_use]
    pub fn qualifies_for_free_shipping(&self, subtotal: Decimal) -> bool {
        subtotal >= self.free_shipping_threshold
    }
}
