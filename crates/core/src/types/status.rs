//! Status and role enums, including the order lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// ```text
/// pending ──▶ confirmed ──▶ shipped ──▶ delivered
///    │            │
///    └────────────┴──▶ cancelled
/// ```
///
/// `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

/// How a status change was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// One step forward along the happy path, or a cancellation.
    #[default]
    Standard,
    /// Administrative correction: may skip forward along the happy path.
    Override,
}

/// A rejected status change.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot move order from {from} to {to}")]
pub struct TransitionError {
    /// Status the order is currently in.
    pub from: OrderStatus,
    /// Status that was requested.
    pub to: OrderStatus,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Position on the happy path; `None` for `Cancelled`.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled => None,
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether an order in this status may still be cancelled.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// The next status on the happy path, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }

    /// Check whether moving to `to` is allowed under `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] for same-state moves, moves out of a
    /// terminal state, backward moves, cancelling a shipped order, and
    /// forward skips outside [`TransitionMode::Override`].
    pub fn check_transition(self, to: Self, mode: TransitionMode) -> Result<(), TransitionError> {
        let rejected = TransitionError { from: self, to };

        if self.is_terminal() || self == to {
            return Err(rejected);
        }
        if to == Self::Cancelled {
            return if self.is_cancellable() {
                Ok(())
            } else {
                Err(rejected)
            };
        }

        match (self.rank(), to.rank()) {
            (Some(from), Some(target)) if target == from + 1 => Ok(()),
            (Some(from), Some(target)) if target > from && mode == TransitionMode::Override => {
                Ok(())
            }
            _ => Err(rejected),
        }
    }

    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Storefront user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shopper: may only see and act on their own resources.
    #[default]
    Customer,
    /// Back-office staff: may see and act on every resource.
    Admin,
}

impl UserRole {
    /// Whether this role grants back-office access.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::{Cancelled, Confirmed, Delivered, Pending, Shipped};
    use super::*;

    const STANDARD: TransitionMode = TransitionMode::Standard;
    const OVERRIDE: TransitionMode = TransitionMode::Override;

    #[test]
    fn test_happy_path_single_steps() {
        assert!(Pending.check_transition(Confirmed, STANDARD).is_ok());
        assert!(Confirmed.check_transition(Shipped, STANDARD).is_ok());
        assert!(Shipped.check_transition(Delivered, STANDARD).is_ok());
    }

    #[test]
    fn test_skips_need_override() {
        assert_eq!(
            Pending.check_transition(Delivered, STANDARD),
            Err(TransitionError {
                from: Pending,
                to: Delivered
            })
        );
        assert!(Pending.check_transition(Delivered, OVERRIDE).is_ok());
        assert!(Pending.check_transition(Shipped, OVERRIDE).is_ok());
    }

    #[test]
    fn test_cancellation_rules() {
        assert!(Pending.check_transition(Cancelled, STANDARD).is_ok());
        assert!(Confirmed.check_transition(Cancelled, STANDARD).is_ok());
        for mode in [STANDARD, OVERRIDE] {
            assert!(Shipped.check_transition(Cancelled, mode).is_err());
            assert!(Delivered.check_transition(Cancelled, mode).is_err());
        }
    }

    #[test]
    fn test_terminal_backward_and_same_state_rejected() {
        for mode in [STANDARD, OVERRIDE] {
            assert!(Cancelled.check_transition(Pending, mode).is_err());
            assert!(Delivered.check_transition(Shipped, mode).is_err());
            assert!(Shipped.check_transition(Confirmed, mode).is_err());
            assert!(Confirmed.check_transition(Confirmed, mode).is_err());
        }
    }

    #[test]
    fn test_next_and_terminal() {
        assert_eq!(Pending.next(), Some(Confirmed));
        assert_eq!(Delivered.next(), None);
        assert!(Cancelled.is_terminal());
        assert!(!Shipped.is_terminal());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("returned".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<UserRole>(), Ok(UserRole::Admin));
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Customer.is_admin());
        assert!("root".parse::<UserRole>().is_err());
    }
}
