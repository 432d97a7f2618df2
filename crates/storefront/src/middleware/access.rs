//! Route access rules.
//!
//! [`authorize`] is the single decision point for who may do what. Extractors
//! call it with the rule known before the handler runs ([`Access::Authenticated`],
//! [`Access::Admin`]); services call it again with owner rules once the resource
//! has been loaded, before anything is written or serialized.

use driftwood_core::UserId;

use crate::models::CurrentUser;

/// An access rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any logged-in user.
    Authenticated,
    /// Admins only.
    Admin,
    /// Only the owning user; admins get no bypass.
    Owner(UserId),
    /// The owning user or any admin.
    OwnerOrAdmin(UserId),
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No valid session (401).
    Unauthorized,
    /// Authenticated but not permitted (403).
    Forbidden,
}

/// Outcome of [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    /// Convert into a `Result` for `?` propagation.
    ///
    /// # Errors
    ///
    /// Returns the [`Denial`] when access is denied.
    pub const fn into_result(self) -> Result<(), Denial> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(denial) => Err(denial),
        }
    }
}

/// Decide whether `principal` satisfies `rule`.
#[must_use]
pub fn authorize(principal: Option<&CurrentUser>, rule: Access) -> Decision {
    let Some(user) = principal else {
        return Decision::Deny(Denial::Unauthorized);
    };

    let allowed = match rule {
        Access::Authenticated => true,
        Access::Admin => user.is_admin(),
        Access::Owner(owner) => user.id == owner,
        Access::OwnerOrAdmin(owner) => user.id == owner || user.is_admin(),
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny(Denial::Forbidden)
    }
}
