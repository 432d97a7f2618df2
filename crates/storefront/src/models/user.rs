//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use driftwood_core::{Email, UserId, UserRole};

/// A storefront account.
///
/// The password hash never leaves the repository layer; see
/// [`crate::db::UserRepository::get_credentials_by_email`].
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email (normalized).
    pub email: Email,
    /// Display name, if the user gave one.
    pub full_name: Option<String>,
    /// Access role.
    pub role: UserRole,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: UserRole,
}
