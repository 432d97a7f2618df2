//! User management commands.
//!
//! Accounts are created through `POST /api/auth/register`; this promotes or
//! demotes an existing account.

use thiserror::Error;

use driftwood_core::{Email, UserRole};
use driftwood_storefront::db::{Repositories, RepositoryError};

use super::connect;

/// Errors from user commands.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Invalid role: {0}. Valid roles: customer, admin")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("No user with email: {0}")]
    NotFound(String),
}

/// Parse and check arguments before touching the database.
fn parse_args(email: &str, role: &str) -> Result<(Email, UserRole), UserError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|e| UserError::InvalidEmail(e.to_string()))?;
    Ok((email, role))
}

/// Change a user's role.
///
/// # Errors
///
/// Returns an error for a bad role or email, an unknown user, or a database failure.
pub async fn set_role(email: &str, role: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (email, role) = parse_args(email, role)?;

    let pool = connect().await?;
    let repos = Repositories::postgres(pool);

    let user = match repos.users.set_role(&email, role).await {
        Ok(user) => user,
        Err(RepositoryError::NotFound) => return Err(UserError::NotFound(email.to_string()).into()),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "Role updated");
    Ok(())
}
