//! Address book service.
//!
//! Every operation on an existing address loads it first and checks
//! [`Access::Owner`] before reading fields out or writing anything.

use thiserror::Error;

use driftwood_core::AddressId;

use crate::db::{AddressRepository, RepositoryError};
use crate::middleware::access::{Access, authorize};
use crate::models::{Address, AddressInput, CurrentUser};

/// Errors from address operations.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("invalid address: {0}")]
    Validation(String),

    #[error("address not found")]
    NotFound,

    #[error("address belongs to another user")]
    Forbidden,

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AddressError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Owner-scoped address book operations.
pub struct AddressService<'a> {
    addresses: &'a dyn AddressRepository,
}

impl<'a> AddressService<'a> {
    #[must_use]
    pub const fn new(addresses: &'a dyn AddressRepository) -> Self {
        Self { addresses }
    }

    /// Load an address the actor owns.
    async fn owned(&self, actor: &CurrentUser, id: AddressId) -> Result<Address, AddressError> {
        let address = self.addresses.get(id).await?.ok_or(AddressError::NotFound)?;
        authorize(Some(actor), Access::Owner(address.user_id))
            .into_result()
            .map_err(|_| AddressError::Forbidden)?;
        Ok(address)
    }

    /// The actor's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Repository` if the store fails.
    pub async fn list(&self, actor: &CurrentUser) -> Result<Vec<Address>, AddressError> {
        Ok(self.addresses.list_for_user(actor.id).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden` for a missing or foreign address.
    pub async fn get(&self, actor: &CurrentUser, id: AddressId) -> Result<Address, AddressError> {
        self.owned(actor, id).await
    }

    /// Save a new address. The user's first address becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Validation` for malformed input.
    pub async fn create(
        &self,
        actor: &CurrentUser,
        input: AddressInput,
    ) -> Result<Address, AddressError> {
        let input = input.normalize().map_err(AddressError::Validation)?;
        let address = self.addresses.create(actor.id, &input).await?;
        tracing::debug!(user_id = %actor.id, address_id = %address.id, is_default = address.is_default, "address created");
        Ok(address)
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden` or `Validation`.
    pub async fn update(
        &self,
        actor: &CurrentUser,
        id: AddressId,
        input: AddressInput,
    ) -> Result<Address, AddressError> {
        let input = input.normalize().map_err(AddressError::Validation)?;
        self.owned(actor, id).await?;
        Ok(self.addresses.update(id, &input).await?)
    }

    /// Delete an address; if it was the default, the newest remaining
    /// address takes over.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn delete(&self, actor: &CurrentUser, id: AddressId) -> Result<(), AddressError> {
        self.owned(actor, id).await?;
        self.addresses.delete(id).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn set_default(
        &self,
        actor: &CurrentUser,
        id: AddressId,
    ) -> Result<Address, AddressError> {
        self.owned(actor, id).await?;
        Ok(self.addresses.set_default(actor.id, id).await?)
    }
}
