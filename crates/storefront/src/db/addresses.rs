//! `PostgreSQL` address storage.
//!
//! Default-flag changes run inside a transaction that clears the user's
//! previous default first, so the partial unique index
//! `address_one_default_per_user` is never violated mid-update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use driftwood_core::{AddressId, UserId};

use super::{AddressRepository, PgStore, RepositoryError};
use crate::models::{Address, AddressInput};

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, line1, line2, city, region, postal_code, \
                               country, phone, is_default, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    full_name: String,
    line1: String,
    line2: Option<String>,
    city: String,
    region: String,
    postal_code: String,
    country: String,
    phone: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(r: AddressRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            full_name: r.full_name,
            line1: r.line1,
            line2: r.line2,
            city: r.city,
            region: r.region,
            postal_code: r.postal_code,
            country: r.country,
            phone: r.phone,
            is_default: r.is_default,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

async fn clear_default(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE storefront.addresses SET is_default = FALSE, updated_at = now()
         WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Lock the user's address rows so concurrent default changes serialize.
async fn lock_user_addresses(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
) -> Result<usize, RepositoryError> {
    let ids: Vec<AddressId> =
        sqlx::query_scalar("SELECT id FROM storefront.addresses WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_all(&mut **tx)
            .await?;
    Ok(ids.len())
}

#[async_trait]
impl AddressRepository for PgStore {
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows: Vec<AddressRow> = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.addresses
             WHERE user_id = $1
             ORDER BY is_default DESC, created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn get(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.addresses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    async fn get_default(&self, user_id: UserId) -> Result<Option<Address>, RepositoryError> {
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.addresses
             WHERE user_id = $1 AND is_default"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing = lock_user_addresses(&mut tx, user_id).await?;
        let is_default = input.is_default || existing == 0;
        if is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let row: AddressRow = sqlx::query_as(&format!(
            "INSERT INTO storefront.addresses
                 (user_id, full_name, line1, line2, city, region, postal_code, country, phone, is_default)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&input.full_name)
        .bind(&input.line1)
        .bind(&input.line2)
        .bind(&input.city)
        .bind(&input.region)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.phone)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn update(
        &self,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user_id: UserId =
            sqlx::query_scalar("SELECT user_id FROM storefront.addresses WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        if input.is_default {
            lock_user_addresses(&mut tx, user_id).await?;
            clear_default(&mut tx, user_id).await?;
        }

        let row: AddressRow = sqlx::query_as(&format!(
            "UPDATE storefront.addresses
             SET full_name = $2, line1 = $3, line2 = $4, city = $5, region = $6,
                 postal_code = $7, country = $8, phone = $9,
                 is_default = is_default OR $10, updated_at = now()
             WHERE id = $1
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.full_name)
        .bind(&input.line1)
        .bind(&input.line2)
        .bind(&input.city)
        .bind(&input.region)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.phone)
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn delete(&self, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<(UserId, bool)> = sqlx::query_as(
            "DELETE FROM storefront.addresses WHERE id = $1 RETURNING user_id, is_default",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id, was_default)) = deleted else {
            return Err(RepositoryError::NotFound);
        };

        if was_default {
            sqlx::query(
                "UPDATE storefront.addresses SET is_default = TRUE, updated_at = now()
                 WHERE id = (
                     SELECT id FROM storefront.addresses
                     WHERE user_id = $1
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1
                 )",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_user_addresses(&mut tx, user_id).await?;
        clear_default(&mut tx, user_id).await?;

        let row: Option<AddressRow> = sqlx::query_as(&format!(
            "UPDATE storefront.addresses SET is_default = TRUE, updated_at = now()
             WHERE id = $1 AND user_id = $2
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction rolls back the cleared default.
        let row = row.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(row.into())
    }
}
