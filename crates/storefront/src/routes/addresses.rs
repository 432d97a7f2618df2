//! Address book route handlers.
//!
//! Every route is owner-only: admins have no access to other users' address
//! books through this API.

use axum::{extract::State, http::StatusCode};
use tracing::instrument;

use driftwood_core::AddressId;

use crate::error::{ApiJson, ApiPath, Result};
use crate::middleware::RequireAuth;
use crate::models::{Address, AddressInput};
use crate::services::AddressService;
use crate::state::AppState;

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiJson<Vec<Address>>> {
    let service = AddressService::new(state.repos().addresses.as_ref());
    Ok(ApiJson(service.list(&user).await?))
}

/// Save a new address; the first one becomes the default.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(input): ApiJson<AddressInput>,
) -> Result<(StatusCode, ApiJson<Address>)> {
    let service = AddressService::new(state.repos().addresses.as_ref());
    let address = service.create(&user, input).await?;
    Ok((StatusCode::CREATED, ApiJson(address)))
}

#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<ApiJson<Address>> {
    let service = AddressService::new(state.repos().addresses.as_ref());
    Ok(ApiJson(service.get(&user, id).await?))
}

#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<AddressId>,
    ApiJson(input): ApiJson<AddressInput>,
) -> Result<ApiJson<Address>> {
    let service = AddressService::new(state.repos().addresses.as_ref());
    Ok(ApiJson(service.update(&user, id, input).await?))
}

/// Delete an address; deleting the default promotes the newest remaining one.
#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<StatusCode> {
    let service = AddressService::new(state.repos().addresses.as_ref());
    service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn set_default(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<ApiJson<Address>> {
    let service = AddressService::new(state.repos().addresses.as_ref());
    Ok(ApiJson(service.set_default(&user, id).await?))
}
