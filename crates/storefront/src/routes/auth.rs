//! Authentication route handlers.
//!
//! Password accounts with Argon2id hashes. A successful register or login
//! stores a [`CurrentUser`] in a freshly cycled session.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{ApiJson, AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::AuthService;
use crate::state::AppState;

/// Registration request body.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// Hand-written so passwords never reach logs.
impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

async fn start_session(session: &Session, user: &User) -> Result<()> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Create a customer account and log it in.
#[instrument(skip_all, fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, ApiJson<User>)> {
    let auth = AuthService::new(state.repos().users.as_ref());
    let user = auth
        .register(&body.email, &body.password, body.full_name.as_deref())
        .await?;

    start_session(&session, &user).await?;
    Ok((StatusCode::CREATED, ApiJson(user)))
}

/// Log in with email and password.
#[instrument(skip_all, fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<ApiJson<User>> {
    let auth = AuthService::new(state.repos().users.as_ref());
    let user = match auth.login(&body.email, &body.password).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "login failed");
            return Err(e.into());
        }
    };

    start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(ApiJson(user))
}

/// Log out, discarding the whole session (including the cart).
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in user's account.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiJson<User>> {
    let account = state
        .repos()
        .users
        .get_by_id(user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(ApiJson(account))
}
