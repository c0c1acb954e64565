//! Request extractors for bearer-token authentication.
//!
//! ```rust,ignore
//! async fn handler(AuthUser(user): AuthUser) -> impl IntoResponse {
//!     format!("Hello, {}!", user.display_name())
//! }
//! ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::AuthError;
use crate::domain::aggregates::User;
use crate::error::AppError;
use crate::state::AppState;

/// Requires a valid token for an active account.
pub struct AuthUser(pub User);

/// Resolves the caller when a valid token is present; never rejects.
pub struct MaybeUser(pub Option<User>);

/// Requires a valid token for an active admin account.
pub struct AdminUser(pub User);

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<User, AppError> {
    let token = bearer(parts).ok_or(AuthError::MissingToken)?;
    let claims = state.signer.verify(token)?;
    let user = state.store.get_user(claims.sub).await?.ok_or(AuthError::InvalidToken)?;
    if !user.is_active { return Err(AuthError::Deactivated.into()); }
    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(Self)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if bearer(parts).is_none() { return Ok(Self(None)); }
        Ok(Self(authenticate(parts, state).await.ok()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if !user.is_admin() { return Err(AuthError::AdminOnly.into()); }
        Ok(Self(user))
    }
}
