//! Password hashing, bearer tokens and the request extractors built on them.

mod extract;
mod token;

pub use extract::{AdminUser, AuthUser, MaybeUser};
pub use token::{Claims, TokenSigner};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::StatusCode;
use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("No token, authorization denied")]
    MissingToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Account is deactivated")]
    Deactivated,
    #[error("Access denied. Admin only.")]
    AdminOnly,
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,
    #[error("This account signs in with a social provider")]
    NoPassword,
    #[error("credential hashing failed")]
    Hashing,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::MissingToken | Self::InvalidToken | Self::ExpiredToken => StatusCode::UNAUTHORIZED,
            Self::Deactivated | Self::AdminOnly => StatusCode::FORBIDDEN,
            Self::WeakPassword | Self::NoPassword => StatusCode::BAD_REQUEST,
            Self::Hashing => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH { return Err(AuthError::WeakPassword); }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hashing)
}

pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default().verify_password(password.as_bytes(), &parsed).map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).is_ok());
        assert!(matches!(verify_password("hunter23", &hash), Err(AuthError::InvalidCredentials)));
        assert!(matches!(hash_password("abc"), Err(AuthError::WeakPassword)));
    }
}
