//! Stateless bearer tokens: `base64url(claims JSON) "." hex(HMAC-SHA256)`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::AuthError;
use crate::domain::aggregates::Role;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Holds the keyed HMAC state; cloned per token.
#[derive(Clone)]
pub struct TokenSigner { keyed: HmacSha256, ttl: Duration }

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").field("secret", &"[REDACTED]").field("ttl", &self.ttl).finish()
    }
}

impl TokenSigner {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, AuthError> {
        let keyed = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::Hashing)?;
        Ok(Self { keyed, ttl })
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(payload.as_bytes());
        mac
    }

    pub fn issue(&self, user: Uuid, role: Role) -> String {
        let claims = Claims { sub: user, role, exp: (Utc::now() + self.ttl).timestamp() };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> String {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap_or_default());
        let signature = hex::encode(self.mac(&payload).finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let signature = hex::decode(signature).map_err(|_| AuthError::InvalidToken)?;
        self.mac(payload).verify_slice(&signature).map_err(|_| AuthError::InvalidToken)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims = serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken)?;
        if claims.exp <= Utc::now().timestamp() { return Err(AuthError::ExpiredToken); }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let signer = TokenSigner::new("secret", Duration::hours(1)).unwrap();
        let id = Uuid::new_v4();
        let claims = signer.verify(&signer.issue(id, Role::Admin)).unwrap();
        assert_eq!((claims.sub, claims.role), (id, Role::Admin));
    }

    #[test]
    fn test_tampered_and_foreign_tokens_rejected() {
        let signer = TokenSigner::new("secret", Duration::hours(1)).unwrap();
        let token = signer.issue(Uuid::new_v4(), Role::User);
        let (_, sig) = token.split_once('.').unwrap();
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&Claims { sub: Uuid::new_v4(), role: Role::Admin, exp: i64::MAX }).unwrap());
        assert!(matches!(signer.verify(&format!("{forged}.{sig}")), Err(AuthError::InvalidToken)));
        assert!(matches!(TokenSigner::new("other", Duration::hours(1)).unwrap().verify(&token), Err(AuthError::InvalidToken)));
        assert!(matches!(signer.verify("garbage"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired() {
        let signer = TokenSigner::new("secret", Duration::hours(1)).unwrap();
        let token = signer.sign(&Claims { sub: Uuid::nil(), role: Role::User, exp: Utc::now().timestamp() - 5 });
        assert!(matches!(signer.verify(&token), Err(AuthError::ExpiredToken)));
    }
}
