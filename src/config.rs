//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `HOST` / `PORT` - bind address (default `0.0.0.0:4000`)
//! - `DATABASE_URL` - Postgres connection string; unset means in-memory storage
//! - `NATS_URL` - publish domain events when set
//! - `AUTH_SECRET` - token signing secret, required outside development
//! - `TOKEN_TTL_HOURS` - bearer token lifetime (default 168)
//! - `GEMINI_API_KEY` / `GEMINI_MODEL` - hosted model; unset means canned answers
//! - `FRONTEND_URL` - extra CORS origin
//! - `APP_ENV` - `development` (default) or `production`
//! - `TAX_RATE`, `FREE_SHIPPING_THRESHOLD`, `FLAT_SHIPPING`, `GIFT_WRAP_COST` - checkout pricing
//! - `MOCK_PAYMENT_MAX_DELAY_MS` - upper bound of the simulated gateway latency (default 2000)
//! - `SEED_DEMO_DATA` - load the demo catalogue at startup
//! - `SEED_ADMIN_PASSWORD` - password for the seeded `admin@manvue.com` account

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::value_objects::PricingPolicy;

const DEV_AUTH_SECRET: &str = "manvue-development-only-secret";
const MIN_AUTH_SECRET_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub auth_secret: String,
    pub token_ttl_hours: i64,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub frontend_url: String,
    pub app_env: String,
    pub pricing: PricingPolicy,
    pub mock_payment_max_delay_ms: u64,
    pub seed_demo_data: bool,
    pub seed_admin_password: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("nats_url", &self.nats_url)
            .field("auth_secret", &"[REDACTED]")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("gemini_model", &self.gemini_model)
            .field("frontend_url", &self.frontend_url)
            .field("app_env", &self.app_env)
            .field("pricing", &self.pricing)
            .field("mock_payment_max_delay_ms", &self.mock_payment_max_delay_ms)
            .field("seed_demo_data", &self.seed_demo_data)
            .field("seed_admin_password", &self.seed_admin_password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 4000,
            database_url: None,
            nats_url: None,
            auth_secret: DEV_AUTH_SECRET.into(),
            token_ttl_hours: 168,
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".into(),
            frontend_url: "http://localhost:3000".into(),
            app_env: "development".into(),
            pricing: PricingPolicy::default(),
            mock_payment_max_delay_ms: 2000,
            seed_demo_data: false,
            seed_admin_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        let app_env = get_env_or_default("APP_ENV", &defaults.app_env);
        let auth_secret = match get_optional_env("AUTH_SECRET") {
            Some(secret) if secret.len() >= MIN_AUTH_SECRET_LENGTH || app_env != "production" => secret,
            Some(_) => return Err(ConfigError::InvalidEnvVar("AUTH_SECRET".into(), format!("must be at least {MIN_AUTH_SECRET_LENGTH} characters"))),
            None if app_env == "production" => return Err(ConfigError::MissingEnvVar("AUTH_SECRET".into())),
            None => {
                tracing::warn!("AUTH_SECRET not set, using the development secret");
                defaults.auth_secret
            }
        };
        let pricing = PricingPolicy {
            tax_rate: parse_or("TAX_RATE", defaults.pricing.tax_rate)?,
            free_shipping_threshold: parse_or("FREE_SHIPPING_THRESHOLD", defaults.pricing.free_shipping_threshold)?,
            flat_shipping: parse_or("FLAT_SHIPPING", defaults.pricing.flat_shipping)?,
            gift_wrap_cost: parse_or("GIFT_WRAP_COST", defaults.pricing.gift_wrap_cost)?,
        };
        if pricing.tax_rate < Decimal::ZERO || pricing.tax_rate > Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar("TAX_RATE".into(), "must be between 0 and 1".into()));
        }

        Ok(Self {
            host: parse_or("HOST", defaults.host)?,
            port: parse_or("PORT", defaults.port)?,
            database_url: get_optional_env("DATABASE_URL"),
            nats_url: get_optional_env("NATS_URL"),
            auth_secret,
            token_ttl_hours: parse_or("TOKEN_TTL_HOURS", defaults.token_ttl_hours)?,
            gemini_api_key: get_optional_env("GEMINI_API_KEY"),
            gemini_model: get_env_or_default("GEMINI_MODEL", &defaults.gemini_model),
            frontend_url: get_env_or_default("FRONTEND_URL", &defaults.frontend_url),
            app_env,
            pricing,
            mock_payment_max_delay_ms: parse_or("MOCK_PAYMENT_MAX_DELAY_MS", defaults.mock_payment_max_delay_ms)?,
            seed_demo_data: parse_or("SEED_DEMO_DATA", defaults.seed_demo_data)?,
            seed_admin_password: get_optional_env("SEED_ADMIN_PASSWORD"),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
    pub fn is_production(&self) -> bool { self.app_env == "production" }
}

fn get_optional_env(key: &str) -> Option<String> { std::env::var(key).ok().filter(|v| !v.trim().is_empty()) }

fn get_env_or_default(key: &str, default: &str) -> String { get_optional_env(key).unwrap_or_else(|| default.to_string()) }

fn parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.socket_addr().port(), 4000);
        assert_eq!(config.pricing.tax_rate, Decimal::new(18, 2));
        assert!(!config.is_production());
        assert!(!format!("{config:?}").contains(DEV_AUTH_SECRET));
    }
}
