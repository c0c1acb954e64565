//! Shared handler state.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::auth::{AuthError, TokenSigner};
use crate::config::Config;
use crate::events::EventPublisher;
use crate::llm::LanguageModel;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    /// `None` when no model is configured; AI routes answer from their fallbacks.
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub events: EventPublisher,
    pub signer: TokenSigner,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, llm: Option<Arc<dyn LanguageModel>>, events: EventPublisher) -> Result<Self, AuthError> {
        let signer = TokenSigner::new(&config.auth_secret, Duration::hours(config.token_ttl_hours))?;
        Ok(Self { config: Arc::new(config), store, llm, events, signer, started_at: Utc::now() })
    }

    pub fn uptime_seconds(&self) -> i64 { (Utc::now() - self.started_at).num_seconds() }
}
