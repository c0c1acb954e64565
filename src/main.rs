//! Manvue - menswear storefront API server

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manvue::config::Config;
use manvue::events::EventPublisher;
use manvue::llm::{GeminiClient, LanguageModel};
use manvue::state::AppState;
use manvue::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "Loaded configuration");

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url).await?;
            pg.migrate().await?;
            tracing::info!("Using Postgres document store");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data lives in memory and is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let events = match &config.nats_url {
        Some(url) => EventPublisher::connect(url).await,
        None => EventPublisher::disabled(),
    };

    let llm: Option<Arc<dyn LanguageModel>> = match &config.gemini_api_key {
        Some(key) => Some(Arc::new(GeminiClient::new(key, &config.gemini_model)?)),
        None => {
            tracing::warn!("GEMINI_API_KEY not set, AI routes answer without the model");
            None
        }
    };

    if config.seed_demo_data {
        manvue::seed::seed_demo_data(store.as_ref(), config.seed_admin_password.as_deref()).await?;
    }

    let addr = config.socket_addr();
    let state = AppState::new(config, store, llm, events)?;
    let app = manvue::app(state);

    tracing::info!("🚀 Manvue API listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
