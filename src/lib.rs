//! Manvue menswear storefront API
//!
//! Catalogue, cart, checkout and back-office for a single menswear shop,
//! with an AI shopping assistant on top of the catalogue.
//!
//! ## Features
//! - Product catalogue with filtering, search, reviews and wishlists
//! - Cart, checkout with server-side pricing and stock reservation
//! - Order lifecycle with cancellations and returns
//! - Mock card gateway for payments
//! - AI chat, voice, image and style recommendations
//! - Admin dashboard and analytics

pub mod analytics;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod llm;
pub mod payment;
pub mod recommend;
pub mod routes;
pub mod seed;
pub mod state;
pub mod store;

use axum::{extract::DefaultBodyLimit, http::{HeaderValue, Method}, Router};
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};

pub use config::Config;
pub use state::AppState;

/// Image uploads arrive as base64 in JSON bodies.
const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

fn cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS];
    match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) if !config.frontend_url.is_empty() => CorsLayer::new().allow_origin(origin).allow_methods(methods).allow_headers(Any),
        _ => CorsLayer::permissive(),
    }
}

/// The full HTTP application over `state`.
pub fn app(state: AppState) -> Router {
    let cors = cors(&state.config);
    routes::router()
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
