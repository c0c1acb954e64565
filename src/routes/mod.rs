//! HTTP surface under `/api`.

pub mod admin;
pub mod ai;
pub mod auth;
pub mod orders;
pub mod payment;
pub mod products;
pub mod users;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::analytics::{DatabaseHealth, DateRange, Health};
use crate::domain::aggregates::{Product, User};
use crate::domain::events::DomainEvent;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::StoreError;

const PRODUCT_WRITE_ATTEMPTS: usize = 3;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .nest("/api/auth", auth::router())
        .nest("/api/products", products::router())
        .nest("/api/users", users::router())
        .nest("/api/orders", orders::router())
        .nest("/api/ai", ai::router())
        .nest("/api/admin", admin::router())
        .nest("/api/payment", payment::router())
}

/// Active product by id; anything else is a 404.
pub(crate) async fn active_product(state: &AppState, id: Uuid) -> AppResult<Product> {
    match state.store.get_product(id).await? {
        Some(p) if p.is_active => Ok(p),
        _ => Err(AppError::not_found("Product")),
    }
}

/// Load product `id`, apply `change` and save it. When another request wrote
/// the product in between, the change is replayed on a fresh copy.
pub(crate) async fn modify_product<T>(state: &AppState, id: Uuid, mut change: impl FnMut(&mut Product) -> AppResult<T>) -> AppResult<(Product, T)> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut product = state.store.get_product(id).await?.ok_or_else(|| AppError::not_found("Product"))?;
        let out = change(&mut product)?;
        match state.store.update_product(&product).await {
            Ok(()) => {
                product.version += 1;
                return Ok((product, out));
            }
            Err(StoreError::Stale(_)) if attempt < PRODUCT_WRITE_ATTEMPTS => {
                tracing::debug!(product_id = %id, attempt, "Product changed underneath, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Reload the caller so writes start from the stored document.
pub(crate) async fn reload_user(state: &AppState, user: &User) -> AppResult<User> {
    state.store.get_user(user.id).await?.ok_or_else(|| AppError::not_found("User"))
}

pub(crate) async fn publish(state: &AppState, events: Vec<DomainEvent>) {
    if !events.is_empty() { state.events.publish(events).await; }
}

/// RFC 3339 timestamps or plain `YYYY-MM-DD` dates. A plain end date covers
/// the whole day.
pub(crate) fn parse_date(raw: &str, field: &str, end_of_day: bool) -> AppResult<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) { return Ok(at.with_timezone(&Utc)); }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| AppError::field(field, "Invalid date"))?;
    let time = if end_of_day { NaiveTime::from_hms_milli_opt(23, 59, 59, 999) } else { Some(NaiveTime::MIN) };
    Ok(date.and_time(time.unwrap_or(NaiveTime::MIN)).and_utc())
}

pub(crate) fn date_range(start: Option<&str>, end: Option<&str>) -> AppResult<DateRange> {
    let start = start.filter(|s| !s.is_empty()).map(|s| parse_date(s, "startDate", false)).transpose()?;
    let end = end.filter(|s| !s.is_empty()).map(|s| parse_date(s, "endDate", true)).transpose()?;
    Ok(DateRange::from_bounds(start, end))
}

pub(crate) async fn health_report(state: &AppState) -> AppResult<Health> {
    let counts = state.store.counts().await.map_err(|e| {
        tracing::error!(error = %e, "Health check failed");
        AppError::Unavailable("Database unavailable".into())
    })?;
    Ok(Health {
        status: "healthy",
        timestamp: chrono::Utc::now(),
        database: DatabaseHealth { connected: true, backend: state.store.backend(), collections: counts },
        environment: state.config.app_env.clone(),
        uptime: state.uptime_seconds(),
        llm: state.llm.as_ref().map(|m| m.model_name().to_string()),
        events: state.events.is_enabled(),
    })
}

async fn health(State(s): State<AppState>) -> AppResult<Json<Value>> {
    let report = health_report(&s).await?;
    Ok(Json(serde_json::to_value(report).map_err(|e| AppError::Internal(e.to_string()))?))
}
