//! Back-office: dashboard, analytics, user and product management.

use axum::{extract::{Path, State}, routing::{get, put}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::analytics::{dashboard as build_dashboard, metric_series, Metric, DEFAULT_PERIOD_DAYS};
use crate::auth::AdminUser;
use crate::catalog::{listing, paginate};
use crate::domain::aggregates::user::Role;
use crate::domain::aggregates::{Category, Product, User};
use crate::error::{ok, ok_with_message, AppError, AppResult, ValidJson, ValidQuery};
use crate::recommend::embed_product;
use crate::state::AppState;
use crate::store::distinct_ids;

use super::{date_range, health_report, modify_product, publish};

const PAGE_SIZE: u32 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/:user_id/role", put(update_role))
        .route("/users/:user_id/status", put(update_user_status))
        .route("/products", get(list_products))
        .route("/products/bulk", put(bulk_update_products))
        .route("/analytics", get(analytics))
        .route("/health", get(health))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct DashboardQuery {
    #[validate(range(min = 1, max = 365, message = "Period must be between 1 and 365 days"))]
    pub period: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
    pub category: Option<Category>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleUpdate { pub role: Role }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate { pub is_active: bool }

/// Fields an admin may set on many products at once.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkChanges {
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_new_arrival: Option<bool>,
    pub is_best_seller: Option<bool>,
    pub category: Option<Category>,
}

impl BulkChanges {
    /// Apply to `product`, returning whether anything changed. A new category
    /// re-embeds the product.
    pub fn apply(&self, product: &mut Product, by: Uuid) -> bool {
        let mut changed = false;
        let mut set = |field: &mut bool, value: Option<bool>| {
            if let Some(v) = value.filter(|v| *v != *field) { *field = v; changed = true; }
        };
        set(&mut product.is_active, self.is_active);
        set(&mut product.is_featured, self.is_featured);
        set(&mut product.is_new_arrival, self.is_new_arrival);
        set(&mut product.is_best_seller, self.is_best_seller);
        if let Some(c) = self.category.filter(|c| *c != product.category) {
            product.category = c;
            product.embeddings = embed_product(product);
            changed = true;
        }
        if changed {
            product.updated_by = Some(by);
            product.touch();
        }
        changed
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdate {
    #[validate(length(min = 1, message = "Product IDs array is required"))]
    pub product_ids: Vec<Uuid>,
    pub updates: BulkChanges,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub metric: Metric,
}

async fn dashboard(State(s): State<AppState>, AdminUser(_): AdminUser, ValidQuery(q): ValidQuery<DashboardQuery>) -> AppResult<Json<Value>> {
    let (orders, users, products) = (s.store.list_orders().await?, s.store.list_users().await?, s.store.list_products().await?);
    Ok(ok(build_dashboard(&orders, &users, &products, q.period.unwrap_or(DEFAULT_PERIOD_DAYS))))
}

fn user_matches(user: &User, q: &UserListQuery) -> bool {
    if q.role.is_some_and(|r| r != user.role) { return false; }
    if q.is_active.is_some_and(|a| a != user.is_active) { return false; }
    match q.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(term) => {
            let term = term.to_lowercase();
            user.name.to_lowercase().contains(&term) || user.email.contains(&term)
        }
        None => true,
    }
}

async fn list_users(State(s): State<AppState>, AdminUser(_): AdminUser, ValidQuery(q): ValidQuery<UserListQuery>) -> AppResult<Json<Value>> {
    let mut users: Vec<User> = s.store.list_users().await?.into_iter().filter(|u| user_matches(u, &q)).collect();
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let (page, pagination) = paginate(users, q.page.unwrap_or(1), q.limit.unwrap_or(PAGE_SIZE));
    Ok(ok(json!({ "users": page, "pagination": pagination.labelled("Users") })))
}

async fn find_user(state: &AppState, id: Uuid) -> AppResult<User> {
    state.store.get_user(id).await?.ok_or_else(|| AppError::not_found("User"))
}

async fn update_role(
    State(s): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    ValidJson(r): ValidJson<RoleUpdate>,
) -> AppResult<Json<Value>> {
    if user_id == admin.id { return Err(AppError::BadRequest("Cannot change your own role".into())); }
    let mut user = find_user(&s, user_id).await?;
    user.role = r.role;
    user.touch();
    s.store.update_user(&user).await?;
    tracing::info!(admin = %admin.id, user = %user.id, role = r.role.as_str(), "User role changed");
    Ok(ok_with_message(&format!("User role updated to {}", r.role.as_str()), json!({ "user": user })))
}

async fn update_user_status(
    State(s): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    ValidJson(r): ValidJson<StatusUpdate>,
) -> AppResult<Json<Value>> {
    if user_id == admin.id && !r.is_active { return Err(AppError::BadRequest("Cannot deactivate your own account".into())); }
    let mut user = find_user(&s, user_id).await?;
    user.is_active = r.is_active;
    user.touch();
    s.store.update_user(&user).await?;
    let verb = if r.is_active { "activated" } else { "deactivated" };
    Ok(ok_with_message(&format!("User {verb} successfully"), json!({ "user": user })))
}

fn product_matches(product: &Product, q: &ProductListQuery) -> bool {
    if q.category.is_some_and(|c| c != product.category) { return false; }
    if q.is_active.is_some_and(|a| a != product.is_active) { return false; }
    match q.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(term) => {
            let term = term.to_lowercase();
            product.title.to_lowercase().contains(&term) || product.brand.name.to_lowercase().contains(&term)
        }
        None => true,
    }
}

/// Inactive products included, unlike the storefront listing.
async fn list_products(State(s): State<AppState>, AdminUser(_): AdminUser, ValidQuery(q): ValidQuery<ProductListQuery>) -> AppResult<Json<Value>> {
    let mut products: Vec<Product> = s.store.list_products().await?.into_iter().filter(|p| product_matches(p, &q)).collect();
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let (page, pagination) = paginate(products, q.page.unwrap_or(1), q.limit.unwrap_or(PAGE_SIZE));
    let products: Vec<Value> = page.iter().map(listing).collect();
    Ok(ok(json!({ "products": products, "pagination": pagination.labelled("Products") })))
}

async fn bulk_update_products(State(s): State<AppState>, AdminUser(admin): AdminUser, ValidJson(r): ValidJson<BulkUpdate>) -> AppResult<Json<Value>> {
    let products = s.store.get_products(&distinct_ids(r.product_ids.iter().copied())).await?;
    let matched = products.len();
    let mut modified = 0;
    let mut events = Vec::new();
    for id in products.iter().map(|p| p.id) {
        let (mut product, changed) = modify_product(&s, id, |product| Ok(r.updates.apply(product, admin.id))).await?;
        if changed { modified += 1; }
        events.extend(product.take_events());
    }
    publish(&s, events).await;
    tracing::info!(admin = %admin.id, matched, modified, "Bulk product update");
    Ok(ok_with_message(&format!("Updated {modified} products"), json!({ "matchedCount": matched, "modifiedCount": modified })))
}

async fn analytics(State(s): State<AppState>, AdminUser(_): AdminUser, ValidQuery(q): ValidQuery<AnalyticsQuery>) -> AppResult<Json<Value>> {
    let range = date_range(q.start_date.as_deref(), q.end_date.as_deref())?;
    let (orders, users, products) = (s.store.list_orders().await?, s.store.list_users().await?, s.store.list_products().await?);
    let series = metric_series(q.metric, &range, &orders, &users, &products);
    Ok(ok(json!({ "analytics": series, "metric": q.metric, "dateRange": range })))
}

async fn health(State(s): State<AppState>, AdminUser(_): AdminUser) -> AppResult<Json<Value>> {
    Ok(ok(health_report(&s).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::shirt;
    use crate::domain::value_objects::Email;

    #[test]
    fn test_bulk_changes_count_real_modifications() {
        let mut product = Product::create(shirt(), Uuid::nil()).unwrap();
        let admin = Uuid::now_v7();
        let changes = BulkChanges { is_featured: Some(true), is_active: Some(true), ..Default::default() };
        assert!(changes.apply(&mut product, admin));
        assert!(product.is_featured);
        assert_eq!(product.updated_by, Some(admin));
        assert!(!changes.apply(&mut product, admin));
        product.embeddings = embed_product(&product);
        let before = product.embeddings.clone();
        assert!(BulkChanges { category: Some(Category::Jeans), ..Default::default() }.apply(&mut product, admin));
        assert_eq!(product.category, Category::Jeans);
        assert_ne!(product.embeddings, before);
        assert_eq!(product.embeddings, embed_product(&product));
    }

    #[test]
    fn test_user_filters() {
        let email = Email::parse("Jo@Example.com").unwrap();
        let user = User::register("Jo Bloggs", &email, String::new());
        let query = |search: &str| UserListQuery { search: Some(search.into()), ..Default::default() };
        assert!(user_matches(&user, &query("bloggs")));
        assert!(user_matches(&user, &query("JO@example")));
        assert!(!user_matches(&user, &query("nobody")));
        assert!(!user_matches(&user, &UserListQuery { role: Some(Role::Admin), ..Default::default() }));
        assert!(user_matches(&user, &UserListQuery { is_active: Some(true), ..Default::default() }));
    }
}
