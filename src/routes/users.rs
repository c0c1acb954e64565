//! The signed-in shopper's wishlist, cart, orders and preferences.

use std::cmp::Ordering;

use axum::{extract::{Path, State}, routing::{get, put}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::catalog::{listing, paginate, PageQuery};
use crate::domain::aggregates::{Category, Order, Product};
use crate::error::{ok, ok_message, ok_with_message, AppError, AppResult, ValidJson, ValidQuery};
use crate::state::AppState;

use super::{active_product, reload_user};

const ORDERS_PAGE_SIZE: u32 = 10;
const RECOMMENDATION_LIMIT: usize = 12;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/wishlist", get(wishlist))
        .route("/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/cart/:product_id", put(update_cart_item).delete(remove_cart_item))
        .route("/orders", get(order_history))
        .route("/profile", get(profile))
        .route("/preferences", put(update_preferences))
        .route("/recommendations", get(recommendations))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10, message = "Quantity must be between 1 and 10"))]
    pub quantity: u32,
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    #[validate(length(min = 1, message = "Color is required"))]
    pub color: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItem {
    #[validate(range(max = 10, message = "Quantity must be between 0 and 10"))]
    pub quantity: u32,
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    #[validate(length(min = 1, message = "Color is required"))]
    pub color: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CartItemKey {
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    #[validate(length(min = 1, message = "Color is required"))]
    pub color: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SizePreferencesPatch { pub shirt: Option<String>, pub pants: Option<String>, pub shoes: Option<String> }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    pub newsletter: Option<bool>,
    pub notifications: Option<bool>,
    pub favorite_categories: Option<Vec<String>>,
    pub size_preferences: Option<SizePreferencesPatch>,
}

async fn wishlist(State(s): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let products = s.store.get_products(&user.wishlist).await?;
    let wishlist: Vec<Value> = user
        .wishlist
        .iter()
        .filter_map(|id| products.iter().find(|p| p.id == *id && p.is_active))
        .map(listing)
        .collect();
    Ok(ok(json!({ "wishlist": wishlist })))
}

async fn get_cart(State(s): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let ids: Vec<Uuid> = user.cart.lines().iter().map(|l| l.product).collect();
    let products = s.store.get_products(&ids).await?;
    Ok(ok(user.cart.price(&products, &s.config.pricing)))
}

async fn add_to_cart(State(s): State<AppState>, AuthUser(caller): AuthUser, ValidJson(r): ValidJson<AddToCart>) -> AppResult<Json<Value>> {
    let product = active_product(&s, r.product_id).await?;
    if !product.is_in_stock(&r.color, &r.size) { return Err(AppError::BadRequest("Product variant is out of stock".into())); }
    let mut user = reload_user(&s, &caller).await?;
    user.cart.add_item(product.id, r.quantity, &r.size, &r.color)?;
    user.touch();
    s.store.update_user(&user).await?;
    Ok(ok_with_message("Item added to cart successfully", json!({ "itemCount": user.cart.line_count(), "totalItems": user.cart.total_quantity() })))
}

async fn update_cart_item(State(s): State<AppState>, AuthUser(caller): AuthUser, Path(product_id): Path<Uuid>, ValidJson(r): ValidJson<UpdateCartItem>) -> AppResult<Json<Value>> {
    let mut user = reload_user(&s, &caller).await?;
    user.cart.update_quantity(product_id, &r.size, &r.color, r.quantity)?;
    user.touch();
    s.store.update_user(&user).await?;
    Ok(ok_message(if r.quantity == 0 { "Item removed from cart" } else { "Cart updated successfully" }))
}

async fn remove_cart_item(State(s): State<AppState>, AuthUser(caller): AuthUser, Path(product_id): Path<Uuid>, ValidJson(r): ValidJson<CartItemKey>) -> AppResult<Json<Value>> {
    let mut user = reload_user(&s, &caller).await?;
    user.cart.remove_item(product_id, &r.size, &r.color);
    user.touch();
    s.store.update_user(&user).await?;
    Ok(ok_message("Item removed from cart successfully"))
}

async fn clear_cart(State(s): State<AppState>, AuthUser(caller): AuthUser) -> AppResult<Json<Value>> {
    let mut user = reload_user(&s, &caller).await?;
    user.cart.clear();
    user.touch();
    s.store.update_user(&user).await?;
    Ok(ok_message("Cart cleared successfully"))
}

/// Newest first.
pub(crate) fn sort_orders(orders: &mut [Order]) { orders.sort_by(|a, b| b.created_at.cmp(&a.created_at)); }

async fn order_history(State(s): State<AppState>, AuthUser(user): AuthUser, ValidQuery(q): ValidQuery<PageQuery>) -> AppResult<Json<Value>> {
    let mut orders = s.store.orders_for_user(user.id).await?;
    sort_orders(&mut orders);
    let (page, pagination) = paginate(orders, q.page(), q.limit_or(ORDERS_PAGE_SIZE));
    Ok(ok(json!({ "orders": page, "pagination": pagination.labelled("Orders") })))
}

async fn profile(State(s): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let mut orders = s.store.orders_for_user(user.id).await?;
    sort_orders(&mut orders);
    let history: Vec<Value> = orders
        .iter()
        .map(|o| json!({ "id": o.id, "orderNumber": o.order_number, "status": o.status, "total": o.pricing.total, "createdAt": o.created_at }))
        .collect();
    let mut value = serde_json::to_value(&user).map_err(|e| AppError::Internal(e.to_string()))?;
    if let Some(map) = value.as_object_mut() {
        map.remove("cart");
        map.insert("orderHistory".into(), Value::Array(history));
    }
    Ok(ok(json!({ "user": value })))
}

async fn update_preferences(State(s): State<AppState>, AuthUser(caller): AuthUser, ValidJson(r): ValidJson<PreferencesUpdate>) -> AppResult<Json<Value>> {
    let mut user = reload_user(&s, &caller).await?;
    let prefs = &mut user.preferences;
    if let Some(v) = r.newsletter { prefs.newsletter = v; }
    if let Some(v) = r.notifications { prefs.notifications = v; }
    if let Some(v) = r.favorite_categories { prefs.favorite_categories = v; }
    if let Some(sizes) = r.size_preferences {
        if let Some(v) = sizes.shirt { prefs.size_preferences.shirt = v; }
        if let Some(v) = sizes.pants { prefs.size_preferences.pants = v; }
        if let Some(v) = sizes.shoes { prefs.size_preferences.shoes = v; }
    }
    user.touch();
    s.store.update_user(&user).await?;
    Ok(ok_with_message("Preferences updated successfully", json!({ "preferences": user.preferences })))
}

/// Highest rated first, then best selling.
pub(crate) fn by_rating_then_sales(a: &Product, b: &Product) -> Ordering {
    b.rating.average.total_cmp(&a.rating.average).then_with(|| b.sold_count.cmp(&a.sold_count))
}

/// Products in the shopper's favourite or wishlisted categories, excluding
/// what is already on the wishlist. No signal means the whole catalogue.
pub(crate) fn recommend_for(favourites: &[String], wishlist: &[Uuid], catalogue: &[Product], limit: usize) -> Vec<Product> {
    let mut categories: Vec<Category> = favourites.iter().filter_map(|c| c.parse().ok()).collect();
    categories.extend(catalogue.iter().filter(|p| wishlist.contains(&p.id)).map(|p| p.category));
    let mut picks: Vec<Product> = catalogue
        .iter()
        .filter(|p| p.is_active && !wishlist.contains(&p.id))
        .filter(|p| categories.is_empty() || categories.contains(&p.category))
        .cloned()
        .collect();
    picks.sort_by(by_rating_then_sales);
    picks.truncate(limit);
    picks
}

async fn recommendations(State(s): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let catalogue = s.store.list_products().await?;
    let picks = recommend_for(&user.preferences.favorite_categories, &user.wishlist, &catalogue, RECOMMENDATION_LIMIT);
    let recommendations: Vec<Value> = picks.iter().map(listing).collect();
    Ok(ok(json!({ "recommendations": recommendations })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::shirt;

    #[test]
    fn test_recommendations_follow_wishlist_categories() {
        let oxford = Product::create(shirt(), Uuid::nil()).unwrap();
        let mut linen_input = shirt();
        linen_input.title = "Linen Shirt".into();
        let mut linen = Product::create(linen_input, Uuid::nil()).unwrap();
        linen.rating.average = 4.8;
        let mut jeans_input = shirt();
        jeans_input.title = "Jeans".into();
        jeans_input.category = Category::Jeans;
        let jeans = Product::create(jeans_input, Uuid::nil()).unwrap();
        let catalogue = vec![oxford.clone(), linen.clone(), jeans.clone()];

        let picks = recommend_for(&[], &[oxford.id], &catalogue, 12);
        assert_eq!(picks.iter().map(|p| p.id).collect::<Vec<_>>(), vec![linen.id]);

        let picks = recommend_for(&["jeans".into()], &[], &catalogue, 12);
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].id, jeans.id);

        let everything = recommend_for(&[], &[], &catalogue, 2);
        assert_eq!(everything[0].id, linen.id);
        assert_eq!(everything.len(), 2);
    }
}
