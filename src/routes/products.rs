//! Catalogue browsing, admin product management, wishlist and reviews.

use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::{AdminUser, AuthUser, MaybeUser};
use crate::catalog::{category_list, listing, ProductQuery};
use crate::domain::aggregates::product::{Brand, Discount, Price, Specifications, Variant};
use crate::domain::aggregates::{Category, NewProduct, Occasion, Product, ProductError};
use crate::error::{ok, ok_message, ok_with_message, AppError, AppResult, ValidJson, ValidQuery};
use crate::recommend::{embed_product, similar};
use crate::state::AppState;

use super::{active_product, modify_product, publish, reload_user};

const SIMILAR_LIMIT: usize = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/categories/list", get(list_categories))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/:id/similar", get(similar_products))
        .route("/:id/wishlist", post(toggle_wishlist))
        .route("/:id/reviews", post(add_review))
}

fn valid_brand(brand: &Brand) -> Result<(), ValidationError> {
    if brand.name.trim().is_empty() { return Err(ValidationError::new("brand")); }
    Ok(())
}

fn valid_price(price: &Price) -> Result<(), ValidationError> {
    if price.original.is_sign_negative() || price.selling.is_sign_negative() { return Err(ValidationError::new("price")); }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[validate(length(min = 1, max = 100, message = "Title is required and must be under 100 characters"))]
    pub title: String,
    pub slug: Option<String>,
    #[validate(length(min = 1, max = 2000, message = "Description is required and must be under 2000 characters"))]
    pub description: String,
    pub short_description: Option<String>,
    pub category: Category,
    pub sub_category: Option<Occasion>,
    #[validate(custom(function = "valid_brand", message = "Brand name is required"))]
    pub brand: Brand,
    #[validate(custom(function = "valid_price", message = "Prices must be non-negative"))]
    pub price: Price,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub specifications: Specifications,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub glb_model_url: String,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_new_arrival: bool,
    #[serde(default)]
    pub is_best_seller: bool,
}

impl From<ProductInput> for NewProduct {
    fn from(r: ProductInput) -> Self {
        NewProduct {
            title: r.title, slug: r.slug, description: r.description, short_description: r.short_description,
            category: r.category, sub_category: r.sub_category, brand: r.brand, price: r.price, discount: r.discount,
            variants: r.variants, specifications: r.specifications, tags: r.tags, features: r.features,
            glb_model_url: r.glb_model_url, is_featured: r.is_featured, is_new_arrival: r.is_new_arrival,
            is_best_seller: r.is_best_seller,
        }
    }
}

/// Partial update; absent fields are left alone.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 100, message = "Title must be under 100 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000, message = "Description must be under 2000 characters"))]
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: Option<Category>,
    pub sub_category: Option<Occasion>,
    #[validate(custom(function = "valid_brand", message = "Brand name is required"))]
    pub brand: Option<Brand>,
    #[validate(custom(function = "valid_price", message = "Prices must be non-negative"))]
    pub price: Option<Price>,
    pub discount: Option<Discount>,
    pub variants: Option<Vec<Variant>>,
    pub specifications: Option<Specifications>,
    pub tags: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    pub glb_model_url: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_new_arrival: Option<bool>,
    pub is_best_seller: Option<bool>,
}

impl ProductPatch {
    fn apply(self, p: &mut Product) -> Result<(), ProductError> {
        if let Some(title) = self.title {
            let title = title.trim().to_string();
            if title.is_empty() { return Err(ProductError::MissingTitle); }
            p.title = title;
        }
        if let Some(v) = self.description { p.description = v; }
        if let Some(v) = self.short_description { p.short_description = Some(v); }
        if let Some(v) = self.category { p.category = v; }
        if let Some(v) = self.sub_category { p.sub_category = Some(v); }
        if let Some(v) = self.brand { p.brand = v; }
        if let Some(v) = self.price {
            if v.selling > v.original { return Err(ProductError::SellingAboveOriginal); }
            p.price = v;
        }
        if let Some(v) = self.discount { p.discount = v; }
        if let Some(v) = self.variants { p.variants = v; }
        if let Some(v) = self.specifications { p.specifications = v; }
        if let Some(v) = self.tags { p.tags = v; }
        if let Some(v) = self.features { p.features = v; }
        if let Some(v) = self.glb_model_url { p.glb_model_url = v; }
        if let Some(v) = self.is_active { p.is_active = v; }
        if let Some(v) = self.is_featured { p.is_featured = v; }
        if let Some(v) = self.is_new_arrival { p.is_new_arrival = v; }
        if let Some(v) = self.is_best_seller { p.is_best_seller = v; }
        p.fill_zero_size_prices();
        p.recalculate_stock();
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
    #[validate(length(min = 1, max = 500, message = "Comment must be between 1 and 500 characters"))]
    pub comment: String,
}

/// Product JSON for a detail page: everything but the embedding.
fn detail(product: &Product) -> Value {
    let mut value = serde_json::to_value(product).unwrap_or(Value::Null);
    if let Some(map) = value.as_object_mut() { map.remove("embeddings"); }
    value
}

async fn list_products(State(s): State<AppState>, ValidQuery(q): ValidQuery<ProductQuery>) -> AppResult<Json<Value>> {
    let (page, pagination) = q.apply(s.store.list_products().await?);
    let products: Vec<Value> = page.iter().map(listing).collect();
    Ok(ok(json!({ "products": products, "pagination": pagination.labelled("Products") })))
}

async fn list_categories(State(s): State<AppState>) -> AppResult<Json<Value>> {
    Ok(ok(category_list(&s.store.list_products().await?)))
}

async fn get_product(State(s): State<AppState>, MaybeUser(user): MaybeUser, Path(slug): Path<String>) -> AppResult<Json<Value>> {
    let mut product = match s.store.find_product_by_slug(&slug).await? {
        Some(p) if p.is_active => p,
        _ => return Err(AppError::not_found("Product")),
    };
    s.store.increment_view_count(product.id).await?;
    product.view_count += 1;
    let is_wishlisted = user.is_some_and(|u| u.has_wishlisted(product.id));
    Ok(ok(json!({ "product": detail(&product), "isWishlisted": is_wishlisted })))
}

async fn similar_products(State(s): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Value>> {
    let target = active_product(&s, id).await?;
    let catalogue = s.store.list_products().await?;
    let products: Vec<Value> = similar(&target, &catalogue, SIMILAR_LIMIT)
        .into_iter()
        .map(|hit| {
            let mut value = listing(hit.product);
            value["similarity"] = json!(hit.score);
            value
        })
        .collect();
    Ok(ok(json!({ "products": products, "totalFound": products.len() })))
}

async fn create_product(State(s): State<AppState>, AdminUser(admin): AdminUser, ValidJson(r): ValidJson<ProductInput>) -> AppResult<(StatusCode, Json<Value>)> {
    let mut product = Product::create(r.into(), admin.id)?;
    product.embeddings = embed_product(&product);
    s.store.insert_product(&product).await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");
    publish(&s, product.take_events()).await;
    Ok((StatusCode::CREATED, ok_with_message("Product created successfully", json!({ "product": detail(&product) }))))
}

async fn update_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, ValidJson(r): ValidJson<ProductPatch>) -> AppResult<Json<Value>> {
    let (product, ()) = modify_product(&s, id, |product| {
        r.clone().apply(product)?;
        product.embeddings = embed_product(product);
        product.updated_by = Some(admin.id);
        product.touch();
        Ok(())
    })
    .await?;
    Ok(ok_with_message("Product updated successfully", json!({ "product": detail(&product) })))
}

async fn delete_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<Value>> {
    let (mut product, ()) = modify_product(&s, id, |product| {
        product.deactivate(admin.id);
        Ok(())
    })
    .await?;
    publish(&s, product.take_events()).await;
    Ok(ok_message("Product deleted successfully"))
}

async fn toggle_wishlist(State(s): State<AppState>, AuthUser(caller): AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<Value>> {
    active_product(&s, id).await?;
    let mut user = reload_user(&s, &caller).await?;
    let added = user.toggle_wishlist(id);
    modify_product(&s, id, |product| {
        if product.wishlisted_by.contains(&user.id) != added { product.toggle_wishlisted_by(user.id); }
        Ok(())
    })
    .await?;
    s.store.update_user(&user).await?;
    let message = if added { "Added to wishlist" } else { "Removed from wishlist" };
    Ok(ok_with_message(message, json!({ "isWishlisted": added })))
}

async fn add_review(State(s): State<AppState>, AuthUser(user): AuthUser, Path(id): Path<Uuid>, ValidJson(r): ValidJson<ReviewRequest>) -> AppResult<(StatusCode, Json<Value>)> {
    let (mut product, review) = modify_product(&s, id, |product| {
        if !product.is_active { return Err(AppError::not_found("Product")); }
        Ok(product.add_review(user.id, r.rating, r.comment.trim())?.clone())
    })
    .await?;
    publish(&s, product.take_events()).await;
    let review = json!({ "review": review, "rating": product.rating, "reviewer": { "name": user.name, "avatar": user.avatar } });
    Ok((StatusCode::CREATED, ok_with_message("Review added successfully", review)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn input() -> ProductInput {
        serde_json::from_value(json!({
            "title": "Linen Shirt",
            "description": "Cool linen",
            "category": "shirts",
            "brand": { "name": "Manvue" },
            "price": { "original": 40, "selling": 35 },
            "variants": [{ "color": "White", "sizes": [{ "size": "M", "stock": 4, "price": 0 }] }]
        }))
        .unwrap()
    }

    #[test]
    fn test_product_input_validation() {
        assert!(input().validate().is_ok());
        let mut bad = input();
        bad.brand.name = " ".into();
        bad.price.selling = Decimal::new(-1, 0);
        let err = AppError::from(bad.validate().unwrap_err());
        let AppError::Validation(fields) = err else { panic!("expected validation error") };
        assert_eq!(fields.iter().map(|f| f.field.as_str()).collect::<Vec<_>>(), vec!["brand", "price"]);
    }

    #[test]
    fn test_patch_applies_and_guards_price() {
        let mut product = Product::create(input().into(), Uuid::nil()).unwrap();
        let patch = ProductPatch { is_featured: Some(true), tags: Some(vec!["summer".into()]), ..Default::default() };
        patch.apply(&mut product).unwrap();
        assert!(product.is_featured);
        assert_eq!(product.tags, vec!["summer"]);
        let patch = ProductPatch { price: Some(Price { original: Decimal::ONE, selling: Decimal::TWO, currency: "GBP".into() }), ..Default::default() };
        assert_eq!(patch.apply(&mut product), Err(ProductError::SellingAboveOriginal));
    }
}
