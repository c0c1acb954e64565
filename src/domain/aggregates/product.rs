//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::Slug;

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name { $(#[serde(rename = $text)] $variant),+ }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub fn as_str(&self) -> &'static str { match self { $($name::$variant => $text),+ } }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim().to_ascii_lowercase();
                Self::ALL.iter().copied().find(|v| v.as_str() == s).ok_or_else(|| UnknownVariant(s))
            }
        }
    };
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown value `{0}`")]
pub struct UnknownVariant(pub String);

string_enum!(
    /// Catalogue department.
    Category {
        Shirts => "shirts", Tshirts => "tshirts", Jeans => "jeans", Trousers => "trousers",
        Chinos => "chinos", Shorts => "shorts", Jackets => "jackets", Blazers => "blazers",
        Suits => "suits", Sweaters => "sweaters", Hoodies => "hoodies", Formal => "formal",
        Kurtas => "kurtas", Sherwanis => "sherwanis", EthnicWear => "ethnic-wear",
        Shoes => "shoes", Sneakers => "sneakers", FormalShoes => "formal-shoes", Boots => "boots",
        Sandals => "sandals", Watches => "watches", Belts => "belts", Wallets => "wallets",
        Sunglasses => "sunglasses", Ties => "ties", Bags => "bags", Accessories => "accessories",
        Underwear => "underwear", Socks => "socks", Caps => "caps", Perfumes => "perfumes",
    }
);

string_enum!(
    /// Occasion a product is aimed at (`subCategory` on the wire).
    Occasion {
        Casual => "casual", Formal => "formal", Sport => "sport", Party => "party",
        Wedding => "wedding", Office => "office", Summer => "summer", Winter => "winter",
        Monsoon => "monsoon", Festival => "festival", DailyWear => "daily-wear",
    }
);

string_enum!(
    Fit {
        Slim => "slim", Regular => "regular", Loose => "loose", Tight => "tight",
        Relaxed => "relaxed", Oversized => "oversized",
    }
);

impl Default for Fit { fn default() -> Self { Fit::Regular } }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Brand { pub name: String, pub logo: String }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price { pub original: Decimal, pub selling: Decimal, #[serde(default = "default_currency")] pub currency: String }

pub fn default_currency() -> String { "GBP".to_string() }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Discount { pub percentage: Decimal, pub is_active: bool, pub valid_until: Option<DateTime<Utc>> }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariantImage { pub url: String, pub alt: String, pub is_primary: bool }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeStock { pub size: String, pub stock: u32, pub price: Decimal }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Variant { pub color: String, pub color_code: String, pub images: Vec<VariantImage>, pub sizes: Vec<SizeStock> }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultVariant { pub color: String, pub size: String }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Specifications {
    pub material: String, pub care: String, pub fit: Fit, pub pattern: String, pub sleeve: String,
    pub neck_type: String, pub origin: String, pub weight: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory { pub total_stock: u32, pub low_stock_threshold: u32, pub track_quantity: bool }

impl Default for Inventory {
    fn default() -> Self { Self { total_stock: 0, low_stock_threshold: 5, track_quantity: true } }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seo { pub meta_title: String, pub meta_description: String, pub keywords: Vec<String> }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user: Uuid,
    pub rating: u8,
    pub comment: String,
    #[serde(default)]
    pub helpful: Vec<Uuid>,
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating { pub average: f32, pub count: u32 }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorAnalysis { pub dominant_colors: Vec<String>, pub color_harmony: String }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    #[serde(default)]
    pub short_description: Option<String>,
    pub category: Category,
    #[serde(default)]
    pub sub_category: Option<Occasion>,
    pub brand: Brand,
    pub price: Price,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub default_variant: DefaultVariant,
    #[serde(default)]
    pub specifications: Specifications,
    #[serde(default)]
    pub size_chart: String,
    #[serde(default)]
    pub glb_model_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_new_arrival: bool,
    #[serde(default)]
    pub is_best_seller: bool,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub seo: Seo,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub sold_count: u64,
    #[serde(default)]
    pub wishlisted_by: Vec<Uuid>,
    #[serde(default)]
    pub related_products: Vec<Uuid>,
    #[serde(default)]
    pub embeddings: Vec<f32>,
    #[serde(default)]
    pub ai_tags: Vec<String>,
    #[serde(default)]
    pub color_analysis: ColorAnalysis,
    pub created_by: Uuid,
    #[serde(default)]
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every write.
    #[serde(default)]
    pub version: u64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Everything an admin supplies when listing a new product.
#[derive(Clone, Debug)]
pub struct NewProduct {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub short_description: Option<String>,
    pub category: Category,
    pub sub_category: Option<Occasion>,
    pub brand: Brand,
    pub price: Price,
    pub discount: Discount,
    pub variants: Vec<Variant>,
    pub specifications: Specifications,
    pub tags: Vec<String>,
    pub features: Vec<String>,
    pub glb_model_url: String,
    pub is_featured: bool,
    pub is_new_arrival: bool,
    pub is_best_seller: bool,
}

impl Product {
    pub fn create(input: NewProduct, created_by: Uuid) -> Result<Self, ProductError> {
        let title = input.title.trim().to_string();
        if title.is_empty() { return Err(ProductError::MissingTitle); }
        if input.price.selling > input.price.original { return Err(ProductError::SellingAboveOriginal); }
        let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(explicit) => Slug::from_title(explicit),
            None => Slug::from_title(&title),
        }
        .map_err(|_| ProductError::InvalidSlug)?;

        let now = Utc::now();
        let mut product = Self {
            id: Uuid::now_v7(), title, slug: slug.to_string(), description: input.description,
            short_description: input.short_description, category: input.category, sub_category: input.sub_category,
            brand: input.brand, price: input.price, discount: input.discount, variants: input.variants,
            default_variant: DefaultVariant::default(), specifications: input.specifications, size_chart: String::new(),
            glb_model_url: input.glb_model_url, tags: input.tags, features: input.features, is_active: true,
            is_featured: input.is_featured, is_new_arrival: input.is_new_arrival, is_best_seller: input.is_best_seller,
            inventory: Inventory::default(), seo: Seo::default(), reviews: vec![], rating: Rating::default(),
            view_count: 0, sold_count: 0, wishlisted_by: vec![], related_products: vec![], embeddings: vec![],
            ai_tags: vec![], color_analysis: ColorAnalysis::default(), created_by, updated_by: None,
            created_at: now, updated_at: now, version: 0, events: vec![],
        };
        product.fill_zero_size_prices();
        if let Some(first) = product.variants.first() {
            product.default_variant = DefaultVariant {
                color: first.color.clone(),
                size: first.sizes.first().map(|s| s.size.clone()).unwrap_or_default(),
            };
        }
        product.recalculate_stock();
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: product.id, slug: product.slug.clone() }));
        Ok(product)
    }

    /// Sizes listed without a price inherit the product's selling price.
    pub fn fill_zero_size_prices(&mut self) {
        let selling = self.price.selling;
        for size in self.variants.iter_mut().flat_map(|v| v.sizes.iter_mut()) {
            if size.price.is_zero() { size.price = selling; }
        }
    }

    pub fn recalculate_stock(&mut self) {
        self.inventory.total_stock = self.variants.iter().flat_map(|v| &v.sizes).map(|s| s.stock).sum();
    }

    pub fn is_low_stock(&self) -> bool { self.inventory.total_stock <= self.inventory.low_stock_threshold }

    pub fn calculate_rating(&mut self) {
        if self.reviews.is_empty() {
            self.rating = Rating::default();
            return;
        }
        let sum: u32 = self.reviews.iter().map(|r| u32::from(r.rating)).sum();
        let mean = sum as f32 / self.reviews.len() as f32;
        self.rating = Rating { average: (mean * 10.0).round() / 10.0, count: self.reviews.len() as u32 };
    }

    pub fn add_review(&mut self, user: Uuid, rating: u8, comment: impl Into<String>) -> Result<&Review, ProductError> {
        if !(1..=5).contains(&rating) { return Err(ProductError::InvalidRating); }
        if self.reviews.iter().any(|r| r.user == user) { return Err(ProductError::AlreadyReviewed); }
        self.reviews.push(Review {
            id: Uuid::now_v7(), user, rating, comment: comment.into(), helpful: vec![], verified: false, created_at: Utc::now(),
        });
        self.calculate_rating();
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Reviewed { product_id: self.id, rating }));
        self.reviews.last().ok_or(ProductError::InvalidRating)
    }

    pub fn variant(&self, color: &str) -> Option<&Variant> { self.variants.iter().find(|v| v.color == color) }

    fn size_mut(&mut self, color: &str, size: &str) -> Option<&mut SizeStock> {
        self.variants.iter_mut().find(|v| v.color == color)?.sizes.iter_mut().find(|s| s.size == size)
    }

    pub fn available_sizes(&self, color: &str) -> Vec<&SizeStock> {
        self.variant(color).map(|v| v.sizes.iter().filter(|s| s.stock > 0).collect()).unwrap_or_default()
    }

    pub fn stock_of(&self, color: &str, size: &str) -> u32 {
        self.variant(color).and_then(|v| v.sizes.iter().find(|s| s.size == size)).map_or(0, |s| s.stock)
    }

    pub fn is_in_stock(&self, color: &str, size: &str) -> bool { self.stock_of(color, size) > 0 }

    /// Unit price of a colour/size; unknown combinations fall back to the selling price.
    pub fn price_for(&self, color: &str, size: &str) -> Decimal {
        self.variant(color)
            .and_then(|v| v.sizes.iter().find(|s| s.size == size))
            .map_or(self.price.selling, |s| s.price)
    }

    pub fn discount_amount(&self) -> Decimal {
        if !self.discount.is_active { return Decimal::ZERO; }
        self.price.original - self.price.selling
    }

    pub fn primary_image(&self) -> String {
        let variant = self.variant(&self.default_variant.color).or_else(|| self.variants.first());
        variant
            .and_then(|v| v.images.iter().find(|i| i.is_primary).or_else(|| v.images.first()))
            .map(|i| i.url.clone())
            .unwrap_or_default()
    }

    pub fn image_for(&self, color: &str) -> String {
        self.variant(color)
            .and_then(|v| v.images.iter().find(|i| i.is_primary).or_else(|| v.images.first()))
            .map_or_else(|| self.primary_image(), |i| i.url.clone())
    }

    pub fn colors(&self) -> impl Iterator<Item = &str> { self.variants.iter().map(|v| v.color.as_str()) }

    /// Take `quantity` units out of a colour/size and count them as sold.
    pub fn reserve_stock(&mut self, color: &str, size: &str, quantity: u32) -> Result<(), ProductError> {
        let slot = self.size_mut(color, size).ok_or(ProductError::UnknownVariant)?;
        if slot.stock < quantity { return Err(ProductError::InsufficientStock); }
        slot.stock -= quantity;
        self.sold_count += u64::from(quantity);
        self.recalculate_stock();
        self.touch();
        Ok(())
    }

    /// Put units back after a cancellation.
    pub fn release_stock(&mut self, color: &str, size: &str, quantity: u32) {
        if let Some(slot) = self.size_mut(color, size) {
            slot.stock += quantity;
            self.sold_count = self.sold_count.saturating_sub(u64::from(quantity));
            self.recalculate_stock();
            self.touch();
        }
    }

    pub fn toggle_wishlisted_by(&mut self, user: Uuid) -> bool {
        if let Some(pos) = self.wishlisted_by.iter().position(|u| *u == user) {
            self.wishlisted_by.remove(pos);
            false
        } else {
            self.wishlisted_by.push(user);
            true
        }
    }

    pub fn deactivate(&mut self, by: Uuid) {
        self.is_active = false;
        self.updated_by = Some(by);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Deactivated { product_id: self.id }));
    }

    /// Flattened text used for keyword matching and the pseudo-embedding.
    pub fn search_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.title.as_str(), self.description.as_str(), self.category.as_str(), self.brand.name.as_str()];
        if let Some(occasion) = &self.sub_category { parts.push(occasion.as_str()); }
        parts.extend(self.tags.iter().map(String::as_str));
        parts.extend(self.ai_tags.iter().map(String::as_str));
        parts.extend(self.colors());
        parts.push(self.specifications.material.as_str());
        parts.push(self.specifications.pattern.as_str());
        parts.join(" ")
    }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("Product title is required")]
    MissingTitle,
    #[error("Could not derive a slug from the title")]
    InvalidSlug,
    #[error("Selling price cannot exceed the original price")]
    SellingAboveOriginal,
    #[error("Rating must be between 1 and 5")]
    InvalidRating,
    #[error("You have already reviewed this product")]
    AlreadyReviewed,
    #[error("Selected colour/size does not exist")]
    UnknownVariant,
    #[error("Insufficient stock")]
    InsufficientStock,
}
