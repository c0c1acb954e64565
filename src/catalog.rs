//! Catalogue browsing: filters, sort orders and pagination over the
//! product list.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use validator::{Validate, ValidationError};

use crate::domain::aggregates::{Category, Occasion, Product};
use crate::recommend::keywords::{is_stop_word, tokenize};

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    PriceLow,
    PriceHigh,
    Rating,
    #[default]
    Newest,
    Popularity,
}

pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() { return Err(ValidationError::new("non_negative")); }
    Ok(())
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u32>,
    pub category: Option<Category>,
    pub sub_category: Option<Occasion>,
    #[validate(custom(function = "non_negative", message = "Min price must be non-negative"))]
    pub min_price: Option<Decimal>,
    #[validate(custom(function = "non_negative", message = "Max price must be non-negative"))]
    pub max_price: Option<Decimal>,
    #[validate(range(min = 0.0, max = 5.0, message = "Rating must be between 0 and 5"))]
    pub rating: Option<f32>,
    pub sort_by: Option<SortBy>,
    pub search: Option<String>,
    pub in_stock: Option<bool>,
    pub featured: Option<bool>,
    pub new_arrival: Option<bool>,
    pub best_seller: Option<bool>,
}

impl ProductQuery {
    pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }
    pub fn limit(&self) -> u32 { self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) }

    fn search_terms(&self) -> Vec<String> {
        self.search.as_deref().map(tokenize).unwrap_or_default().into_iter().filter(|t| !is_stop_word(t)).collect()
    }

    /// Only active products are ever listed.
    pub fn matches(&self, product: &Product, terms: &[String]) -> bool {
        if !product.is_active { return false; }
        if self.category.is_some_and(|c| c != product.category) { return false; }
        if self.sub_category.is_some() && self.sub_category != product.sub_category { return false; }
        if self.min_price.is_some_and(|min| product.price.selling < min) { return false; }
        if self.max_price.is_some_and(|max| product.price.selling > max) { return false; }
        if self.rating.is_some_and(|r| product.rating.average < r) { return false; }
        if self.in_stock == Some(true) && product.inventory.total_stock == 0 { return false; }
        if self.featured == Some(true) && !product.is_featured { return false; }
        if self.new_arrival == Some(true) && !product.is_new_arrival { return false; }
        if self.best_seller == Some(true) && !product.is_best_seller { return false; }
        if !terms.is_empty() {
            let haystack = product.search_text().to_lowercase();
            if !terms.iter().any(|t| haystack.contains(t.as_str())) { return false; }
        }
        true
    }

    /// Filter, sort and cut one page out of `products`.
    pub fn apply(&self, products: Vec<Product>) -> (Vec<Product>, Pagination) {
        let terms = self.search_terms();
        let mut hits: Vec<Product> = products.into_iter().filter(|p| self.matches(p, &terms)).collect();
        sort_products(&mut hits, self.sort_by.unwrap_or_default());
        paginate(hits, self.page(), self.limit())
    }
}

pub fn sort_products(products: &mut [Product], sort: SortBy) {
    match sort {
        SortBy::PriceLow => products.sort_by(|a, b| a.price.selling.cmp(&b.price.selling)),
        SortBy::PriceHigh => products.sort_by(|a, b| b.price.selling.cmp(&a.price.selling)),
        SortBy::Rating => products.sort_by(|a, b| b.rating.average.total_cmp(&a.rating.average)),
        SortBy::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortBy::Popularity => products.sort_by(|a, b| (b.sold_count, b.view_count).cmp(&(a.sold_count, a.view_count))),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    #[serde(skip)]
    pub total: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: usize) -> Self {
        let limit = limit.max(1);
        let total_pages = total.div_ceil(limit as usize) as u32;
        Self {
            current_page: page,
            total_pages,
            total,
            has_next: (page as usize) * (limit as usize) < total,
            has_prev: page > 1,
        }
    }

    /// JSON with the total under `total<noun>`, e.g. `totalProducts`.
    pub fn labelled(&self, noun: &str) -> Value {
        let mut map = Map::new();
        map.insert("currentPage".into(), json!(self.current_page));
        map.insert("totalPages".into(), json!(self.total_pages));
        map.insert(format!("total{noun}"), json!(self.total));
        map.insert("hasNext".into(), json!(self.has_next));
        map.insert("hasPrev".into(), json!(self.has_prev));
        Value::Object(map)
    }
}

/// `?page=&limit=` for the plain listings (orders, users).
#[derive(Clone, Copy, Debug, Default, Deserialize, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }
    pub fn limit_or(&self, default: u32) -> u32 { self.limit.unwrap_or(default).max(1) }
}

pub fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> (Vec<T>, Pagination) {
    let pagination = Pagination::new(page, limit, items.len());
    let skip = (page.max(1) as usize - 1) * limit as usize;
    (items.into_iter().skip(skip).take(limit as usize).collect(), pagination)
}

/// Product JSON without the heavy fields listings never show.
pub fn listing(product: &Product) -> Value {
    let mut value = serde_json::to_value(product).unwrap_or(Value::Null);
    if let Some(map) = value.as_object_mut() {
        for key in ["embeddings", "reviews", "relatedProducts", "wishlistedBy"] { map.remove(key); }
    }
    value
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryList { pub categories: Vec<Category>, pub sub_categories: Vec<Occasion> }

/// Distinct categories and occasions among active products.
pub fn category_list(products: &[Product]) -> CategoryList {
    let active = products.iter().filter(|p| p.is_active);
    let categories: BTreeSet<Category> = active.clone().map(|p| p.category).collect();
    let sub_categories: BTreeSet<Occasion> = active.filter_map(|p| p.sub_category).collect();
    CategoryList { categories: categories.into_iter().collect(), sub_categories: sub_categories.into_iter().collect() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::shirt;
    use uuid::Uuid;

    fn catalogue() -> Vec<Product> {
        let oxford = Product::create(shirt(), Uuid::nil()).unwrap();
        let mut jeans_input = shirt();
        jeans_input.title = "Slim Jeans".into();
        jeans_input.category = Category::Jeans;
        jeans_input.sub_category = Some(Occasion::Casual);
        jeans_input.price.selling = Decimal::new(20, 0);
        jeans_input.is_best_seller = true;
        let mut jeans = Product::create(jeans_input, Uuid::nil()).unwrap();
        jeans.sold_count = 12;
        let mut hidden_input = shirt();
        hidden_input.title = "Old Shirt".into();
        let mut hidden = Product::create(hidden_input, Uuid::nil()).unwrap();
        hidden.deactivate(Uuid::nil());
        vec![oxford, jeans, hidden]
    }

    #[test]
    fn test_filters() {
        let query = ProductQuery { category: Some(Category::Shirts), ..Default::default() };
        let (hits, page) = query.apply(catalogue());
        assert_eq!(hits.len(), 1);
        assert_eq!(page.total, 1);

        let query = ProductQuery { max_price: Some(Decimal::new(25, 0)), ..Default::default() };
        assert_eq!(query.apply(catalogue()).0[0].slug, "slim-jeans");

        let query = ProductQuery { search: Some("the jeans".into()), ..Default::default() };
        assert_eq!(query.apply(catalogue()).0.len(), 1);

        let query = ProductQuery { best_seller: Some(true), ..Default::default() };
        assert_eq!(query.apply(catalogue()).0.len(), 1);
    }

    #[test]
    fn test_sorting() {
        let query = ProductQuery { sort_by: Some(SortBy::PriceLow), ..Default::default() };
        let (hits, _) = query.apply(catalogue());
        assert_eq!(hits[0].slug, "slim-jeans");
        let query = ProductQuery { sort_by: Some(SortBy::Popularity), ..Default::default() };
        assert_eq!(query.apply(catalogue()).0[0].slug, "slim-jeans");
    }

    #[test]
    fn test_pagination() {
        let (items, page) = paginate((1..=25).collect::<Vec<_>>(), 3, 10);
        assert_eq!(items, vec![21, 22, 23, 24, 25]);
        assert_eq!((page.total_pages, page.has_next, page.has_prev), (3, false, true));
        assert_eq!(page.labelled("Products")["totalProducts"], 25);
        let (_, first) = paginate(vec![1, 2, 3], 1, 12);
        assert_eq!((first.total_pages, first.has_next, first.has_prev), (1, false, false));
    }

    #[test]
    fn test_category_list_ignores_inactive() {
        let list = category_list(&catalogue());
        assert_eq!(list.categories, vec![Category::Shirts, Category::Jeans]);
        assert_eq!(list.sub_categories, vec![Occasion::Casual, Occasion::Office]);
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["subCategories"][0], "casual");
    }

    #[test]
    fn test_listing_strips_heavy_fields() {
        let value = listing(&catalogue()[0]);
        assert!(value.get("embeddings").is_none());
        assert!(value.get("title").is_some());
    }
}
