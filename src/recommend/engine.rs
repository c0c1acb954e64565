//! Product ranking: cosine similarity between the query and each product,
//! adjusted by what the shopper explicitly asked for.

use std::cmp::Ordering;

use super::embedding::{cosine_similarity, embed, product_vector};
use super::keywords::Keywords;
use crate::domain::aggregates::Product;

const CATEGORY_BOOST: f32 = 0.35;
const COLOR_BOOST: f32 = 0.25;
const OCCASION_BOOST: f32 = 0.15;
const TAG_BOOST: f32 = 0.05;
const MAX_TAG_BOOST: f32 = 0.15;
const RATING_BOOST_PER_STAR: f32 = 0.02;
const BEST_SELLER_BOOST: f32 = 0.05;
const OUT_OF_STOCK_PENALTY: f32 = 0.3;
const SAME_CATEGORY_BOOST: f32 = 0.2;
const SHARED_OCCASION_BOOST: f32 = 0.05;

/// Products scoring below this are not worth showing.
pub const MIN_SCORE: f32 = 0.15;

#[derive(Clone, Debug)]
pub struct Scored<'a> { pub product: &'a Product, pub score: f32 }

fn by_score(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
        .then_with(|| b.product.rating.average.partial_cmp(&a.product.rating.average).unwrap_or(Ordering::Equal))
        .then_with(|| b.product.sold_count.cmp(&a.product.sold_count))
        .then_with(|| a.product.slug.cmp(&b.product.slug))
}

fn has_color(product: &Product, color: &str) -> bool {
    product.colors().any(|c| c.to_lowercase().contains(color))
}

/// Score one product against the query. `None` when a hard filter rejects it.
pub fn score(product: &Product, query: &Keywords, query_vector: &[f32]) -> Option<f32> {
    if !product.is_active || !query.price.contains(product.price.selling) { return None; }
    let mut score = cosine_similarity(query_vector, &product_vector(product)).max(0.0);
    if query.categories.contains(&product.category) { score += CATEGORY_BOOST; }
    if query.colors.iter().any(|c| has_color(product, c)) { score += COLOR_BOOST; }
    if product.sub_category.is_some_and(|o| query.occasions.contains(&o)) { score += OCCASION_BOOST; }
    let tag_hits = product.tags.iter().chain(&product.ai_tags).filter(|t| query.terms.iter().any(|q| t.eq_ignore_ascii_case(q))).count();
    score += (tag_hits as f32 * TAG_BOOST).min(MAX_TAG_BOOST);
    score += product.rating.average.clamp(0.0, 5.0) * RATING_BOOST_PER_STAR;
    if product.is_best_seller { score += BEST_SELLER_BOOST; }
    if product.inventory.total_stock == 0 { score -= OUT_OF_STOCK_PENALTY; }
    Some(score)
}

/// Best `limit` matches for `query`, highest score first.
pub fn rank<'a>(products: &'a [Product], query: &Keywords, limit: usize) -> Vec<Scored<'a>> {
    let query_vector = embed(&query.query_text());
    let mut scored: Vec<Scored<'a>> = products
        .iter()
        .filter_map(|p| score(p, query, &query_vector).map(|score| Scored { product: p, score }))
        .filter(|s| s.score >= MIN_SCORE)
        .collect();
    scored.sort_by(by_score);
    scored.truncate(limit);
    scored
}

/// Products that look like `target`, excluding itself and anything inactive.
pub fn similar<'a>(target: &Product, products: &'a [Product], limit: usize) -> Vec<Scored<'a>> {
    let target_vector = product_vector(target);
    let mut scored: Vec<Scored<'a>> = products
        .iter()
        .filter(|p| p.is_active && p.id != target.id)
        .map(|p| {
            let mut score = cosine_similarity(&target_vector, &product_vector(p));
            if p.category == target.category { score += SAME_CATEGORY_BOOST; }
            if p.sub_category.is_some() && p.sub_category == target.sub_category { score += SHARED_OCCASION_BOOST; }
            Scored { product: p, score }
        })
        .filter(|s| s.score > 0.0)
        .collect();
    scored.sort_by(by_score);
    scored.truncate(limit);
    scored
}
