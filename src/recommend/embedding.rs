//! Hashing pseudo-embedding.
//!
//! Text is tokenized, stop words dropped, and every token and adjacent
//! bigram is hashed (FNV-1a, 64 bit) into one of [`EMBEDDING_DIMS`]
//! buckets. The top hash bit picks the sign so unrelated collisions tend
//! to cancel. The result is L2-normalized, so the dot product of two
//! embeddings is their cosine similarity. Fully deterministic: the same
//! text always yields the same vector, across processes and releases.

use super::keywords::{is_stop_word, tokenize};
use crate::domain::aggregates::Product;

pub const EMBEDDING_DIMS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const BIGRAM_WEIGHT: f32 = 0.5;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

fn accumulate(vector: &mut [f32], feature: &str, weight: f32) {
    let hash = fnv1a(feature.as_bytes());
    let bucket = (hash % EMBEDDING_DIMS as u64) as usize;
    let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
    vector[bucket] += sign * weight;
}

fn add_text(vector: &mut [f32], text: &str, weight: f32) {
    let tokens: Vec<String> = tokenize(text).into_iter().filter(|t| !is_stop_word(t)).collect();
    for token in &tokens { accumulate(vector, token, weight); }
    for pair in tokens.windows(2) { accumulate(vector, &format!("{} {}", pair[0], pair[1]), weight * BIGRAM_WEIGHT); }
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON { vector.iter_mut().for_each(|x| *x /= norm); }
    vector
}

/// Embed weighted fields into one vector.
pub fn embed_fields(fields: &[(&str, f32)]) -> Vec<f32> {
    let mut vector = vec![0.0; EMBEDDING_DIMS];
    for (text, weight) in fields { add_text(&mut vector, text, *weight); }
    normalize(vector)
}

pub fn embed(text: &str) -> Vec<f32> { embed_fields(&[(text, 1.0)]) }

/// Title, department and tags count for more than the long description.
pub fn embed_product(product: &Product) -> Vec<f32> {
    let colors = product.colors().collect::<Vec<_>>().join(" ");
    let tags = product.tags.iter().chain(&product.ai_tags).map(String::as_str).collect::<Vec<_>>().join(" ");
    let occasion = product.sub_category.map(|o| o.as_str()).unwrap_or_default();
    let material = format!("{} {}", product.specifications.material, product.specifications.pattern);
    embed_fields(&[
        (product.title.as_str(), 2.0),
        (product.category.as_str(), 2.0),
        (occasion, 1.5),
        (tags.as_str(), 1.5),
        (colors.as_str(), 1.0),
        (material.as_str(), 1.0),
        (product.description.as_str(), 1.0),
        (product.brand.name.as_str(), 0.5),
    ])
}

/// Stored embedding when it has the current shape, otherwise a fresh one.
pub fn product_vector(product: &Product) -> Vec<f32> {
    if product.embeddings.len() == EMBEDDING_DIMS { product.embeddings.clone() } else { embed_product(product) }
}

/// Cosine similarity in `[-1, 1]`; `0.0` for empty, mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() { return 0.0; }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON { return 0.0; }
    dot / denom
}
