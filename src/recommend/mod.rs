//! Product matching behind the shopping assistant and semantic search.
//!
//! [`keywords`] turns free text into a structured intent, [`embedding`]
//! maps text and products onto a fixed-size hashed vector, and [`engine`]
//! ranks the catalogue with cosine similarity plus explicit boosts.

pub mod embedding;
pub mod engine;
pub mod keywords;

pub use embedding::{cosine_similarity, embed, embed_product, EMBEDDING_DIMS};
pub use engine::{rank, similar, Scored};
pub use keywords::{category_for_item, extract, resolve_follow_up, ChatTurn, Keywords};
