//! Document storage for users, products and orders.
//!
//! Every aggregate is persisted whole as a JSON document. Filtering and
//! sorting for the catalogue happen in memory on top of [`Store::list_products`];
//! the store only enforces identity and the three uniqueness constraints
//! (user email, product slug, order number).
//!
//! Product writes are guarded by [`Product::version`]: a document loaded
//! before another write landed is rejected with [`StoreError::Stale`]. Stock
//! and view counts never go through a whole-document write; they have their
//! own operations that apply against the stored state.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Order, Product, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} was changed by another request")]
    Stale(&'static str),
    #[error("Product \"{title}\" in {color}/{size} is out of stock")]
    OutOfStock { title: String, color: String, size: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Document counts reported by the health endpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Counts { pub users: usize, pub products: usize, pub orders: usize }

/// Direction of a [`StockChange`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockMove { Reserve, Release }

/// Units of one colour/size of one product moving in or out of stock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockChange { pub product: Uuid, pub color: String, pub size: String, pub quantity: u32, pub direction: StockMove }

impl StockChange {
    pub fn reserve(product: Uuid, color: &str, size: &str, quantity: u32) -> Self {
        Self { product, color: color.into(), size: size.into(), quantity, direction: StockMove::Reserve }
    }

    pub fn release(product: Uuid, color: &str, size: &str, quantity: u32) -> Self {
        Self { direction: StockMove::Release, ..Self::reserve(product, color, size, quantity) }
    }

    /// The change that undoes this one.
    pub fn reversed(&self) -> Self {
        let direction = match self.direction { StockMove::Reserve => StockMove::Release, StockMove::Release => StockMove::Reserve };
        Self { direction, ..self.clone() }
    }
}

/// `ids` without repeats, first occurrence wins.
pub fn distinct_ids(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::new();
    for id in ids {
        if !out.contains(&id) { out.push(id); }
    }
    out
}

/// Apply `changes` in order to freshly loaded `products`. Repeated lines for
/// the same product accumulate. Every product touched gets a new version.
pub(crate) fn apply_stock_changes(products: &mut [Product], changes: &[StockChange]) -> StoreResult<()> {
    for change in changes {
        let product = products.iter_mut().find(|p| p.id == change.product).ok_or(StoreError::NotFound("product"))?;
        match change.direction {
            StockMove::Reserve => product.reserve_stock(&change.color, &change.size, change.quantity).map_err(|_| StoreError::OutOfStock {
                title: product.title.clone(),
                color: change.color.clone(),
                size: change.size.clone(),
            })?,
            StockMove::Release => product.release_stock(&change.color, &change.size, change.quantity),
        }
    }
    for product in products.iter_mut().filter(|p| changes.iter().any(|c| c.product == p.id)) { product.version += 1; }
    Ok(())
}

/// Order numbers share a prefix and grow a digit past the fourth, so the
/// longest one is the latest.
pub(crate) fn later_order_number<'a>(a: &'a str, b: &'a str) -> std::cmp::Ordering { a.len().cmp(&b.len()).then_with(|| a.cmp(b)) }

#[async_trait]
pub trait Store: Send + Sync {
    /// Short name reported by the health endpoints.
    fn backend(&self) -> &'static str;

    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Fails with [`StoreError::Conflict`] when the slug is taken.
    async fn insert_product(&self, product: &Product) -> StoreResult<()>;
    /// Saves the whole document except `viewCount`. Fails with
    /// [`StoreError::Stale`] unless `product.version` is the stored version.
    async fn update_product(&self, product: &Product) -> StoreResult<()>;
    async fn increment_view_count(&self, id: Uuid) -> StoreResult<()>;
    /// All changes are applied or none: the first reservation that cannot be
    /// met fails with [`StoreError::OutOfStock`] and nothing is written.
    async fn adjust_stock(&self, changes: &[StockChange]) -> StoreResult<()>;
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn find_product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>>;
    /// Products with the given ids, each once, in no particular order. Unknown ids are skipped.
    async fn get_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;
    /// Every product, active or not.
    async fn list_products(&self) -> StoreResult<Vec<Product>>;

    /// Fails with [`StoreError::Conflict`] when the order number is taken.
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;
    async fn update_order(&self, order: &Order) -> StoreResult<()>;
    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn find_order_by_number(&self, order_number: &str) -> StoreResult<Option<Order>>;
    async fn orders_for_user(&self, user: Uuid) -> StoreResult<Vec<Order>>;
    async fn list_orders(&self) -> StoreResult<Vec<Order>>;
    /// Latest order number starting with `prefix`: longest first, then highest.
    async fn last_order_number(&self, prefix: &str) -> StoreResult<Option<String>>;

    async fn counts(&self) -> StoreResult<Counts>;
}
