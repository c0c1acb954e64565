//! In-memory [`Store`] used by tests and when no `DATABASE_URL` is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{apply_stock_changes, distinct_ids, later_order_number, Counts, StockChange, Store, StoreError, StoreResult};
use crate::domain::aggregates::{Order, Product, User};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    products: RwLock<HashMap<Uuid, Product>>,
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

/// Stored copies never carry events the caller has not taken yet.
fn stored_product(product: &Product) -> Product {
    let mut stored = product.clone();
    stored.take_events();
    stored
}

fn stored_order(order: &Order) -> Order {
    let mut stored = order.clone();
    stored.take_events();
    stored
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str { "memory" }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) { return Err(StoreError::Conflict("user")); }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email && u.id != user.id) { return Err(StoreError::Conflict("user")); }
        let slot = users.get_mut(&user.id).ok_or(StoreError::NotFound("user"))?;
        // Callers that loaded the user without a hash must not wipe it.
        let hash = user.password_hash.clone().or_else(|| slot.password_hash.take());
        *slot = User { password_hash: hash, ..user.clone() };
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> { Ok(self.users.read().await.get(&id).cloned()) }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> { Ok(self.users.read().await.values().cloned().collect()) }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let mut products = self.products.write().await;
        if products.values().any(|p| p.slug == product.slug) { return Err(StoreError::Conflict("product")); }
        products.insert(product.id, stored_product(product));
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> StoreResult<()> {
        let mut products = self.products.write().await;
        if products.values().any(|p| p.slug == product.slug && p.id != product.id) { return Err(StoreError::Conflict("product")); }
        let slot = products.get_mut(&product.id).ok_or(StoreError::NotFound("product"))?;
        if slot.version != product.version { return Err(StoreError::Stale("product")); }
        let view_count = slot.view_count;
        *slot = stored_product(product);
        slot.view_count = view_count;
        slot.version += 1;
        Ok(())
    }

    async fn increment_view_count(&self, id: Uuid) -> StoreResult<()> {
        let mut products = self.products.write().await;
        let slot = products.get_mut(&id).ok_or(StoreError::NotFound("product"))?;
        slot.view_count += 1;
        Ok(())
    }

    async fn adjust_stock(&self, changes: &[StockChange]) -> StoreResult<()> {
        let mut products = self.products.write().await;
        let ids = distinct_ids(changes.iter().map(|c| c.product));
        let mut touched: Vec<Product> = ids.iter().filter_map(|id| products.get(id).cloned()).collect();
        apply_stock_changes(&mut touched, changes)?;
        for product in touched { products.insert(product.id, product); }
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> { Ok(self.products.read().await.get(&id).cloned()) }

    async fn find_product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>> {
        Ok(self.products.read().await.values().find(|p| p.slug == slug).cloned())
    }

    async fn get_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let products = self.products.read().await;
        Ok(distinct_ids(ids.iter().copied()).iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> { Ok(self.products.read().await.values().cloned().collect()) }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        if orders.values().any(|o| o.order_number == order.order_number) { return Err(StoreError::Conflict("order")); }
        orders.insert(order.id, stored_order(order));
        Ok(())
    }

    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        let slot = orders.get_mut(&order.id).ok_or(StoreError::NotFound("order"))?;
        *slot = stored_order(order);
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> { Ok(self.orders.read().await.get(&id).cloned()) }

    async fn find_order_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.values().find(|o| o.order_number == order_number).cloned())
    }

    async fn orders_for_user(&self, user: Uuid) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self.orders.read().await.values().filter(|o| o.user == user).cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_orders(&self) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self.orders.read().await.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn last_order_number(&self, prefix: &str) -> StoreResult<Option<String>> {
        Ok(self.orders.read().await.values().map(|o| o.order_number.as_str()).filter(|n| n.starts_with(prefix)).max_by(|a, b| later_order_number(a, b)).map(String::from))
    }

    async fn counts(&self) -> StoreResult<Counts> {
        Ok(Counts {
            users: self.users.read().await.len(),
            products: self.products.read().await.len(),
            orders: self.orders.read().await.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::{tests::draft, OrderDraft};
    use crate::domain::aggregates::product::tests::shirt;
    use crate::domain::value_objects::Email;

    #[tokio::test]
    async fn test_unique_email() {
        let store = MemoryStore::new();
        let email = Email::parse("a@example.com").unwrap();
        store.insert_user(&User::register("A", &email, "h".into())).await.unwrap();
        let dup = store.insert_user(&User::register("B", &email, "h".into())).await;
        assert!(matches!(dup, Err(StoreError::Conflict("user"))));
    }

    #[tokio::test]
    async fn test_update_keeps_password_hash() {
        let store = MemoryStore::new();
        let user = User::register("A", &Email::parse("a@example.com").unwrap(), "secret".into());
        store.insert_user(&user).await.unwrap();
        let mut edited = User { password_hash: None, ..user.clone() };
        edited.name = "Alex".into();
        store.update_user(&edited).await.unwrap();
        let loaded = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Alex");
        assert_eq!(loaded.password_hash.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_slug_conflict() {
        let store = MemoryStore::new();
        store.insert_product(&Product::create(shirt(), Uuid::nil()).unwrap()).await.unwrap();
        let again = store.insert_product(&Product::create(shirt(), Uuid::nil()).unwrap()).await;
        assert!(matches!(again, Err(StoreError::Conflict("product"))));
        assert_eq!(store.counts().await.unwrap().products, 1);
    }

    #[tokio::test]
    async fn test_get_products_returns_each_once() {
        let store = MemoryStore::new();
        let product = Product::create(shirt(), Uuid::nil()).unwrap();
        store.insert_product(&product).await.unwrap();
        let found = store.get_products(&[product.id, Uuid::now_v7(), product.id]).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_product_write_is_rejected() {
        let store = MemoryStore::new();
        let product = Product::create(shirt(), Uuid::nil()).unwrap();
        store.insert_product(&product).await.unwrap();

        let mut stale = store.get_product(product.id).await.unwrap().unwrap();
        store.adjust_stock(&[StockChange::reserve(product.id, "Blue", "M", 2)]).await.unwrap();
        stale.view_count += 1;
        stale.is_featured = true;
        assert!(matches!(store.update_product(&stale).await, Err(StoreError::Stale("product"))));

        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_of("Blue", "M"), 1);
        assert!(!stored.is_featured);
    }

    #[tokio::test]
    async fn test_update_keeps_view_count() {
        let store = MemoryStore::new();
        let product = Product::create(shirt(), Uuid::nil()).unwrap();
        store.insert_product(&product).await.unwrap();

        let mut edited = store.get_product(product.id).await.unwrap().unwrap();
        store.increment_view_count(product.id).await.unwrap();
        store.increment_view_count(product.id).await.unwrap();
        edited.is_featured = true;
        store.update_product(&edited).await.unwrap();

        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert!(stored.is_featured);
        assert_eq!(stored.view_count, 2);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_failed_reservation_writes_nothing() {
        let store = MemoryStore::new();
        let product = Product::create(shirt(), Uuid::nil()).unwrap();
        store.insert_product(&product).await.unwrap();
        let changes = [StockChange::reserve(product.id, "White", "M", 1), StockChange::reserve(product.id, "Blue", "L", 1)];
        assert!(matches!(store.adjust_stock(&changes).await, Err(StoreError::OutOfStock { .. })));
        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_of("White", "M"), 2);
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn test_last_order_number_past_four_digits() {
        let store = MemoryStore::new();
        for number in ["MV2501019998", "MV2501019999", "MV25010110000", "MV2501020001"] {
            let order = Order::place(OrderDraft { order_number: number.into(), ..draft(Uuid::nil()) }).unwrap();
            store.insert_order(&order).await.unwrap();
        }
        assert_eq!(store.last_order_number("MV250101").await.unwrap().as_deref(), Some("MV25010110000"));
        assert_eq!(store.last_order_number("MV250103").await.unwrap(), None);
    }
}
