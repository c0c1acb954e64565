//! Postgres-backed [`Store`]: one JSONB document per row, with the unique
//! keys pulled out into their own columns.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use super::{apply_stock_changes, distinct_ids, Counts, StockChange, Store, StoreError, StoreResult};
use crate::domain::aggregates::{Order, Product, User};

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> { sqlx::migrate!("./migrations").run(&self.pool).await }
}

fn conflict(entity: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() { return StoreError::Conflict(entity); }
        }
        StoreError::Database(e)
    }
}

fn with_hash((Json(mut user), hash): (Json<User>, Option<String>)) -> User {
    user.password_hash = hash;
    user
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str { "postgres" }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query("INSERT INTO users (id, email, password_hash, doc, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(user.id).bind(&user.email).bind(&user.password_hash).bind(Json(user)).bind(user.created_at)
            .execute(&self.pool).await.map_err(conflict("user"))?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let done = sqlx::query("UPDATE users SET email = $2, password_hash = COALESCE($3, password_hash), doc = $4 WHERE id = $1")
            .bind(user.id).bind(&user.email).bind(&user.password_hash).bind(Json(user))
            .execute(&self.pool).await.map_err(conflict("user"))?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound("user")); }
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, (Json<User>, Option<String>)>("SELECT doc, password_hash FROM users WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(with_hash))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, (Json<User>, Option<String>)>("SELECT doc, password_hash FROM users WHERE email = $1").bind(email).fetch_optional(&self.pool).await?;
        Ok(row.map(with_hash))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, (Json<User>,)>("SELECT doc FROM users ORDER BY created_at DESC").fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(u),)| u).collect())
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query("INSERT INTO products (id, slug, doc, created_at) VALUES ($1, $2, $3, $4)")
            .bind(product.id).bind(&product.slug).bind(Json(product)).bind(product.created_at)
            .execute(&self.pool).await.map_err(conflict("product"))?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> StoreResult<()> {
        let mut next = product.clone();
        next.version += 1;
        let done = sqlx::query(
            "UPDATE products SET slug = $2, doc = jsonb_set($3, '{viewCount}', COALESCE(doc->'viewCount', '0'::jsonb)) \
             WHERE id = $1 AND COALESCE((doc->>'version')::bigint, 0) = $4",
        )
        .bind(product.id).bind(&product.slug).bind(Json(&next)).bind(product.version as i64)
        .execute(&self.pool).await.map_err(conflict("product"))?;
        if done.rows_affected() > 0 { return Ok(()); }
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)").bind(product.id).fetch_one(&self.pool).await?;
        Err(if exists { StoreError::Stale("product") } else { StoreError::NotFound("product") })
    }

    async fn increment_view_count(&self, id: Uuid) -> StoreResult<()> {
        let done = sqlx::query("UPDATE products SET doc = jsonb_set(doc, '{viewCount}', to_jsonb(COALESCE((doc->>'viewCount')::bigint, 0) + 1)) WHERE id = $1")
            .bind(id).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound("product")); }
        Ok(())
    }

    async fn adjust_stock(&self, changes: &[StockChange]) -> StoreResult<()> {
        let ids = distinct_ids(changes.iter().map(|c| c.product));
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, (Json<Product>,)>("SELECT doc FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids).fetch_all(&mut *tx).await?;
        let mut products: Vec<Product> = rows.into_iter().map(|(Json(p),)| p).collect();
        apply_stock_changes(&mut products, changes)?;
        for product in &products {
            sqlx::query("UPDATE products SET doc = $2 WHERE id = $1").bind(product.id).bind(Json(product)).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, (Json<Product>,)>("SELECT doc FROM products WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(p),)| p))
    }

    async fn find_product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, (Json<Product>,)>("SELECT doc FROM products WHERE slug = $1").bind(slug).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(p),)| p))
    }

    async fn get_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, (Json<Product>,)>("SELECT doc FROM products WHERE id = ANY($1)").bind(ids).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(p),)| p).collect())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, (Json<Product>,)>("SELECT doc FROM products ORDER BY created_at DESC").fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(p),)| p).collect())
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        sqlx::query("INSERT INTO orders (id, order_number, user_id, doc, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(order.id).bind(&order.order_number).bind(order.user).bind(Json(order)).bind(order.created_at)
            .execute(&self.pool).await.map_err(conflict("order"))?;
        Ok(())
    }

    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        let done = sqlx::query("UPDATE orders SET doc = $2 WHERE id = $1").bind(order.id).bind(Json(order)).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound("order")); }
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, (Json<Order>,)>("SELECT doc FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(o),)| o))
    }

    async fn find_order_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, (Json<Order>,)>("SELECT doc FROM orders WHERE order_number = $1").bind(order_number).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(o),)| o))
    }

    async fn orders_for_user(&self, user: Uuid) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, (Json<Order>,)>("SELECT doc FROM orders WHERE user_id = $1 ORDER BY created_at DESC").bind(user).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(o),)| o).collect())
    }

    async fn list_orders(&self) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, (Json<Order>,)>("SELECT doc FROM orders ORDER BY created_at DESC").fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(o),)| o).collect())
    }

    async fn last_order_number(&self, prefix: &str) -> StoreResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT order_number FROM orders WHERE order_number LIKE $1 || '%' ORDER BY length(order_number) DESC, order_number DESC LIMIT 1")
            .bind(prefix).fetch_optional(&self.pool).await?;
        Ok(row.map(|(n,)| n))
    }

    async fn counts(&self) -> StoreResult<Counts> {
        let (users, products, orders): (i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM users), (SELECT COUNT(*) FROM products), (SELECT COUNT(*) FROM orders)",
        )
        .fetch_one(&self.pool).await?;
        Ok(Counts { users: users as usize, products: products as usize, orders: orders as usize })
    }
}
