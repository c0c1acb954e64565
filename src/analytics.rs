//! Admin reporting computed over the stored documents.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{Category, Order, OrderStatus, Product, Role, User};
use crate::domain::value_objects::round_money;
use crate::store::Counts;

pub const DEFAULT_PERIOD_DAYS: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange { pub start_date: DateTime<Utc>, pub end_date: DateTime<Utc> }

impl DateRange {
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self { start_date: end - Duration::days(days), end_date: end }
    }

    /// Missing bounds default to the last thirty days.
    pub fn from_bounds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        let end = end.unwrap_or_else(Utc::now);
        Self { start_date: start.unwrap_or(end - Duration::days(DEFAULT_PERIOD_DAYS)), end_date: end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool { at >= self.start_date && at <= self.end_date }
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 { Decimal::ZERO } else { round_money(total / Decimal::from(count)) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: usize,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
    pub pending_orders: usize,
    pub confirmed_orders: usize,
    pub processing_orders: usize,
    pub shipped_orders: usize,
    pub delivered_orders: usize,
    pub cancelled_orders: usize,
}

pub fn order_stats(orders: &[Order], range: &DateRange) -> OrderStats {
    let in_range: Vec<&Order> = orders.iter().filter(|o| range.contains(o.created_at)).collect();
    let count = |status: OrderStatus| in_range.iter().filter(|o| o.status == status).count();
    let total_revenue: Decimal = in_range.iter().map(|o| o.pricing.total).sum();
    OrderStats {
        total_orders: in_range.len(),
        total_revenue,
        average_order_value: average(total_revenue, in_range.len()),
        pending_orders: count(OrderStatus::Pending),
        confirmed_orders: count(OrderStatus::Confirmed),
        processing_orders: count(OrderStatus::Processing),
        shipped_orders: count(OrderStatus::Shipped),
        delivered_orders: count(OrderStatus::Delivered),
        cancelled_orders: count(OrderStatus::Cancelled),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats { pub total_users: usize, pub active_users: usize, pub new_users: usize, pub admin_users: usize }

pub fn user_stats(users: &[User], range: &DateRange) -> UserStats {
    UserStats {
        total_users: users.len(),
        active_users: users.iter().filter(|u| u.is_active).count(),
        new_users: users.iter().filter(|u| u.created_at >= range.start_date).count(),
        admin_users: users.iter().filter(|u| u.role == Role::Admin).count(),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStats {
    pub total_products: usize,
    pub active_products: usize,
    pub featured_products: usize,
    pub new_arrivals: usize,
    pub low_stock_products: usize,
}

pub fn product_stats(products: &[Product]) -> ProductStats {
    ProductStats {
        total_products: products.len(),
        active_products: products.iter().filter(|p| p.is_active).count(),
        featured_products: products.iter().filter(|p| p.is_featured).count(),
        new_arrivals: products.iter().filter(|p| p.is_new_arrival).count(),
        low_stock_products: products.iter().filter(|p| p.is_low_stock()).count(),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRevenue { pub date: NaiveDate, pub revenue: Decimal, pub orders: usize, pub average_order_value: Decimal }

/// Revenue per calendar day (UTC), oldest first. Cancelled orders are excluded.
pub fn revenue_by_day(orders: &[Order], range: &DateRange) -> Vec<DailyRevenue> {
    let mut days: BTreeMap<NaiveDate, (Decimal, usize)> = BTreeMap::new();
    for order in orders.iter().filter(|o| range.contains(o.created_at) && o.status != OrderStatus::Cancelled) {
        let entry = days.entry(order.created_at.date_naive()).or_default();
        entry.0 += order.pricing.total;
        entry.1 += 1;
    }
    days.into_iter()
        .map(|(date, (revenue, orders))| DailyRevenue { date, revenue, orders, average_order_value: average(revenue, orders) })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct { pub id: Uuid, pub title: String, pub slug: String, pub category: Category, pub sold_count: u64, pub price: Decimal, pub rating: f32 }

pub fn top_products(products: &[Product], limit: usize) -> Vec<TopProduct> {
    let mut active: Vec<&Product> = products.iter().filter(|p| p.is_active).collect();
    active.sort_by(|a, b| b.sold_count.cmp(&a.sold_count).then_with(|| a.title.cmp(&b.title)));
    active
        .into_iter()
        .take(limit)
        .map(|p| TopProduct {
            id: p.id, title: p.title.clone(), slug: p.slug.clone(), category: p.category,
            sold_count: p.sold_count, price: p.price.selling, rating: p.rating.average,
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCategory { pub category: Category, pub total_sold: u64, pub total_products: usize, pub average_price: Decimal }

pub fn top_categories(products: &[Product], limit: usize) -> Vec<TopCategory> {
    let mut groups: BTreeMap<Category, (u64, usize, Decimal)> = BTreeMap::new();
    for p in products.iter().filter(|p| p.is_active) {
        let entry = groups.entry(p.category).or_default();
        entry.0 += p.sold_count;
        entry.1 += 1;
        entry.2 += p.price.selling;
    }
    let mut categories: Vec<TopCategory> = groups
        .into_iter()
        .map(|(category, (total_sold, total_products, price_sum))| TopCategory {
            category, total_sold, total_products, average_price: average(price_sum, total_products),
        })
        .collect();
    categories.sort_by(|a, b| b.total_sold.cmp(&a.total_sold));
    categories.truncate(limit);
    categories
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrder {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub customer_name: String,
    pub user: Option<CustomerRef>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CustomerRef { pub id: Uuid, pub name: String, pub email: String }

impl CustomerRef {
    pub fn of(user: &User) -> Self { Self { id: user.id, name: user.name.clone(), email: user.email.clone() } }
}

/// Newest first.
pub fn recent_orders(orders: &[Order], users: &[User], limit: usize) -> Vec<RecentOrder> {
    let mut sorted: Vec<&Order> = orders.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
        .into_iter()
        .take(limit)
        .map(|o| RecentOrder {
            id: o.id,
            order_number: o.order_number.clone(),
            status: o.status,
            total: o.pricing.total,
            customer_name: o.shipping_address.name.clone(),
            user: users.iter().find(|u| u.id == o.user).map(CustomerRef::of),
            created_at: o.created_at,
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub orders: OrderStats,
    pub users: UserStats,
    pub products: ProductStats,
    pub revenue: Vec<DailyRevenue>,
    pub top_products: Vec<TopProduct>,
    pub top_categories: Vec<TopCategory>,
    pub recent_orders: Vec<RecentOrder>,
    pub period: i64,
}

pub fn dashboard(orders: &[Order], users: &[User], products: &[Product], period_days: i64) -> Dashboard {
    let range = DateRange::last_days(period_days);
    Dashboard {
        orders: order_stats(orders, &range),
        users: user_stats(users, &range),
        products: product_stats(products),
        revenue: revenue_by_day(orders, &range),
        top_products: top_products(products, 5),
        top_categories: top_categories(products, 5),
        recent_orders: recent_orders(orders, users, 10),
        period: period_days,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Revenue,
    Orders,
    Products,
    Users,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatusCount { pub date: NaiveDate, pub status: OrderStatus, pub count: usize }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyProducts { pub date: NaiveDate, pub new_products: usize, pub total_views: u64, pub total_sales: u64 }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsers { pub date: NaiveDate, pub new_users: usize, pub active_users: usize }

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Series {
    Revenue(Vec<DailyRevenue>),
    Orders(Vec<DailyStatusCount>),
    Products(Vec<DailyProducts>),
    Users(Vec<DailyUsers>),
}

impl Series {
    pub fn len(&self) -> usize {
        match self {
            Self::Revenue(v) => v.len(),
            Self::Orders(v) => v.len(),
            Self::Products(v) => v.len(),
            Self::Users(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// One day-bucketed series for the requested metric, oldest first.
pub fn metric_series(metric: Metric, range: &DateRange, orders: &[Order], users: &[User], products: &[Product]) -> Series {
    match metric {
        Metric::Revenue => Series::Revenue(revenue_by_day(orders, range)),
        Metric::Orders => {
            let mut buckets: BTreeMap<(NaiveDate, &'static str), (OrderStatus, usize)> = BTreeMap::new();
            for o in orders.iter().filter(|o| range.contains(o.created_at)) {
                buckets.entry((o.created_at.date_naive(), o.status.as_str())).or_insert((o.status, 0)).1 += 1;
            }
            Series::Orders(buckets.into_iter().map(|((date, _), (status, count))| DailyStatusCount { date, status, count }).collect())
        }
        Metric::Products => {
            let mut days: BTreeMap<NaiveDate, DailyProducts> = BTreeMap::new();
            for p in products.iter().filter(|p| range.contains(p.created_at)) {
                let date = p.created_at.date_naive();
                let day = days.entry(date).or_insert(DailyProducts { date, new_products: 0, total_views: 0, total_sales: 0 });
                day.new_products += 1;
                day.total_views += p.view_count;
                day.total_sales += p.sold_count;
            }
            Series::Products(days.into_values().collect())
        }
        Metric::Users => {
            let mut days: BTreeMap<NaiveDate, DailyUsers> = BTreeMap::new();
            for u in users.iter().filter(|u| range.contains(u.created_at)) {
                let date = u.created_at.date_naive();
                let day = days.entry(date).or_insert(DailyUsers { date, new_users: 0, active_users: 0 });
                day.new_users += 1;
                if u.is_active { day.active_users += 1; }
            }
            Series::Users(days.into_values().collect())
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseHealth { pub connected: bool, pub backend: &'static str, pub collections: Counts }

#[derive(Clone, Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database: DatabaseHealth,
    pub environment: String,
    /// Seconds since the server started.
    pub uptime: i64,
    pub llm: Option<String>,
    pub events: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::draft;
    use crate::domain::aggregates::product::tests::shirt;
    use crate::domain::value_objects::Email;

    fn orders() -> Vec<Order> {
        let user = Uuid::new_v4();
        let mut a = Order::place(draft(user)).unwrap();
        let b = Order::place(draft(user)).unwrap();
        let mut cancelled = Order::place(draft(user)).unwrap();
        cancelled.cancel(None).unwrap();
        a.created_at -= Duration::days(1);
        vec![a, b, cancelled]
    }

    #[test]
    fn test_order_stats() {
        let orders = orders();
        let stats = order_stats(&orders, &DateRange::last_days(30));
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.pending_orders, 2);
        assert_eq!(stats.cancelled_orders, 1);
        assert_eq!(stats.total_revenue, orders.iter().map(|o| o.pricing.total).sum::<Decimal>());
        assert_eq!(order_stats(&[], &DateRange::last_days(30)), OrderStats::default());
    }

    #[test]
    fn test_revenue_by_day_skips_cancelled() {
        let days = revenue_by_day(&orders(), &DateRange::last_days(30));
        assert_eq!(days.len(), 2);
        assert!(days[0].date < days[1].date);
        assert_eq!(days.iter().map(|d| d.orders).sum::<usize>(), 2);
    }

    #[test]
    fn test_top_products_and_categories() {
        let mut a = Product::create(shirt(), Uuid::nil()).unwrap();
        a.sold_count = 3;
        let mut input = shirt();
        input.title = "Denim".into();
        input.category = Category::Jeans;
        let mut b = Product::create(input, Uuid::nil()).unwrap();
        b.sold_count = 9;
        let products = vec![a, b];
        assert_eq!(top_products(&products, 5)[0].title, "Denim");
        let categories = top_categories(&products, 1);
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].category, Category::Jeans);
        assert_eq!(product_stats(&products).total_products, 2);
    }

    #[test]
    fn test_metric_series() {
        let orders = orders();
        let user = User::register("Ann", &Email::parse("ann@example.com").unwrap(), "hash".into());
        let range = DateRange::last_days(30);
        assert_eq!(metric_series(Metric::Orders, &range, &orders, &[], &[]).len(), 3);
        assert_eq!(metric_series(Metric::Users, &range, &[], &[user], &[]).len(), 1);
        let dash = dashboard(&orders, &[], &[], 30);
        assert_eq!(dash.recent_orders.len(), 3);
        assert_eq!(dash.period, 30);
    }
}
