//! Checkout and order lifecycle.

use axum::{extract::{Path, State}, http::StatusCode, routing::{get, put}, Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser};
use crate::catalog::paginate;
use crate::domain::aggregates::order::{
    next_order_number, order_number_prefix, Coupon, Gift, OrderDraft, OrderItem, OrderStatus, PaymentMethod, ShippingAddress, ShippingMethod,
};
use crate::domain::aggregates::{Order, Product, User};
use crate::domain::value_objects::round_money;
use crate::error::{ok, ok_with_message, AppError, AppResult, ValidJson, ValidQuery};
use crate::state::AppState;
use crate::store::{distinct_ids, StockChange, StoreError};

use super::users::sort_orders;
use super::{date_range, publish, reload_user};

const ADMIN_PAGE_SIZE: u32 = 20;
const ORDER_NUMBER_ATTEMPTS: usize = 3;
const DEFAULT_PROVIDER: &str = "royal-mail";
const CURRENCY: &str = "GBP";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/stats/overview", get(stats_overview))
        .route("/:order_number", get(get_order))
        .route("/:order_number/status", put(update_status))
        .route("/:order_number/cancel", put(cancel_order))
        .route("/:order_number/return", put(request_return))
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
pub struct OrderLine {
    pub product: Uuid,
    #[validate(range(min = 1, max = 10, message = "Quantity must be between 1 and 10"))]
    pub quantity: u32,
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    #[validate(length(min = 1, message = "Color is required"))]
    pub color: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[validate(length(min = 1, message = "Shipping name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Shipping phone is required"))]
    pub phone: String,
    #[validate(email(message = "Valid shipping email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Shipping street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "Shipping city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Shipping state is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Shipping zip code is required"))]
    pub zip_code: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub landmark: String,
}

impl From<AddressInput> for ShippingAddress {
    fn from(a: AddressInput) -> Self {
        Self {
            name: a.name.trim().into(), phone: a.phone.trim().into(), email: a.email.trim().to_lowercase(), street: a.street.trim().into(),
            city: a.city.trim().into(), state: a.state.trim().into(), zip_code: a.zip_code.trim().into(),
            country: a.country.filter(|c| !c.trim().is_empty()).unwrap_or_else(|| "UK".into()), landmark: a.landmark, is_default: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PaymentChoice { pub method: PaymentMethod }

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShippingChoice { pub method: ShippingMethod, pub provider: Option<String>, pub cost: Option<Decimal> }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    #[validate]
    pub items: Vec<OrderLine>,
    #[validate]
    pub shipping_address: AddressInput,
    #[validate]
    pub billing_address: Option<AddressInput>,
    pub payment: PaymentChoice,
    #[serde(default)]
    pub shipping: ShippingChoice,
    #[serde(default)]
    pub coupon: Coupon,
    #[serde(default)]
    pub gift: Gift,
    #[serde(default)]
    #[validate(length(max = 500, message = "Note cannot exceed 500 characters"))]
    pub notes: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest { pub reason: Option<String> }

#[derive(Debug, Deserialize, Validate)]
pub struct ReturnRequest {
    #[validate(length(min = 1, message = "Return reason is required"))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DateQuery { pub start_date: Option<String>, pub end_date: Option<String> }

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub search: Option<String>,
}

/// Price each requested line against a snapshot of the catalogue and check
/// it against the snapshot's stock. Nothing is persisted here; the store
/// re-checks stock when [`reservations`] are applied.
pub(crate) fn reserve_lines(lines: &[OrderLine], products: &mut [Product]) -> AppResult<Vec<OrderItem>> {
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let product = products
            .iter_mut()
            .find(|p| p.id == line.product && p.is_active)
            .ok_or_else(|| AppError::BadRequest(format!("Product {} not found or inactive", line.product)))?;
        let out_of_stock = AppError::BadRequest(format!("Product \"{}\" in {}/{} is out of stock", product.title, line.color, line.size));
        if !product.is_in_stock(&line.color, &line.size) { return Err(out_of_stock); }
        let price = product.price_for(&line.color, &line.size);
        let item = OrderItem {
            product: product.id, title: product.title.clone(), image: product.image_for(&line.color), quantity: line.quantity,
            size: line.size.clone(), color: line.color.clone(), price, total_price: round_money(price * Decimal::from(line.quantity)),
        };
        product.reserve_stock(&line.color, &line.size, line.quantity).map_err(|_| out_of_stock)?;
        items.push(item);
    }
    Ok(items)
}

pub(crate) fn reservations(lines: &[OrderLine]) -> Vec<StockChange> {
    lines.iter().map(|l| StockChange::reserve(l.product, &l.color, &l.size, l.quantity)).collect()
}

/// Insert under the next free number of the day, retrying when a concurrent
/// checkout claimed it first.
async fn insert_numbered(state: &AppState, draft: OrderDraft) -> AppResult<Order> {
    let today = Utc::now().date_naive();
    let prefix = order_number_prefix(today);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let last = state.store.last_order_number(&prefix).await?;
        let order = Order::place(OrderDraft { order_number: next_order_number(today, last.as_deref()), ..draft.clone() })?;
        match state.store.insert_order(&order).await {
            Ok(()) => return Ok(order),
            Err(StoreError::Conflict(_)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::warn!(order_number = %order.order_number, attempt, "Order number taken, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn create_order(State(s): State<AppState>, AuthUser(caller): AuthUser, ValidJson(r): ValidJson<CreateOrder>) -> AppResult<(StatusCode, Json<Value>)> {
    let mut products = s.store.get_products(&distinct_ids(r.items.iter().map(|l| l.product))).await?;
    let items = reserve_lines(&r.items, &mut products)?;
    let stock = reservations(&r.items);
    s.store.adjust_stock(&stock).await?;

    let subtotal: Decimal = items.iter().map(|i| i.total_price).sum();
    let discount = r.coupon.discount_on(subtotal);
    let pricing = s.config.pricing.quote(subtotal, discount, r.shipping.cost.filter(|c| *c > Decimal::ZERO), r.gift.is_gift);
    let shipping_address: ShippingAddress = r.shipping_address.into();
    let billing_address = r.billing_address.map_or_else(|| shipping_address.clone(), Into::into);
    let gift = Gift { wrap_cost: pricing.gift_wrap, ..r.gift };

    let placed = insert_numbered(&s, OrderDraft {
        order_number: String::new(),
        user: caller.id,
        items,
        pricing,
        shipping_address,
        billing_address,
        payment_method: r.payment.method,
        currency: CURRENCY.into(),
        shipping_method: r.shipping.method,
        shipping_provider: r.shipping.provider.filter(|p| !p.is_empty()).unwrap_or_else(|| DEFAULT_PROVIDER.into()),
        coupon: r.coupon,
        gift,
        customer_note: r.notes,
    })
    .await;
    let mut order = match placed {
        Ok(order) => order,
        Err(e) => {
            let undo: Vec<StockChange> = stock.iter().map(StockChange::reversed).collect();
            if let Err(release) = s.store.adjust_stock(&undo).await {
                tracing::error!(error = %release, "Could not return stock after a failed checkout");
            }
            return Err(e);
        }
    };

    let events = order.take_events();
    let mut user = reload_user(&s, &caller).await?;
    user.record_order(order.id);
    s.store.update_user(&user).await?;
    publish(&s, events).await;

    tracing::info!(order_number = %order.order_number, total = %order.pricing.total, "Order placed");
    Ok((StatusCode::CREATED, ok_with_message("Order created successfully", json!({ "order": order }))))
}

/// Admins see every order; shoppers only their own.
async fn visible_order(state: &AppState, user: &User, order_number: &str) -> AppResult<Order> {
    match state.store.find_order_by_number(order_number).await? {
        Some(order) if user.is_admin() || order.user == user.id => Ok(order),
        _ => Err(AppError::not_found("Order")),
    }
}

async fn get_order(State(s): State<AppState>, AuthUser(user): AuthUser, Path(order_number): Path<String>) -> AppResult<Json<Value>> {
    let order = visible_order(&s, &user, &order_number).await?;
    Ok(ok(json!({ "order": order })))
}

async fn update_status(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(order_number): Path<String>,
    ValidJson(r): ValidJson<StatusUpdate>,
) -> AppResult<Json<Value>> {
    let mut order = s.store.find_order_by_number(&order_number).await?.ok_or_else(|| AppError::not_found("Order"))?;
    order.update_status(r.status, r.tracking_number.as_deref(), r.notes.as_deref())?;
    s.store.update_order(&order).await?;
    publish(&s, order.take_events()).await;
    Ok(ok_with_message("Order status updated successfully", json!({ "order": order })))
}

async fn cancel_order(
    State(s): State<AppState>,
    AuthUser(user): AuthUser,
    Path(order_number): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> AppResult<Json<Value>> {
    let mut order = visible_order(&s, &user, &order_number).await?;
    let reason = body.and_then(|Json(b)| b.reason);
    order.cancel(reason.as_deref())?;
    s.store.update_order(&order).await?;

    let releases: Vec<StockChange> = order.items.iter().map(|i| StockChange::release(i.product, &i.color, &i.size, i.quantity)).collect();
    s.store.adjust_stock(&releases).await?;
    publish(&s, order.take_events()).await;
    tracing::info!(order_number = %order.order_number, "Order cancelled");
    Ok(ok_with_message("Order cancelled successfully", json!({ "order": order })))
}

async fn request_return(
    State(s): State<AppState>,
    AuthUser(user): AuthUser,
    Path(order_number): Path<String>,
    ValidJson(r): ValidJson<ReturnRequest>,
) -> AppResult<Json<Value>> {
    let mut order = match s.store.find_order_by_number(&order_number).await? {
        Some(order) if order.user == user.id => order,
        _ => return Err(AppError::not_found("Order")),
    };
    order.request_return(&r.reason, Utc::now())?;
    s.store.update_order(&order).await?;
    publish(&s, order.take_events()).await;
    Ok(ok_with_message("Return request submitted successfully", json!({ "order": order })))
}

async fn stats_overview(State(s): State<AppState>, AdminUser(_): AdminUser, ValidQuery(q): ValidQuery<DateQuery>) -> AppResult<Json<Value>> {
    let range = date_range(q.start_date.as_deref(), q.end_date.as_deref())?;
    let orders = s.store.list_orders().await?;
    Ok(ok(json!({ "stats": crate::analytics::order_stats(&orders, &range) })))
}

/// Case-insensitive match on order number, recipient name or email.
pub(crate) fn matches_search(order: &Order, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    [&order.order_number, &order.shipping_address.name, &order.shipping_address.email]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

async fn list_orders(State(s): State<AppState>, AdminUser(_): AdminUser, ValidQuery(q): ValidQuery<OrderListQuery>) -> AppResult<Json<Value>> {
    let start = q.start_date.as_deref().map(|d| super::parse_date(d, "startDate", false)).transpose()?;
    let end = q.end_date.as_deref().map(|d| super::parse_date(d, "endDate", true)).transpose()?;
    let search = q.search.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let mut orders: Vec<Order> = s
        .store
        .list_orders()
        .await?
        .into_iter()
        .filter(|o| q.status.map_or(true, |st| o.status == st))
        .filter(|o| start.map_or(true, |d| o.created_at >= d))
        .filter(|o| end.map_or(true, |d| o.created_at <= d))
        .filter(|o| search.map_or(true, |t| matches_search(o, t)))
        .collect();
    sort_orders(&mut orders);
    let (page, pagination) = paginate(orders, q.page.unwrap_or(1), q.limit.unwrap_or(ADMIN_PAGE_SIZE));
    Ok(ok(json!({ "orders": page, "pagination": pagination.labelled("Orders") })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::draft;
    use crate::domain::aggregates::product::tests::shirt;

    fn line(product: Uuid, quantity: u32) -> OrderLine {
        OrderLine { product, quantity, size: "M".into(), color: "White".into() }
    }

    #[test]
    fn test_reserve_lines_prices_and_takes_stock() {
        let mut products = vec![Product::create(shirt(), Uuid::nil()).unwrap()];
        let id = products[0].id;
        let before = products[0].inventory.total_stock;
        let items = reserve_lines(&[line(id, 2)], &mut products).unwrap();
        assert_eq!(items[0].total_price, items[0].price * Decimal::TWO);
        assert_eq!(products[0].inventory.total_stock, before - 2);
        assert_eq!(products[0].sold_count, 2);
    }

    #[test]
    fn test_reserve_lines_rejects_unknown_and_oversold() {
        let mut products = vec![Product::create(shirt(), Uuid::nil()).unwrap()];
        let id = products[0].id;
        let missing = Uuid::now_v7();
        let err = reserve_lines(&[line(missing, 1)], &mut products).unwrap_err();
        assert_eq!(err.to_string(), format!("Product {missing} not found or inactive"));

        let err = reserve_lines(&[line(id, 3)], &mut products).unwrap_err();
        assert!(err.to_string().ends_with("in White/M is out of stock"), "{err}");
    }

    #[test]
    fn test_repeated_lines_share_one_product() {
        let mut products = vec![Product::create(shirt(), Uuid::nil()).unwrap()];
        let id = products[0].id;
        let lines = [line(id, 1), line(id, 1)];
        let items = reserve_lines(&lines, &mut products).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(products[0].stock_of("White", "M"), 0);
        assert_eq!(reservations(&lines), vec![StockChange::reserve(id, "White", "M", 1); 2]);

        let mut fresh = [Product::create(shirt(), Uuid::nil()).unwrap()];
        let id = fresh[0].id;
        let err = reserve_lines(&[line(id, 1), line(id, 1), line(id, 1)], &mut fresh).unwrap_err();
        assert!(err.to_string().ends_with("in White/M is out of stock"), "{err}");
    }

    #[test]
    fn test_search_matches_number_and_recipient() {
        let order = Order::place(draft(Uuid::nil())).unwrap();
        assert!(matches_search(&order, &order.order_number.to_lowercase()));
        assert!(matches_search(&order, &order.shipping_address.name.to_uppercase()));
        assert!(!matches_search(&order, "no-such-order"));
    }

    #[test]
    fn test_create_order_validation_reports_nested_fields() {
        let body = json!({
            "items": [],
            "shippingAddress": { "name": "", "phone": "1", "email": "not-an-email", "street": "1 High St", "city": "Leeds", "state": "West Yorkshire", "zipCode": "LS1 1AA" },
            "payment": { "method": "card" }
        });
        let request: CreateOrder = serde_json::from_value(body).unwrap();
        let err: AppError = request.validate().unwrap_err().into();
        let AppError::Validation(fields) = err else { panic!("expected validation error") };
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].field, "items");
        assert_eq!(fields[0].message, "Order must contain at least one item");
        assert!(fields.iter().any(|f| f.field.ends_with(".email") && f.message == "Valid shipping email is required"));
    }
}
