//! Order Aggregate

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{round_money, Pricing};

pub const ORDER_NUMBER_PREFIX: &str = "MV";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped,
        Self::Delivered, Self::Cancelled, Self::Returned, Self::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Processing => "processing",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled",
            Self::Returned => "returned", Self::Refunded => "refunded",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Cancelled | Self::Refunded) }

    fn tracking_message(&self, tracking_number: Option<&str>) -> String {
        match self {
            Self::Confirmed => "Order has been confirmed and is being prepared".into(),
            Self::Processing => "Order is being processed".into(),
            Self::Shipped => match tracking_number {
                Some(n) => format!("Order has been shipped with tracking number {n}"),
                None => "Order has been shipped".into(),
            },
            Self::Delivered => "Order has been delivered successfully".into(),
            Self::Cancelled => "Order has been cancelled".into(),
            Self::Returned => "Order has been returned".into(),
            Self::Refunded => "Order has been refunded".into(),
            Self::Pending => "Order status updated to pending".into(),
        }
    }
}

/// Milestones recorded on the tracking timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    OrderPlaced,
    PaymentConfirmed,
    Confirmed,
    Processing,
    Packed,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Returned,
    Refunded,
    Pending,
}

impl TrackingStatus {
    /// Order status implied by reaching this milestone, if any.
    fn order_status(&self) -> Option<OrderStatus> {
        match self {
            Self::OrderPlaced | Self::Pending => Some(OrderStatus::Pending),
            Self::PaymentConfirmed | Self::Confirmed => Some(OrderStatus::Confirmed),
            Self::Processing | Self::Packed => Some(OrderStatus::Processing),
            Self::Shipped | Self::OutForDelivery => Some(OrderStatus::Shipped),
            Self::Delivered => Some(OrderStatus::Delivered),
            Self::Cancelled => Some(OrderStatus::Cancelled),
            Self::Returned => Some(OrderStatus::Returned),
            Self::Refunded => Some(OrderStatus::Refunded),
        }
    }
}

impl From<OrderStatus> for TrackingStatus {
    fn from(s: OrderStatus) -> Self {
        match s {
            OrderStatus::Pending => Self::Pending,
            OrderStatus::Confirmed => Self::Confirmed,
            OrderStatus::Processing => Self::Processing,
            OrderStatus::Shipped => Self::Shipped,
            OrderStatus::Delivered => Self::Delivered,
            OrderStatus::Cancelled => Self::Cancelled,
            OrderStatus::Returned => Self::Returned,
            OrderStatus::Refunded => Self::Refunded,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent { pub status: TrackingStatus, pub message: String, #[serde(default)] pub location: String, pub timestamp: DateTime<Utc> }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem { pub product: Uuid, pub title: String, pub image: String, pub quantity: u32, pub size: String, pub color: String, pub price: Decimal, pub total_price: Decimal }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: String, pub phone: String, pub email: String, pub street: String, pub city: String,
    pub state: String, pub zip_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub landmark: String,
    #[serde(default)]
    pub is_default: bool,
}

fn default_country() -> String { "UK".into() }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { Card, Upi, Netbanking, Wallet, Cod, Emi }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Processing, Completed, Failed, Refunded }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub payment_gateway: String,
    pub amount_paid: Decimal,
    pub currency: String,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refund_amount: Decimal,
    #[serde(default)]
    pub refund_reason: String,
    #[serde(default)]
    pub refunded_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingMethod { #[default] Standard, Express, Overnight, Free }

impl ShippingMethod {
    pub fn delivery_days(&self) -> i64 {
        match self { Self::Standard => 7, Self::Express => 3, Self::Overnight => 1, Self::Free => 10 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipping {
    pub method: ShippingMethod,
    pub provider: String,
    #[serde(default)]
    pub tracking_number: String,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_delivery: Option<DateTime<Utc>>,
    pub cost: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Notes { pub customer: String, pub admin: String }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind { #[default] Percentage, Fixed }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Coupon {
    pub code: String,
    pub discount: Decimal,
    #[serde(rename = "type")]
    pub kind: CouponKind,
}

impl Coupon {
    /// Discount this coupon is worth against `subtotal`, never more than the subtotal.
    pub fn discount_on(&self, subtotal: Decimal) -> Decimal {
        if self.code.trim().is_empty() || self.discount <= Decimal::ZERO { return Decimal::ZERO; }
        let raw = match self.kind {
            CouponKind::Percentage => subtotal * self.discount.min(Decimal::ONE_HUNDRED) / Decimal::ONE_HUNDRED,
            CouponKind::Fixed => self.discount,
        };
        round_money(raw.min(subtotal))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Gift { pub is_gift: bool, pub message: String, pub wrap_cost: Decimal }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus { #[default] None, Requested, Approved, Rejected, PickedUp, Received, Refunded }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Returns {
    pub is_returnable: bool,
    /// Days after delivery during which a return may be requested.
    pub return_window: i64,
    #[serde(default)]
    pub return_reason: String,
    #[serde(default)]
    pub return_status: ReturnStatus,
    #[serde(default)]
    pub return_requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub return_processed_at: Option<DateTime<Utc>>,
}

impl Default for Returns {
    fn default() -> Self {
        Self { is_returnable: true, return_window: 30, return_reason: String::new(), return_status: ReturnStatus::None, return_requested_at: None, return_processed_at: None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user: Uuid,
    pub items: Vec<OrderItem>,
    pub pricing: Pricing,
    pub shipping_address: ShippingAddress,
    pub billing_address: ShippingAddress,
    pub payment: Payment,
    pub shipping: Shipping,
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking: Vec<TrackingEvent>,
    #[serde(default)]
    pub notes: Notes,
    #[serde(default)]
    pub coupon: Coupon,
    #[serde(default)]
    pub gift: Gift,
    #[serde(default)]
    pub returns: Returns,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Inputs collected at checkout once items have been priced.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    pub order_number: String,
    pub user: Uuid,
    pub items: Vec<OrderItem>,
    pub pricing: Pricing,
    pub shipping_address: ShippingAddress,
    pub billing_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub currency: String,
    pub shipping_method: ShippingMethod,
    pub shipping_provider: String,
    pub coupon: Coupon,
    pub gift: Gift,
    pub customer_note: String,
}

impl Order {
    pub fn place(draft: OrderDraft) -> Result<Self, OrderError> {
        if draft.items.is_empty() { return Err(OrderError::NoItems); }
        let now = Utc::now();
        let payment_status = if draft.payment_method == PaymentMethod::Cod { PaymentStatus::Pending } else { PaymentStatus::Processing };
        let mut order = Self {
            id: Uuid::now_v7(), order_number: draft.order_number, user: draft.user, items: draft.items,
            shipping: Shipping {
                method: draft.shipping_method, provider: draft.shipping_provider, tracking_number: String::new(),
                estimated_delivery: Some(now + Duration::days(draft.shipping_method.delivery_days())),
                actual_delivery: None, cost: draft.pricing.shipping,
            },
            payment: Payment {
                method: draft.payment_method, status: payment_status, transaction_id: String::new(), payment_gateway: String::new(),
                amount_paid: Decimal::ZERO, currency: draft.currency, paid_at: None, refund_amount: Decimal::ZERO,
                refund_reason: String::new(), refunded_at: None,
            },
            pricing: draft.pricing, shipping_address: draft.shipping_address, billing_address: draft.billing_address,
            status: OrderStatus::Pending, tracking: vec![], notes: Notes { customer: draft.customer_note, admin: String::new() },
            coupon: draft.coupon, gift: draft.gift, returns: Returns::default(), created_at: now, updated_at: now, events: vec![],
        };
        order.add_tracking(TrackingStatus::OrderPlaced, "Order has been placed successfully", "");
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, order_number: order.order_number.clone(), user_id: order.user, total: order.pricing.total,
        }));
        Ok(order)
    }

    pub fn total_items(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }
    pub fn current_tracking(&self) -> Option<&TrackingEvent> { self.tracking.last() }

    /// Append a milestone and move the order to the status it implies.
    pub fn add_tracking(&mut self, status: TrackingStatus, message: impl Into<String>, location: &str) {
        let now = Utc::now();
        self.tracking.push(TrackingEvent { status, message: message.into(), location: location.to_string(), timestamp: now });
        if let Some(next) = status.order_status() {
            self.status = next;
            if next == OrderStatus::Delivered { self.shipping.actual_delivery = Some(now); }
        }
        self.touch();
    }

    /// Admin-driven status change. Cancelled and refunded orders are final.
    pub fn update_status(&mut self, next: OrderStatus, tracking_number: Option<&str>, admin_note: Option<&str>) -> Result<(), OrderError> {
        if self.status.is_terminal() && next != self.status { return Err(OrderError::InvalidTransition { from: self.status, to: next }); }
        if let Some(n) = tracking_number.filter(|n| !n.is_empty()) { self.shipping.tracking_number = n.to_string(); }
        if let Some(note) = admin_note.filter(|n| !n.is_empty()) { self.notes.admin = note.to_string(); }
        let message = next.tracking_message(tracking_number.filter(|n| !n.is_empty()));
        self.add_tracking(next.into(), message, "");
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged {
            order_id: self.id, order_number: self.order_number.clone(), status: next.as_str().to_string(),
        }));
        Ok(())
    }

    pub fn can_be_cancelled(&self) -> bool { matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed) }

    pub fn cancel(&mut self, reason: Option<&str>) -> Result<(), OrderError> {
        if !self.can_be_cancelled() { return Err(OrderError::CannotCancel); }
        let reason = reason.map(str::trim).filter(|r| !r.is_empty()).unwrap_or("Order cancelled by user");
        self.add_tracking(TrackingStatus::Cancelled, reason, "");
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id, order_number: self.order_number.clone() }));
        Ok(())
    }

    pub fn can_be_returned(&self, now: DateTime<Utc>) -> bool {
        if !self.returns.is_returnable || self.status != OrderStatus::Delivered { return false; }
        if self.returns.return_status != ReturnStatus::None { return false; }
        match self.shipping.actual_delivery {
            Some(delivered) => now <= delivered + Duration::days(self.returns.return_window),
            None => false,
        }
    }

    pub fn request_return(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.can_be_returned(now) { return Err(OrderError::NotReturnable); }
        self.returns.return_reason = reason.trim().to_string();
        self.returns.return_status = ReturnStatus::Requested;
        self.returns.return_requested_at = Some(now);
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::ReturnRequested { order_id: self.id, order_number: self.order_number.clone() }));
        Ok(())
    }

    pub fn confirm_payment(&mut self, transaction_id: &str, gateway: &str) -> Result<(), OrderError> {
        if self.payment.status == PaymentStatus::Completed { return Err(OrderError::AlreadyPaid); }
        if self.status.is_terminal() { return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Confirmed }); }
        self.payment.status = PaymentStatus::Completed;
        self.payment.transaction_id = transaction_id.to_string();
        self.payment.payment_gateway = gateway.to_string();
        self.payment.paid_at = Some(Utc::now());
        self.payment.amount_paid = self.pricing.total;
        self.add_tracking(TrackingStatus::PaymentConfirmed, "Payment confirmed successfully via MockPay Gateway", "");
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentConfirmed {
            order_id: self.id, transaction_id: transaction_id.to_string(), amount: self.pricing.total,
        }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Daily prefix, e.g. `MV250314` for 14 March 2025.
pub fn order_number_prefix(date: NaiveDate) -> String {
    format!("{ORDER_NUMBER_PREFIX}{:02}{:02}{:02}", date.year() % 100, date.month(), date.day())
}

/// Next number in the day's sequence given the highest number issued so far.
pub fn next_order_number(date: NaiveDate, last_issued: Option<&str>) -> String {
    let prefix = order_number_prefix(date);
    let sequence = last_issued
        .and_then(|n| n.strip_prefix(prefix.as_str()))
        .and_then(|seq| seq.parse::<u32>().ok())
        .map_or(1, |seq| seq + 1);
    format!("{prefix}{sequence:04}")
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Order must contain at least one item")]
    NoItems,
    #[error("Order cannot be cancelled at this stage")]
    CannotCancel,
    #[error("Order is not eligible for return")]
    NotReturnable,
    #[error("Order has already been paid")]
    AlreadyPaid,
    #[error("Cannot move order from {} to {}", from.as_str(), to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn draft(user: Uuid) -> OrderDraft {
        let address = ShippingAddress {
            name: "Sam".into(), phone: "0700".into(), email: "sam@example.com".into(), street: "1 High St".into(),
            city: "Leeds".into(), state: "West Yorkshire".into(), zip_code: "LS1".into(), country: "UK".into(),
            landmark: String::new(), is_default: false,
        };
        OrderDraft {
            order_number: "MV2501010001".into(), user,
            items: vec![OrderItem {
                product: Uuid::new_v4(), title: "Oxford Shirt".into(), image: String::new(), quantity: 2,
                size: "M".into(), color: "Blue".into(), price: Decimal::new(30, 0), total_price: Decimal::new(60, 0),
            }],
            pricing: Pricing { subtotal: Decimal::new(60, 0), total: Decimal::new(7080, 2), tax: Decimal::new(1080, 2), ..Pricing::default() },
            shipping_address: address.clone(), billing_address: address, payment_method: PaymentMethod::Card,
            currency: "GBP".into(), shipping_method: ShippingMethod::Express, shipping_provider: "royal_mail".into(),
            coupon: Coupon::default(), gift: Gift::default(), customer_note: String::new(),
        }
    }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::place(draft(Uuid::new_v4())).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment.status, PaymentStatus::Processing);
        assert_eq!(order.tracking.len(), 1);
        assert_eq!(order.total_items(), 2);
        order.confirm_payment("MOCK_1", "mock-pay").unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment.amount_paid, Decimal::new(7080, 2));
        assert_eq!(order.confirm_payment("MOCK_2", "mock-pay"), Err(OrderError::AlreadyPaid));
        order.update_status(OrderStatus::Shipped, Some("RM123"), None).unwrap();
        assert_eq!(order.shipping.tracking_number, "RM123");
        assert_eq!(order.current_tracking().unwrap().message, "Order has been shipped with tracking number RM123");
        assert!(!order.can_be_cancelled());
        assert_eq!(order.cancel(None), Err(OrderError::CannotCancel));
        order.update_status(OrderStatus::Delivered, None, None).unwrap();
        assert!(order.shipping.actual_delivery.is_some());
        assert_eq!(order.take_events().len(), 4);
    }

    #[test]
    fn test_estimated_delivery() {
        let order = Order::place(draft(Uuid::new_v4())).unwrap();
        let eta = order.shipping.estimated_delivery.unwrap();
        assert_eq!((eta - order.created_at).num_days(), 3);
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut order = Order::place(draft(Uuid::new_v4())).unwrap();
        order.cancel(Some("changed my mind")).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.current_tracking().unwrap().message, "changed my mind");
        assert!(order.update_status(OrderStatus::Shipped, None, None).is_err());
    }

    #[test]
    fn test_return_window() {
        let mut order = Order::place(draft(Uuid::new_v4())).unwrap();
        let now = Utc::now();
        assert!(!order.can_be_returned(now));
        order.update_status(OrderStatus::Delivered, None, None).unwrap();
        assert!(order.can_be_returned(now));
        assert!(!order.can_be_returned(now + Duration::days(31)));
        order.request_return("too small", now).unwrap();
        assert_eq!(order.returns.return_status, ReturnStatus::Requested);
        assert_eq!(order.request_return("again", now), Err(OrderError::NotReturnable));
    }

    #[test]
    fn test_coupon() {
        let pct = Coupon { code: "SAVE10".into(), discount: Decimal::new(10, 0), kind: CouponKind::Percentage };
        assert_eq!(pct.discount_on(Decimal::new(80, 0)), Decimal::new(8, 0));
        let fixed = Coupon { code: "FIVER".into(), discount: Decimal::new(50, 0), kind: CouponKind::Fixed };
        assert_eq!(fixed.discount_on(Decimal::new(20, 0)), Decimal::new(20, 0));
        assert_eq!(Coupon::default().discount_on(Decimal::new(20, 0)), Decimal::ZERO);
    }

    #[test]
    fn test_order_number_sequence() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(next_order_number(day, None), "MV2503140001");
        assert_eq!(next_order_number(day, Some("MV2503140041")), "MV2503140042");
        assert_eq!(next_order_number(day, Some("MV2503130007")), "MV2503140001");
    }
}
