//! Domain events raised by aggregates and fanned out by the publisher
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, slug: String },
    Deactivated { product_id: Uuid },
    Reviewed { product_id: Uuid, rating: u8 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, user_id: Uuid, total: Decimal },
    StatusChanged { order_id: Uuid, order_number: String, status: String },
    Cancelled { order_id: Uuid, order_number: String },
    PaymentConfirmed { order_id: Uuid, transaction_id: String, amount: Decimal },
    ReturnRequested { order_id: Uuid, order_number: String },
}

impl DomainEvent {
    /// NATS subject the event is published on, e.g. `manvue.order.placed`.
    pub fn subject(&self) -> String {
        let (aggregate, kind) = match self {
            Self::Product(e) => ("product", match e {
                ProductEvent::Created { .. } => "created",
                ProductEvent::Deactivated { .. } => "deactivated",
                ProductEvent::Reviewed { .. } => "reviewed",
            }),
            Self::Order(e) => ("order", match e {
                OrderEvent::Placed { .. } => "placed",
                OrderEvent::StatusChanged { .. } => "status_changed",
                OrderEvent::Cancelled { .. } => "cancelled",
                OrderEvent::PaymentConfirmed { .. } => "payment_confirmed",
                OrderEvent::ReturnRequested { .. } => "return_requested",
            }),
        };
        format!("manvue.{aggregate}.{kind}")
    }
}
