//! MockPay card checkout.

use axum::{extract::State, routing::{get, post}, Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::AuthUser;
use crate::domain::aggregates::{Order, User};
use crate::error::{ok, ok_with_message, AppError, AppResult, ValidJson};
use crate::payment::{available_methods, CardDetails, MockGateway, GATEWAY_NAME};
use crate::state::AppState;

use super::publish;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-mock-payment", post(create_payment))
        .route("/confirm-mock-payment", post(confirm_payment))
        .route("/mock-methods", get(methods))
}

fn positive(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO { return Err(ValidationError::new("positive")); }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    pub order_id: Uuid,
    #[validate(custom(function = "positive", message = "Amount must be a positive number"))]
    pub amount: Decimal,
    #[validate]
    pub card_details: CardDetails,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayment {
    #[validate(length(min = 1, message = "Transaction ID is required"))]
    pub transaction_id: String,
    pub order_id: Uuid,
}

/// Payments may only be taken against the caller's own orders.
async fn owned_order(state: &AppState, user: &User, order_id: Uuid) -> AppResult<Order> {
    let order = state.store.get_order(order_id).await?.ok_or_else(|| AppError::not_found("Order"))?;
    if order.user != user.id { return Err(AppError::Forbidden("Unauthorized access to order".into())); }
    Ok(order)
}

async fn create_payment(State(s): State<AppState>, AuthUser(user): AuthUser, ValidJson(r): ValidJson<CreatePayment>) -> AppResult<Json<Value>> {
    let order = owned_order(&s, &user, r.order_id).await?;
    let gateway = MockGateway::new(s.config.mock_payment_max_delay_ms);
    match gateway.charge(order.id, r.amount, &r.card_details).await {
        Ok(charge) => Ok(ok(charge)),
        Err(declined) => Err(AppError::PaymentDeclined { message: declined.to_string(), transaction_id: declined.transaction_id }),
    }
}

async fn confirm_payment(State(s): State<AppState>, AuthUser(user): AuthUser, ValidJson(r): ValidJson<ConfirmPayment>) -> AppResult<Json<Value>> {
    let mut order = owned_order(&s, &user, r.order_id).await?;
    order.confirm_payment(&r.transaction_id, GATEWAY_NAME)?;
    s.store.update_order(&order).await?;
    publish(&s, order.take_events()).await;
    tracing::info!(order_number = %order.order_number, transaction_id = %r.transaction_id, "Payment confirmed");
    Ok(ok_with_message("Payment confirmed successfully", json!({ "order": order, "transactionId": r.transaction_id, "status": "completed" })))
}

async fn methods(AuthUser(_): AuthUser) -> Json<Value> { ok(json!({ "methods": available_methods() })) }
