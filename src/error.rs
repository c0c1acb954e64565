//! Unified error handling for the HTTP layer.
//!
//! Every handler returns [`AppResult`]. Layer errors convert into
//! [`AppError`] with `?`, and the response always uses the
//! `{ "success": false, "message": ... }` envelope. Server-side failures
//! are logged and replaced by a generic message.

use axum::{
    async_trait,
    extract::{rejection::{JsonRejection, QueryRejection}, FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::auth::AuthError;
use crate::domain::aggregates::{CartError, OrderError, ProductError};
use crate::store::StoreError;

/// One failed field in a validation response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError { pub field: String, pub message: String }

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    PaymentDeclined { message: String, transaction_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Product(#[from] ProductError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error("{0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn not_found(what: &str) -> Self { Self::NotFound(format!("{what} not found")) }

    pub fn field(field: &str, message: &str) -> Self {
        Self::Validation(vec![FieldError { field: field.into(), message: message.into() }])
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) | Self::PaymentDeclined { .. } | Self::Product(_) | Self::Order(_) => StatusCode::BAD_REQUEST,
            Self::Store(StoreError::OutOfStock { .. }) => StatusCode::BAD_REQUEST,
            Self::Cart(CartError::ItemNotFound) => StatusCode::NOT_FOUND,
            Self::Cart(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Auth(e) => e.status(),
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::Store(StoreError::Conflict(_) | StoreError::Stale(_)) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = Vec::new();
        flatten_validation("", &errors, &mut fields);
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        Self::Validation(fields)
    }
}

/// Nested structs report as `parent.child`, list entries as `parent[i].child`.
fn flatten_validation(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() { field.to_string() } else { format!("{prefix}.{field}") };
        match kind {
            ValidationErrorsKind::Field(errs) => out.extend(errs.iter().map(|e| FieldError {
                field: path.clone(),
                message: e.message.as_ref().map_or_else(|| format!("{path} is invalid"), |m| m.to_string()),
            })),
            ValidationErrorsKind::Struct(inner) => flatten_validation(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (i, inner) in items { flatten_validation(&format!("{path}[{i}]"), inner, out); }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        }
        let body = match &self {
            Self::Validation(errors) => json!({ "success": false, "message": "Validation failed", "errors": errors }),
            Self::PaymentDeclined { message, transaction_id } => json!({
                "success": false, "message": message, "code": "PAYMENT_DECLINED", "transactionId": transaction_id,
            }),
            Self::Store(StoreError::Conflict(what)) => json!({ "success": false, "message": format!("A {what} with these details already exists") }),
            Self::Store(StoreError::NotFound(what)) => json!({ "success": false, "message": format!("{what} not found") }),
            Self::Store(StoreError::Stale(what)) => json!({ "success": false, "message": format!("The {what} was changed by another request, please try again") }),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => json!({ "success": false, "message": "Internal server error" }),
            _ => json!({ "success": false, "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// `{ "success": true, "data": ... }`
pub fn ok<T: Serialize>(data: T) -> Json<Value> { Json(json!({ "success": true, "data": data })) }

/// `{ "success": true, "message": ..., "data": ... }`
pub fn ok_with_message<T: Serialize>(message: &str, data: T) -> Json<Value> {
    Json(json!({ "success": true, "message": message, "data": data }))
}

pub fn ok_message(message: &str) -> Json<Value> { Json(json!({ "success": true, "message": message })) }

/// JSON body that has passed its `validator` rules.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e: JsonRejection| AppError::BadRequest(e.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string that has passed its `validator` rules.
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await.map_err(|e: QueryRejection| AppError::BadRequest(e.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_echoed() {
        let (status, body) = body_of(AppError::Internal("db password wrong".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_conflict_and_declined() {
        let (status, _) = body_of(StoreError::Conflict("product").into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, body) = body_of(AppError::PaymentDeclined { message: "Card declined".into(), transaction_id: "MOCK_1".into() }).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "PAYMENT_DECLINED");
    }

    #[tokio::test]
    async fn test_store_stock_errors() {
        let (status, _) = body_of(StoreError::Stale("product").into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let out = StoreError::OutOfStock { title: "Oxford Shirt".into(), color: "Blue".into(), size: "M".into() };
        let (status, body) = body_of(out.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Product \"Oxford Shirt\" in Blue/M is out of stock");
    }

    #[tokio::test]
    async fn test_validation_envelope() {
        let (status, body) = body_of(AppError::field("quantity", "Quantity must be between 1 and 10")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "quantity");
    }
}
