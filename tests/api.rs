//! End-to-end request tests over the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::{header, Request, StatusCode}, Router};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use manvue::config::Config;
use manvue::domain::aggregates::Category;
use manvue::events::EventPublisher;
use manvue::llm::{GenerateRequest, LanguageModel, LlmError};
use manvue::recommend::{embed_product, EMBEDDING_DIMS};
use manvue::state::AppState;
use manvue::store::{MemoryStore, Store, StoreError};

const ADMIN_PASSWORD: &str = "Admin123!";

/// Answers every prompt with the same sentence.
struct CannedModel;

#[async_trait]
impl LanguageModel for CannedModel {
    fn model_name(&self) -> &str { "canned" }
    async fn generate(&self, _request: GenerateRequest) -> Result<String, LlmError> { Ok("Here are some picks for you.".into()) }
}

async fn setup(llm: Option<Arc<dyn LanguageModel>>) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    manvue::seed::seed_demo_data(store.as_ref(), Some(ADMIN_PASSWORD)).await.unwrap();
    let config = Config { mock_payment_max_delay_ms: 0, ..Config::default() };
    let state = AppState::new(config, store.clone(), llm, EventPublisher::disabled()).unwrap();
    (manvue::app(state), store)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token { request = request.header(header::AUTHORIZATION, format!("Bearer {token}")); }
    let request = match body {
        Some(body) => request.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn register(app: &Router, email: &str) -> String {
    let body = json!({ "name": "Sam Smith", "email": email, "password": "secret123" });
    let (status, value) = send(app, "POST", "/api/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    value["data"]["token"].as_str().unwrap().to_string()
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(app, "POST", "/api/auth/login", None, Some(json!({ "email": email, "password": password }))).await
}

async fn admin_token(app: &Router) -> String {
    let (status, body) = login(app, "admin@manvue.com", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn place_order(app: &Router, token: &str, items: Value) -> String {
    let order = json!({ "items": items, "shippingAddress": address(), "payment": { "method": "cod" } });
    let (status, body) = send(app, "POST", "/api/orders", Some(token), Some(order)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["order"]["orderNumber"].as_str().unwrap().to_string()
}

async fn product_id(store: &MemoryStore, title: &str) -> Uuid {
    store.list_products().await.unwrap().into_iter().find(|p| p.title == title).unwrap().id
}

fn address() -> Value {
    json!({
        "name": "Sam Smith", "phone": "07700900123", "email": "sam@example.com",
        "street": "1 High Street", "city": "London", "state": "Greater London", "zipCode": "SW1A 1AA"
    })
}

fn card(number: &str) -> Value {
    json!({ "cardNumber": number, "cardHolder": "Sam Smith", "expiryMonth": 12, "expiryYear": 30, "cvv": "123" })
}

#[tokio::test]
async fn test_health() {
    let (app, _) = setup(None).await;
    let (status, body) = send(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["collections"]["products"], 7);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let (app, _) = setup(None).await;
    let token = register(&app, "Sam@Example.com").await;

    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "sam@example.com");
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let (status, body) = login(&app, "sam@example.com", "secret123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");

    let (status, _) = login(&app, "sam@example.com", "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let body = json!({ "name": "Sam Again", "email": "sam@example.com", "password": "secret123" });
    let (status, _) = send(&app, "POST", "/api/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_registration_validation() {
    let (app, _) = setup(None).await;
    let body = json!({ "name": "S", "email": "not-an-email", "password": "123" });
    let (status, body) = send(&app, "POST", "/api/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_chat_follow_up_keeps_intent() {
    let (app, _) = setup(Some(Arc::new(CannedModel))).await;
    let (status, first) = send(&app, "POST", "/api/ai/chat", None, Some(json!({ "message": "show me blue shirts" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["message"], "Here are some picks for you.");
    let products = first["data"]["products"].as_array().unwrap();
    assert!(products.iter().any(|p| p["title"] == "Blue Linen Casual Shirt"));

    let context = json!([
        { "role": "user", "content": "show me blue shirts" },
        { "role": "assistant", "content": "Here are some picks for you. Want to see more?" }
    ]);
    let (status, second) = send(&app, "POST", "/api/ai/chat", None, Some(json!({ "message": "yes", "context": context }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["products"], first["data"]["products"]);
}

#[tokio::test]
async fn test_chat_without_model_still_answers() {
    let (app, _) = setup(None).await;
    let (status, body) = send(&app, "POST", "/api/ai/chat", None, Some(json!({ "message": "hello there" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["data"]["message"].as_str().unwrap().is_empty());
    assert!(body["data"]["products"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cart_order_and_payment() {
    let (app, store) = setup(None).await;
    let token = register(&app, "buyer@example.com").await;
    let shirt = product_id(&store, "Blue Linen Casual Shirt").await;

    let line = json!({ "productId": shirt, "quantity": 2, "size": "M", "color": "Blue" });
    let (status, body) = send(&app, "POST", "/api/users/cart", Some(&token), Some(line)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["totalItems"], 2);

    let order = json!({
        "items": [{ "product": shirt, "quantity": 2, "size": "M", "color": "Blue" }],
        "shippingAddress": address(),
        "payment": { "method": "card" }
    });
    let (status, body) = send(&app, "POST", "/api/orders", Some(&token), Some(order)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order = &body["data"]["order"];
    let order_id = order["id"].as_str().unwrap().to_string();
    let order_number = order["orderNumber"].as_str().unwrap().to_string();
    assert!(order_number.starts_with("MV"));
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(store.get_product(shirt).await.unwrap().unwrap().stock_of("Blue", "M"), 13);

    let amount = order["pricing"]["total"].clone();
    let payment = json!({ "orderId": order_id, "amount": amount, "cardDetails": card("4242 4242 4242 4242") });
    let (status, body) = send(&app, "POST", "/api/payment/create-mock-payment", Some(&token), Some(payment)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["cardDetails"]["last4"], "4242");
    assert_eq!(body["data"]["cardDetails"]["brand"], "visa");
    let transaction_id = body["data"]["transactionId"].as_str().unwrap().to_string();
    assert!(transaction_id.starts_with("MOCK_"));

    let confirm = json!({ "transactionId": transaction_id, "orderId": order_id });
    let (status, body) = send(&app, "POST", "/api/payment/confirm-mock-payment", Some(&token), Some(confirm.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["order"]["payment"]["status"], "completed");

    let (status, _) = send(&app, "POST", "/api/payment/confirm-mock-payment", Some(&token), Some(confirm)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/api/users/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["orders"][0]["orderNumber"], order_number.as_str());

    let stranger = register(&app, "stranger@example.com").await;
    let (status, _) = send(&app, "GET", &format!("/api/orders/{order_number}"), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_declined_card() {
    let (app, store) = setup(None).await;
    let token = register(&app, "declined@example.com").await;
    let jeans = product_id(&store, "Slim Fit Dark Blue Jeans").await;
    let order = json!({
        "items": [{ "product": jeans, "quantity": 1, "size": "L", "color": "Dark Blue" }],
        "shippingAddress": address(),
        "payment": { "method": "card" }
    });
    let (status, body) = send(&app, "POST", "/api/orders", Some(&token), Some(order)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order_id = body["data"]["order"]["id"].clone();

    let payment = json!({ "orderId": order_id, "amount": 29.99, "cardDetails": card("4000000000000000") });
    let (status, body) = send(&app, "POST", "/api/payment/create-mock-payment", Some(&token), Some(payment)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "PAYMENT_DECLINED");
    assert!(body["transactionId"].as_str().unwrap().starts_with("MOCK_"));
}

#[tokio::test]
async fn test_out_of_stock_order_is_rejected() {
    let (app, store) = setup(None).await;
    let token = register(&app, "greedy@example.com").await;
    let blazer = product_id(&store, "Navy Wool Blazer").await;
    let order = json!({
        "items": [{ "product": blazer, "quantity": 1, "size": "M", "color": "Bright Pink" }],
        "shippingAddress": address(),
        "payment": { "method": "cod" }
    });
    let (status, body) = send(&app, "POST", "/api/orders", Some(&token), Some(order)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("out of stock"));
    assert_eq!(store.counts().await.unwrap().orders, 0);
}

#[tokio::test]
async fn test_admin_guards() {
    let (app, _) = setup(None).await;
    let (status, _) = send(&app, "GET", "/api/admin/dashboard", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let shopper = register(&app, "shopper@example.com").await;
    let (status, _) = send(&app, "GET", "/api/admin/dashboard", Some(&shopper), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = login(&app, "admin@manvue.com", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    let admin = body["data"]["token"].as_str().unwrap().to_string();
    let (status, body) = send(&app, "GET", "/api/admin/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(&app, "GET", "/api/admin/users?limit=500", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_product_detail_by_slug_counts_views() {
    let (app, store) = setup(None).await;
    let (status, body) = send(&app, "GET", "/api/products/blue-linen-casual-shirt", None, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["isWishlisted"], false);
    let id = product_id(&store, "Blue Linen Casual Shirt").await;
    assert_eq!(store.get_product(id).await.unwrap().unwrap().view_count, 1);

    let (status, _) = send(&app, "GET", "/api/products/no-such-shirt", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_repeated_product_lines_take_all_stock() {
    let (app, store) = setup(None).await;
    let token = register(&app, "twice@example.com").await;
    let shirt = product_id(&store, "Blue Linen Casual Shirt").await;
    let items = json!([
        { "product": shirt, "quantity": 2, "size": "M", "color": "Blue" },
        { "product": shirt, "quantity": 3, "size": "M", "color": "Blue" }
    ]);
    let order_number = place_order(&app, &token, items).await;

    let stored = store.get_product(shirt).await.unwrap().unwrap();
    assert_eq!(stored.stock_of("Blue", "M"), 10);
    assert_eq!(stored.sold_count, 54 + 5);
    let order = store.find_order_by_number(&order_number).await.unwrap().unwrap();
    assert_eq!(order.items.len(), 2);
}

#[tokio::test]
async fn test_stale_product_copy_cannot_undo_an_order() {
    let (app, store) = setup(None).await;
    let token = register(&app, "racer@example.com").await;
    let shirt = product_id(&store, "Blue Linen Casual Shirt").await;
    let mut stale = store.get_product(shirt).await.unwrap().unwrap();

    place_order(&app, &token, json!([{ "product": shirt, "quantity": 4, "size": "M", "color": "Blue" }])).await;
    stale.view_count += 1;
    assert!(matches!(store.update_product(&stale).await, Err(StoreError::Stale("product"))));

    let (status, body) = send(&app, "GET", "/api/products/blue-linen-casual-shirt", None, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let stored = store.get_product(shirt).await.unwrap().unwrap();
    assert_eq!(stored.stock_of("Blue", "M"), 11);
    assert_eq!(stored.view_count, 1);

    let (status, _) = send(&app, "POST", &format!("/api/products/{shirt}/wishlist"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let review = json!({ "rating": 5, "comment": "Great fit" });
    let (status, body) = send(&app, "POST", &format!("/api/products/{shirt}/reviews"), Some(&token), Some(review)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let stored = store.get_product(shirt).await.unwrap().unwrap();
    assert_eq!(stored.stock_of("Blue", "M"), 11);
    assert_eq!(stored.view_count, 1);
    assert_eq!(stored.wishlisted_by.len(), 1);
    assert_eq!(stored.reviews.len(), 1);
}

#[tokio::test]
async fn test_cancel_restores_stock_once() {
    let (app, store) = setup(None).await;
    let token = register(&app, "cancel@example.com").await;
    let jeans = product_id(&store, "Slim Fit Dark Blue Jeans").await;
    let order_number = place_order(&app, &token, json!([{ "product": jeans, "quantity": 3, "size": "L", "color": "Dark Blue" }])).await;
    assert_eq!(store.get_product(jeans).await.unwrap().unwrap().stock_of("Dark Blue", "L"), 12);

    let uri = format!("/api/orders/{order_number}/cancel");
    let (status, body) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "reason": "Changed my mind" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Order cancelled successfully");
    assert_eq!(body["data"]["order"]["status"], "cancelled");
    let stored = store.get_product(jeans).await.unwrap().unwrap();
    assert_eq!(stored.stock_of("Dark Blue", "L"), 15);
    assert_eq!(stored.sold_count, 156);

    let (status, _) = send(&app, "PUT", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.get_product(jeans).await.unwrap().unwrap().stock_of("Dark Blue", "L"), 15);
    let order = store.find_order_by_number(&order_number).await.unwrap().unwrap();
    assert_eq!(order.status.as_str(), "cancelled");
}

#[tokio::test]
async fn test_return_only_after_delivery() {
    let (app, store) = setup(None).await;
    let token = register(&app, "returns@example.com").await;
    let admin = admin_token(&app).await;
    let shoes = product_id(&store, "Formal Black Leather Shoes").await;
    let color = store.get_product(shoes).await.unwrap().unwrap().variants[0].color.clone();
    let order_number = place_order(&app, &token, json!([{ "product": shoes, "quantity": 1, "size": "M", "color": color }])).await;

    let uri = format!("/api/orders/{order_number}/return");
    let (status, _) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "reason": "Too small" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status_uri = format!("/api/orders/{order_number}/status");
    let (status, body) = send(&app, "PUT", &status_uri, Some(&admin), Some(json!({ "status": "delivered" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = send(&app, "PUT", &uri, Some(&admin), Some(json!({ "reason": "Too small" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "reason": "Too small" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Return request submitted successfully");

    let order = store.find_order_by_number(&order_number).await.unwrap().unwrap();
    assert_eq!(order.returns.return_reason, "Too small");
    assert!(order.returns.return_requested_at.is_some());
    let (status, _) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "reason": "Again" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_semantic_search() {
    let (app, _) = setup(None).await;
    let (status, body) = send(&app, "GET", "/api/ai/search?q=black%20leather%20jacket&limit=3", None, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let products = body["data"]["products"].as_array().unwrap();
    assert!(!products.is_empty() && products.len() <= 3);
    assert_eq!(body["data"]["totalFound"], products.len());
    assert!(products.iter().any(|p| p["title"] == "Premium Black Leather Jacket"));
    assert!(products.iter().all(|p| p["score"].is_number() && p.get("embeddings").is_none()));

    let (status, _) = send(&app, "GET", "/api/ai/search?q=", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_embeddings_fills_missing_vectors() {
    let (app, store) = setup(None).await;
    let admin = admin_token(&app).await;
    let blazer = product_id(&store, "Navy Wool Blazer").await;
    let mut product = store.get_product(blazer).await.unwrap().unwrap();
    product.embeddings.clear();
    store.update_product(&product).await.unwrap();

    let shopper = register(&app, "curious@example.com").await;
    let (status, _) = send(&app, "POST", "/api/ai/generate-embeddings", Some(&shopper), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "POST", "/api/ai/generate-embeddings", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Generated embeddings for 1 products");
    let stored = store.get_product(blazer).await.unwrap().unwrap();
    assert_eq!(stored.embeddings.len(), EMBEDDING_DIMS);
    assert_eq!(stored.embeddings, embed_product(&stored));
}

#[tokio::test]
async fn test_bulk_product_update() {
    let (app, store) = setup(None).await;
    let admin = admin_token(&app).await;
    let tee = product_id(&store, "Cotton Casual T-Shirt").await;
    let blazer = product_id(&store, "Navy Wool Blazer").await;
    let body = json!({ "productIds": [tee, blazer, tee, Uuid::now_v7()], "updates": { "category": "jeans", "isBestSeller": true } });
    let (status, body) = send(&app, "PUT", "/api/admin/products/bulk", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["matchedCount"], 2);
    assert_eq!(body["data"]["modifiedCount"], 2);
    assert_eq!(body["message"], "Updated 2 products");

    for id in [tee, blazer] {
        let stored = store.get_product(id).await.unwrap().unwrap();
        assert_eq!(stored.category, Category::Jeans);
        assert!(stored.is_best_seller);
        assert_eq!(stored.embeddings, embed_product(&stored));
    }
    let (status, body) = send(&app, "GET", "/api/products?category=jeans", None, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["products"].as_array().unwrap().len(), 3);
}
