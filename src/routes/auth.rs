//! Account registration, login and profile management.

use axum::{extract::State, http::StatusCode, routing::{get, post, put}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::auth::{hash_password, verify_password, AuthError, AuthUser};
use crate::domain::aggregates::user::PostalAddress;
use crate::domain::aggregates::User;
use crate::domain::value_objects::Email;
use crate::error::{ok, ok_message, ok_with_message, AppError, AppResult, ValidJson};
use crate::state::AppState;
use crate::store::StoreError;

use super::reload_user;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/change-password", put(change_password))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 20, message = "Phone number is too long"))]
    pub phone: Option<String>,
    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar: Option<String>,
    pub address: Option<PostalAddress>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    pub new_password: String,
}

fn session(state: &AppState, user: &User) -> Value {
    json!({ "token": state.signer.issue(user.id, user.role), "user": user })
}

fn parse_email(raw: &str) -> AppResult<Email> {
    Email::parse(raw).map_err(|_| AppError::field("email", "Please enter a valid email"))
}

async fn register(State(s): State<AppState>, ValidJson(r): ValidJson<RegisterRequest>) -> AppResult<(StatusCode, Json<Value>)> {
    let email = parse_email(&r.email)?;
    let hash = hash_password(&r.password)?;
    let user = User::register(r.name, &email, hash);
    s.store.insert_user(&user).await.map_err(|e| match e {
        StoreError::Conflict(_) => AppError::Conflict("User already exists with this email".into()),
        other => other.into(),
    })?;
    tracing::info!(user_id = %user.id, "Registered new user");
    Ok((StatusCode::CREATED, ok_with_message("User registered successfully", session(&s, &user))))
}

async fn login(State(s): State<AppState>, ValidJson(r): ValidJson<LoginRequest>) -> AppResult<Json<Value>> {
    let email = parse_email(&r.email)?;
    let mut user = s.store.find_user_by_email(email.as_str()).await?.ok_or(AuthError::InvalidCredentials)?;
    let hash = user.password_hash.as_deref().ok_or(AuthError::NoPassword)?;
    verify_password(&r.password, hash)?;
    if !user.is_active { return Err(AuthError::Deactivated.into()); }
    user.record_login();
    s.store.update_user(&user).await?;
    Ok(ok_with_message("Login successful", session(&s, &user)))
}

async fn me(AuthUser(user): AuthUser) -> Json<Value> { ok(json!({ "user": user })) }

async fn update_profile(State(s): State<AppState>, AuthUser(caller): AuthUser, ValidJson(r): ValidJson<ProfileUpdate>) -> AppResult<Json<Value>> {
    let mut user = reload_user(&s, &caller).await?;
    if let Some(name) = r.name { user.name = name.trim().to_string(); }
    if let Some(phone) = r.phone { user.phone = phone.trim().to_string(); }
    if let Some(avatar) = r.avatar { user.avatar = avatar; }
    if let Some(address) = r.address { user.address = address; }
    user.touch();
    s.store.update_user(&user).await?;
    Ok(ok_with_message("Profile updated successfully", json!({ "user": user })))
}

async fn change_password(State(s): State<AppState>, AuthUser(caller): AuthUser, ValidJson(r): ValidJson<ChangePassword>) -> AppResult<Json<Value>> {
    let mut user = reload_user(&s, &caller).await?;
    let current = user.password_hash.as_deref().ok_or(AuthError::NoPassword)?;
    verify_password(&r.current_password, current).map_err(|_| AppError::BadRequest("Current password is incorrect".into()))?;
    user.password_hash = Some(hash_password(&r.new_password)?);
    user.touch();
    s.store.update_user(&user).await?;
    Ok(ok_message("Password updated successfully"))
}
