//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::aggregates::cart::Cart;
use crate::domain::value_objects::Email;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::User => "user", Self::Admin => "admin" }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("invalid role `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostalAddress { pub street: String, pub city: String, pub state: String, pub zip_code: String, pub country: String }

impl Default for PostalAddress {
    fn default() -> Self {
        Self { street: String::new(), city: String::new(), state: String::new(), zip_code: String::new(), country: "UK".into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SizePreferences { pub shirt: String, pub pants: String, pub shoes: String }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub newsletter: bool,
    pub notifications: bool,
    pub favorite_categories: Vec<String>,
    pub size_preferences: SizePreferences,
}

impl Default for Preferences {
    fn default() -> Self {
        Self { newsletter: true, notifications: true, favorite_categories: vec![], size_preferences: SizePreferences::default() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the server.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: PostalAddress,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub wishlist: Vec<Uuid>,
    #[serde(default)]
    pub cart: Cart,
    #[serde(default)]
    pub order_history: Vec<Uuid>,
    #[serde(default)]
    pub is_email_verified: bool,
    pub last_login: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn register(name: impl Into<String>, email: &Email, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), name: name.into().trim().to_string(), email: email.as_str().to_string(),
            password_hash: Some(password_hash), role: Role::User, avatar: String::new(), phone: String::new(),
            address: PostalAddress::default(), preferences: Preferences::default(), wishlist: vec![], cart: Cart::new(),
            order_history: vec![], is_email_verified: false, last_login: now, is_active: true, created_at: now, updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { self.email.split('@').next().unwrap_or_default() } else { &self.name }
    }

    pub fn has_wishlisted(&self, product: Uuid) -> bool { self.wishlist.contains(&product) }

    /// Returns `true` when the product is now on the wishlist.
    pub fn toggle_wishlist(&mut self, product: Uuid) -> bool {
        let added = if let Some(pos) = self.wishlist.iter().position(|p| *p == product) {
            self.wishlist.remove(pos);
            false
        } else {
            self.wishlist.push(product);
            true
        };
        self.touch();
        added
    }

    pub fn record_login(&mut self) { self.last_login = Utc::now(); self.touch(); }

    pub fn record_order(&mut self, order: Uuid) {
        self.order_history.push(order);
        self.cart.clear();
        self.touch();
    }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User { User::register("Sam", &Email::parse("sam@example.com").unwrap(), "hash".into()) }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["address"]["country"], "UK");
    }

    #[test]
    fn test_wishlist_toggle() {
        let mut u = user();
        let p = Uuid::new_v4();
        assert!(u.toggle_wishlist(p));
        assert!(u.has_wishlisted(p));
        assert!(!u.toggle_wishlist(p));
        assert!(u.wishlist.is_empty());
    }

    #[test]
    fn test_record_order_clears_cart() {
        let mut u = user();
        u.cart.add_item(Uuid::new_v4(), 1, "M", "Blue").unwrap();
        let order = Uuid::new_v4();
        u.record_order(order);
        assert!(u.cart.is_empty());
        assert_eq!(u.order_history, vec![order]);
    }
}
