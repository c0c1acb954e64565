//! Value objects for the storefront domain

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const MAX_SLUG_LEN: usize = 50;

/// URL handle derived from a product title.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Lowercases, collapses every run of non-alphanumerics into `-`,
    /// trims leading/trailing dashes and caps the result at 50 chars.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(title.len());
        let mut pending_dash = false;
        for ch in title.chars().flat_map(char::to_lowercase) {
            if ch.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() { out.push('-'); }
                pending_dash = false;
                out.push(ch);
            } else {
                pending_dash = true;
            }
        }
        out.truncate(MAX_SLUG_LEN);
        let trimmed = out.trim_matches('-');
        if trimmed.is_empty() { return Err(SlugError::Empty); }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("title does not contain any characters usable in a slug")]
    Empty,
}

/// Normalised (trimmed, lowercased) email address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(value: &str) -> Result<Self, EmailError> {
        let value = value.trim().to_lowercase();
        let (local, domain) = value.split_once('@').ok_or(EmailError::Invalid)?;
        if local.is_empty() || domain.len() < 3 || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(EmailError::Invalid);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("please enter a valid email")]
    Invalid,
}

/// Round a monetary amount to pence, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Breakdown of what a basket or an order costs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    #[serde(default)]
    pub gift_wrap: Decimal,
    pub total: Decimal,
}

/// Tax, shipping and gift-wrap rules shared by the cart and checkout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingPolicy {
    pub tax_rate: Decimal,
    pub free_shipping_threshold: Decimal,
    pub flat_shipping: Decimal,
    pub gift_wrap_cost: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 2),
            free_shipping_threshold: Decimal::new(50, 0),
            flat_shipping: Decimal::new(5, 0),
            gift_wrap_cost: Decimal::new(250, 2),
        }
    }
}

impl PricingPolicy {
    /// Shipping charged when the customer did not pick a paid method.
    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal > self.free_shipping_threshold { Decimal::ZERO } else { self.flat_shipping }
    }

    /// Price a basket. `discount` is clamped into `0..=subtotal`;
    /// `shipping_override` replaces the threshold rule when present.
    pub fn quote(&self, subtotal: Decimal, discount: Decimal, shipping_override: Option<Decimal>, gift_wrap: bool) -> Pricing {
        let subtotal = round_money(subtotal);
        let discount = round_money(discount.max(Decimal::ZERO).min(subtotal));
        let tax = round_money((subtotal - discount) * self.tax_rate);
        let shipping = round_money(shipping_override.unwrap_or_else(|| self.shipping_for(subtotal)));
        let gift_wrap = if gift_wrap { self.gift_wrap_cost } else { Decimal::ZERO };
        let total = round_money(subtotal - discount + tax + shipping + gift_wrap);
        Pricing { subtotal, discount, tax, shipping, gift_wrap, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        let slug = Slug::from_title("  Classic Oxford Shirt -- Blue!  ").unwrap();
        assert_eq!(slug.as_str(), "classic-oxford-shirt-blue");
        assert!(Slug::from_title("!!!").is_err());
    }

    #[test]
    fn test_slug_truncates() {
        let slug = Slug::from_title(&"a".repeat(80)).unwrap();
        assert_eq!(slug.as_str().len(), 50);
        let slug = Slug::from_title(&format!("{} b", "a".repeat(49))).unwrap();
        assert!(!slug.as_str().ends_with('-'));
    }

    #[test]
    fn test_email() {
        assert_eq!(Email::parse(" Tom@Example.COM ").unwrap().as_str(), "tom@example.com");
        assert!(Email::parse("nope").is_err());
        assert!(Email::parse("a@b").is_err());
    }

    #[test]
    fn test_quote_applies_free_shipping_threshold() {
        let policy = PricingPolicy::default();
        let small = policy.quote(Decimal::new(20, 0), Decimal::ZERO, None, false);
        assert_eq!(small.shipping, Decimal::new(5, 0));
        assert_eq!(small.tax, Decimal::new(360, 2));
        assert_eq!(small.total, Decimal::new(2860, 2));

        let large = policy.quote(Decimal::new(100, 0), Decimal::new(10, 0), None, true);
        assert_eq!(large.shipping, Decimal::ZERO);
        assert_eq!(large.tax, Decimal::new(1620, 2));
        assert_eq!(large.total, Decimal::new(10870, 2));
    }

    #[test]
    fn test_quote_clamps_discount() {
        let quote = PricingPolicy::default().quote(Decimal::new(10, 0), Decimal::new(50, 0), Some(Decimal::ZERO), false);
        assert_eq!(quote.discount, Decimal::new(10, 0));
        assert_eq!(quote.total, Decimal::ZERO);
    }
}
