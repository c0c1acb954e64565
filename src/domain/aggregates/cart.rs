//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{round_money, Pricing, PricingPolicy};

pub const MAX_LINE_QUANTITY: u32 = 10;

/// Shopping cart embedded in the user document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product: Uuid,
    pub quantity: u32,
    pub size: String,
    pub color: String,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    fn matches(&self, product: Uuid, size: &str, color: &str) -> bool {
        self.product == product && self.size == size && self.color == color
    }
}

impl Cart {
    pub fn new() -> Self { Self::default() }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line_count(&self) -> usize { self.lines.len() }
    pub fn total_quantity(&self) -> u32 { self.lines.iter().map(|l| l.quantity).sum() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// Lines for the same product, size and colour are merged.
    pub fn add_item(&mut self, product: Uuid, quantity: u32, size: &str, color: &str) -> Result<(), CartError> {
        if quantity == 0 || quantity > MAX_LINE_QUANTITY { return Err(CartError::InvalidQuantity); }
        if let Some(existing) = self.lines.iter_mut().find(|l| l.matches(product, size, color)) {
            existing.quantity += quantity;
        } else {
            self.lines.push(CartLine { product, quantity, size: size.to_string(), color: color.to_string(), added_at: Utc::now() });
        }
        Ok(())
    }

    /// Setting a quantity of zero removes the line.
    pub fn update_quantity(&mut self, product: Uuid, size: &str, color: &str, quantity: u32) -> Result<(), CartError> {
        if quantity > MAX_LINE_QUANTITY { return Err(CartError::InvalidQuantity); }
        let idx = self.lines.iter().position(|l| l.matches(product, size, color)).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 { self.lines.remove(idx); } else { self.lines[idx].quantity = quantity; }
        Ok(())
    }

    pub fn remove_item(&mut self, product: Uuid, size: &str, color: &str) {
        self.lines.retain(|l| !l.matches(product, size, color));
    }

    pub fn clear(&mut self) { self.lines.clear(); }

    /// Price every line whose product is still on sale. Lines pointing at
    /// missing or inactive products are skipped.
    pub fn price(&self, products: &[Product], policy: &PricingPolicy) -> PricedCart {
        let items: Vec<PricedLine> = self
            .lines
            .iter()
            .filter_map(|line| {
                let product = products.iter().find(|p| p.id == line.product && p.is_active)?;
                let unit_price = product.price_for(&line.color, &line.size);
                Some(PricedLine {
                    line: line.clone(),
                    title: product.title.clone(),
                    slug: product.slug.clone(),
                    image: product.image_for(&line.color),
                    unit_price,
                    total_price: round_money(unit_price * Decimal::from(line.quantity)),
                    in_stock: product.stock_of(&line.color, &line.size) >= line.quantity,
                })
            })
            .collect();
        let subtotal = items.iter().map(|i| i.total_price).sum();
        let pricing = policy.quote(subtotal, Decimal::ZERO, None, false);
        let summary = CartSummary {
            item_count: items.len(),
            total_items: items.iter().map(|i| i.line.quantity).sum(),
            pricing,
        };
        PricedCart { items, summary }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    #[serde(flatten)]
    pub line: CartLine,
    pub title: String,
    pub slug: String,
    pub image: String,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub in_stock: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    #[serde(flatten)]
    pub pricing: Pricing,
    pub item_count: usize,
    pub total_items: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PricedCart {
    pub items: Vec<PricedLine>,
    pub summary: CartSummary,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
    #[error("Quantity must be between 1 and 10")]
    InvalidQuantity,
}
