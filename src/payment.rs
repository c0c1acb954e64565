//! Demo card gateway ("MockPay").
//!
//! Cards whose number ends in `0000` are declined; everything else
//! succeeds after a short random delay.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

pub const GATEWAY_NAME: &str = "mock-pay";

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    #[validate(length(min = 13, max = 19, message = "Valid card number required"))]
    pub card_number: String,
    #[validate(length(min = 2, max = 100, message = "Cardholder name required"))]
    pub card_holder: String,
    #[validate(range(min = 1, max = 12, message = "Valid expiry month required"))]
    pub expiry_month: u8,
    #[validate(range(min = 24, max = 99, message = "Valid expiry year required"))]
    pub expiry_year: u8,
    #[validate(length(min = 3, max = 4, message = "Valid CVV required"))]
    pub cvv: String,
}

impl CardDetails {
    /// Card number without whitespace.
    pub fn digits(&self) -> String { self.card_number.chars().filter(|c| !c.is_whitespace()).collect() }

    pub fn last4(&self) -> String {
        let digits: Vec<char> = self.digits().chars().collect();
        digits[digits.len().saturating_sub(4)..].iter().collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand { Visa, Mastercard, Amex, Discover, Unknown }

impl CardBrand {
    pub fn detect(number: &str) -> Self {
        let digits: String = number.chars().filter(|c| !c.is_whitespace()).collect();
        let b = digits.as_bytes();
        match b {
            [b'4', ..] => Self::Visa,
            [b'5', b'1'..=b'5', ..] => Self::Mastercard,
            [b'3', b'4' | b'7', ..] => Self::Amex,
            [b'6', b'5', ..] => Self::Discover,
            _ if digits.starts_with("6011") => Self::Discover,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary { pub last4: String, pub brand: CardBrand, pub expiry_month: u8, pub expiry_year: u8 }

/// Successful authorisation returned to the client.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub transaction_id: String,
    pub status: &'static str,
    pub amount: Decimal,
    pub currency: &'static str,
    pub order_id: uuid::Uuid,
    pub gateway: &'static str,
    pub timestamp: DateTime<Utc>,
    pub card_details: CardSummary,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Payment declined by bank. Please try a different card.")]
pub struct Declined { pub transaction_id: String }

/// `MOCK_<unix millis>_<9 uppercase alphanumerics>`
pub fn transaction_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(9).map(|b| char::from(b).to_ascii_uppercase()).collect();
    format!("MOCK_{}_{}", now.timestamp_millis(), suffix)
}

#[derive(Clone, Debug)]
pub struct MockGateway { max_delay: Duration }

impl MockGateway {
    pub fn new(max_delay_ms: u64) -> Self { Self { max_delay: Duration::from_millis(max_delay_ms) } }

    fn latency(&self) -> Duration {
        let max = self.max_delay.as_millis() as u64;
        if max == 0 { return Duration::ZERO; }
        Duration::from_millis(rand::thread_rng().gen_range(max / 4..=max))
    }

    #[tracing::instrument(skip(self, card), fields(last4 = %card.last4()))]
    pub async fn charge(&self, order_id: uuid::Uuid, amount: Decimal, card: &CardDetails) -> Result<Charge, Declined> {
        tokio::time::sleep(self.latency()).await;
        let now = Utc::now();
        let transaction_id = transaction_id(now);
        let digits = card.digits();
        if digits.ends_with("0000") {
            tracing::info!(%transaction_id, "Mock payment declined");
            return Err(Declined { transaction_id });
        }
        tracing::info!(%transaction_id, %amount, "Mock payment authorised");
        Ok(Charge {
            transaction_id,
            status: "succeeded",
            amount,
            currency: "GBP",
            order_id,
            gateway: GATEWAY_NAME,
            timestamp: now,
            card_details: CardSummary { last4: card.last4(), brand: CardBrand::detect(&digits), expiry_month: card.expiry_month, expiry_year: card.expiry_year },
        })
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodInfo {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub enabled: bool,
    pub processing_time: &'static str,
    pub features: [&'static str; 4],
}

pub fn available_methods() -> Vec<PaymentMethodInfo> {
    vec![PaymentMethodInfo {
        id: "mock-card",
        name: "MockPay Credit/Debit Card",
        kind: "card",
        description: "Secure card payment via MockPay Gateway (Demo)",
        icon: "credit-card",
        enabled: true,
        processing_time: "2-3 seconds",
        features: ["Instant Processing", "Secure", "No API Key Required", "Demo Mode"],
    }]
}
