//! # Order Types
//!
//! Checkout orders, provider price quotes, purchase history and the
//! sessions the provider hands back.

use crate::error::{PaymentError, PaymentResult};
use crate::product::{Currency, Price, Product};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Upper bound on the quantity of a single upsell line
pub const MAX_LINE_QUANTITY: u32 = 10;

/// A price as currently configured at the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Provider price id
    pub price_id: String,

    /// Unit amount in smallest currency unit
    pub unit_amount: i64,

    /// Currency
    pub currency: Currency,

    /// Recurring interval ("month", "year") when the price is a subscription
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring: Option<String>,

    /// Provider-side product the price belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,

    /// Provider-side product name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    /// Whether the provider will accept this price at checkout
    pub active: bool,
}

impl PriceQuote {
    pub fn price(&self) -> Price {
        Price::from_cents(self.unit_amount, self.currency)
    }

    pub fn is_recurring(&self) -> bool {
        self.recurring.is_some()
    }
}

/// One line of a checkout order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Catalog product id
    pub product_id: String,

    /// Provider price id
    pub price_id: String,

    /// Quantity
    pub quantity: u32,
}

impl OrderLine {
    /// Create a line from a catalog product, rejecting out-of-range quantities.
    ///
    /// Takes the quantity as sent by the caller so negative values are
    /// rejected here rather than at deserialization.
    pub fn from_product(product: &Product, quantity: i64) -> PaymentResult<Self> {
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| (1..=MAX_LINE_QUANTITY).contains(q))
            .ok_or_else(|| {
                PaymentError::InvalidRequest(format!(
                    "Quantity for {} must be between 1 and {}, got {}",
                    product.id, MAX_LINE_QUANTITY, quantity
                ))
            })?;

        Ok(Self {
            product_id: product.id.clone(),
            price_id: product.price_id.clone(),
            quantity,
        })
    }
}

/// Checkout mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// One-time payment
    Payment,
    /// Subscription
    Subscription,
}

impl Default for CheckoutMode {
    fn default() -> Self {
        CheckoutMode::Payment
    }
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

/// Bundle credit to turn into a discount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditGrant {
    pub customer_id: String,
    pub amount_off: i64,
    pub currency: Currency,
    /// Provider product the discount is restricted to
    pub product_id: String,
}

/// A single-use discount minted for a customer's bundle purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub coupon_id: String,
    pub promotion_code_id: String,
    /// Customer-facing code
    pub code: String,
    pub amount_off: i64,
    pub currency: Currency,
    /// The code stops redeeming after this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// An order to be checked out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOrder {
    /// Unique order ID (generated)
    pub id: String,

    /// Line items
    pub lines: Vec<OrderLine>,

    /// Checkout mode
    #[serde(default)]
    pub mode: CheckoutMode,

    /// Existing provider customer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    /// Customer email (prefill when no customer id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,

    /// Job posting the upsell belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_reference_id: Option<String>,

    /// Discount to apply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<AppliedDiscount>,

    /// Idempotency key (prevents duplicate sessions on retry)
    pub idempotency_key: String,

    pub success_url: String,
    pub cancel_url: String,

    /// Custom metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl CheckoutOrder {
    /// Create a new order with generated ID and idempotency key
    pub fn new(success_url: impl Into<String>, cancel_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            lines: Vec::new(),
            mode: CheckoutMode::Payment,
            customer_id: None,
            customer_email: None,
            client_reference_id: None,
            discount: None,
            idempotency_key: Uuid::new_v4().to_string(),
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a line, switching to subscription mode for recurring prices
    pub fn add_line(&mut self, line: OrderLine, quote: &PriceQuote) {
        if quote.is_recurring() {
            self.mode = CheckoutMode::Subscription;
        }
        self.lines.push(line);
    }

    /// Set customer id
    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Set customer email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    /// Check if order is empty
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get item count
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// A checkout session created by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID
    pub session_id: String,

    /// Hosted page to redirect the customer to
    pub url: String,

    /// When the session expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Customer ID (if known)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
}

/// A paid line from a customer's checkout history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasedItem {
    pub session_id: String,
    pub price_id: String,
    /// Amount actually paid for the line, after discounts
    pub amount_total: i64,
    pub currency: Currency,
    pub purchased_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(recurring: Option<&str>) -> PriceQuote {
        PriceQuote {
            price_id: "price_x".to_string(),
            unit_amount: 1500,
            currency: Currency::USD,
            recurring: recurring.map(String::from),
            product_id: None,
            product_name: None,
            active: true,
        }
    }

    #[test]
    fn test_line_quantity_bounds() {
        let product = Product::new("featured", "Featured", "price_featured");

        assert!(OrderLine::from_product(&product, 1).is_ok());
        assert!(OrderLine::from_product(&product, 10).is_ok());
        assert!(OrderLine::from_product(&product, 0).is_err());
        assert!(OrderLine::from_product(&product, 11).is_err());
        assert!(OrderLine::from_product(&product, -1).is_err());
        assert!(OrderLine::from_product(&product, i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_subscription_mode_detection() {
        let product = Product::new("featured", "Featured", "price_featured");
        let mut order = CheckoutOrder::new("https://jobs.test/ok", "https://jobs.test/cancel");

        order.add_line(OrderLine::from_product(&product, 1).unwrap(), &quote(None));
        assert_eq!(order.mode, CheckoutMode::Payment);

        order.add_line(OrderLine::from_product(&product, 2).unwrap(), &quote(Some("month")));
        assert_eq!(order.mode, CheckoutMode::Subscription);
        assert_eq!(order.item_count(), 3);
    }

    #[test]
    fn test_new_order_has_distinct_ids() {
        let a = CheckoutOrder::new("s", "c");
        let b = CheckoutOrder::new("s", "c");
        assert_ne!(a.id, b.id);
        assert_ne!(a.idempotency_key, b.idempotency_key);
        assert!(a.is_empty());
    }
}
