//! # Payment Provider Trait
//!
//! The seam between the HTTP layer and the external payments API.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PaymentProvider (trait)                    │
//! │  ├── fetch_price()                                          │
//! │  ├── create_checkout()                                      │
//! │  ├── find_customer_by_email()                               │
//! │  ├── list_purchases()                                       │
//! │  ├── create_one_time_discount()                             │
//! │  └── revoke_discount()                                      │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!              ┌─────────────┴─────────────┐
//!      ┌───────┴───────┐           ┌───────┴───────┐
//!      │ StripeClient  │           │ test doubles  │
//!      └───────────────┘           └───────────────┘
//! ```

use crate::error::PaymentResult;
use crate::order::{
    AppliedDiscount, CheckoutOrder, CheckoutSession, CreditGrant, PriceQuote, PurchasedItem,
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Look up the current amount and currency of a price.
    async fn fetch_price(&self, price_id: &str) -> PaymentResult<PriceQuote>;

    /// Create a hosted checkout session for the order.
    async fn create_checkout(&self, order: &CheckoutOrder) -> PaymentResult<CheckoutSession>;

    /// Resolve a customer id from an email address.
    async fn find_customer_by_email(&self, email: &str) -> PaymentResult<Option<String>>;

    /// Paid line items from the customer's completed checkout sessions.
    async fn list_purchases(&self, customer_id: &str) -> PaymentResult<Vec<PurchasedItem>>;

    /// Single-use, short-lived discount for the grant's product, redeemable
    /// only by the grant's customer. An unredeemed code already issued for
    /// the same grant is returned instead of minting another.
    async fn create_one_time_discount(&self, grant: &CreditGrant) -> PaymentResult<AppliedDiscount>;

    /// Stop a discount from being redeemed.
    async fn revoke_discount(&self, discount: &AppliedDiscount) -> PaymentResult<()>;

    /// Provider name (for logging and diagnostics).
    fn provider_name(&self) -> &'static str;

    /// Whether the provider is running against a sandbox account.
    fn is_test_mode(&self) -> bool {
        false
    }
}

/// Shared, dynamically dispatched provider
pub type BoxedPaymentProvider = Arc<dyn PaymentProvider>;
