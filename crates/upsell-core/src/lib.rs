//! # upsell-core
//!
//! Core types for the job-posting upsell checkout service.
//!
//! This crate provides:
//! - `ProductCatalog`: the fixed set of upsell products and bundle credit settings
//! - `TtlCache`: short-lived, single-flight cache for provider price lookups
//! - `compute_credit`: bundle credit from prior qualifying purchases
//! - `CheckoutOrder` and `CheckoutSession` for the checkout flow
//! - `PaymentProvider`: the trait the Stripe client implements
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use upsell_core::{CheckoutOrder, OrderLine, ProductCatalog, TtlCache};
//!
//! let product = catalog.get_active("featured")?;
//! let quote = cache
//!     .get_or_load(&product.price_id, || provider.fetch_price(&product.price_id))
//!     .await?;
//!
//! let mut order = CheckoutOrder::new(success_url, cancel_url);
//! order.add_line(OrderLine::from_product(product, 1)?, &quote);
//! let session = provider.create_checkout(&order).await?;
//! ```

pub mod cache;
pub mod credit;
pub mod error;
pub mod order;
pub mod product;
pub mod provider;

// Re-exports for convenience
pub use cache::{CacheStats, TtlCache, DEFAULT_PRICE_TTL};
pub use credit::{compute_credit, CreditComputation, CreditPolicy};
pub use error::{PaymentError, PaymentResult};
pub use order::{
    AppliedDiscount, CheckoutMode, CheckoutOrder, CheckoutSession, CreditGrant, OrderLine, PriceQuote,
    PurchasedItem, MAX_LINE_QUANTITY,
};
pub use product::{CreditSettings, Currency, Price, Product, ProductCatalog, MAX_LOOKBACK_DAYS};
pub use provider::{BoxedPaymentProvider, PaymentProvider};
