//! # upsell-stripe
//!
//! Stripe REST client for the upsell checkout service.
//!
//! `StripeClient` implements `upsell_core::PaymentProvider` using plain
//! form-encoded calls to:
//!
//! - `GET  /v1/prices/{id}`: current amount and currency of an upsell
//! - `POST /v1/checkout/sessions`: hosted checkout for the chosen upsells
//! - `GET  /v1/customers`: resolve a customer by email
//! - `GET  /v1/checkout/sessions` and `.../line_items`: purchase history
//! - `POST /v1/coupons`, `POST /v1/promotion_codes`: one-time bundle credit
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use upsell_core::PaymentProvider;
//! use upsell_stripe::StripeClient;
//!
//! let stripe = StripeClient::from_env()?;
//! let quote = stripe.fetch_price("price_featured").await?;
//! let session = stripe.create_checkout(&order).await?;
//! // Redirect user to session.url
//! ```

pub mod checkout;
pub mod client;
pub mod config;
pub mod customers;
pub mod discounts;
pub mod prices;

// Re-exports
pub use client::StripeClient;
pub use config::StripeConfig;
