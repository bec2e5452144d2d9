//! # upsell-api
//!
//! HTTP API layer for upsell-checkout.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Cached price lookups for the upsell products
//! - Checkout sessions, including the bundle with prior-purchase credit
//! - Health, diagnostics and the embeddable logo carousel
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/diagnostics` | Runtime details |
//! | GET | `/widget` | Logo carousel fragment |
//! | GET | `/api/v1/prices` | List prices |
//! | GET | `/api/v1/prices/{product_id}` | Get price |
//! | POST | `/api/v1/checkout` | Create checkout session |
//! | GET | `/api/v1/credit` | Preview bundle credit |
//! | POST | `/api/v1/checkout/bundle` | Bundle checkout with credit |

pub mod bundle;
pub mod config;
pub mod cors;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod widget;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, LogFormat};
pub use routes::create_router;
pub use state::AppState;
