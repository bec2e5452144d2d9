//! # Errors
//!
//! `PaymentError` is shared by the catalog, the price cache, the Stripe
//! client and the HTTP layer. Each variant knows the status code the API
//! answers with, so handlers never match on variants themselves.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    /// Missing credentials, bad catalog, bundle credit not set up
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller sent something we will not forward to Stripe
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown catalog product, or a price Stripe does not know
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// The Stripe price behind a sellable product cannot be charged
    #[error("Invalid price: {message}")]
    InvalidPrice { message: String },

    #[error("Unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },

    /// Stripe answered with an error body
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Stripe could not be reached
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    /// Stripe answered with a body we could not read
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Transient Stripe-side failure; a later attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::NetworkError(_)
                | PaymentError::RateLimited { .. }
                | PaymentError::ProviderError { .. }
        )
    }

    /// HTTP status the API answers with.
    ///
    /// Request problems are 4xx. Anything wrong on the Stripe side,
    /// including a price that the catalog sells but Stripe refuses to
    /// charge, is a 502 or 503.
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::InvalidRequest(_) | PaymentError::UnsupportedCurrency { .. } => 400,
            PaymentError::ProductNotFound { .. } => 404,
            PaymentError::RateLimited { .. } => 429,
            PaymentError::Internal(_) => 500,
            PaymentError::InvalidPrice { .. }
            | PaymentError::ProviderError { .. }
            | PaymentError::Serialization(_) => 502,
            PaymentError::Configuration(_) | PaymentError::NetworkError(_) => 503,
        }
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;
