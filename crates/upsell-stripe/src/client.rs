//! # Stripe Client
//!
//! HTTP plumbing shared by every Stripe call: auth and version headers,
//! idempotency keys on writes, and mapping of Stripe error bodies onto
//! `PaymentError`.

use crate::config::StripeConfig;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};
use upsell_core::{
    AppliedDiscount, CheckoutOrder, CheckoutSession, CreditGrant, PaymentError, PaymentProvider,
    PaymentResult, PriceQuote, PurchasedItem,
};

pub(crate) const PROVIDER: &str = "stripe";
pub(crate) const PRICES_PATH: &str = "/v1/prices/";

/// REST client for the subset of the Stripe API the upsell flow uses
pub struct StripeClient {
    pub(crate) config: StripeConfig,
    client: Client,
}

impl StripeClient {
    /// Create a new client
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                PaymentError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// GET a Stripe resource
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> PaymentResult<T> {
        debug!("GET {}", path);

        let response = self
            .client
            .get(self.url(path))
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .query(query)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        read_response(path, response).await
    }

    /// POST a form-encoded body to Stripe
    pub(crate) async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: &str,
    ) -> PaymentResult<T> {
        debug!("POST {} ({} params)", path, form.len());

        let response = self
            .client
            .post(self.url(path))
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", idempotency_key)
            .form(form)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        read_response(path, response).await
    }
}

async fn read_response<T: DeserializeOwned>(path: &str, response: Response) -> PaymentResult<T> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let body = response
        .text()
        .await
        .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

    if !status.is_success() {
        error!("Stripe API error: path={}, status={}, body={}", path, status, body);
        return Err(map_api_error(path, status, retry_after, &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        PaymentError::Serialization(format!("Failed to parse Stripe response: {}", e))
    })
}

fn map_api_error(path: &str, status: StatusCode, retry_after: Option<u64>, body: &str) -> PaymentError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return PaymentError::RateLimited {
            provider: PROVIDER.to_string(),
            retry_after_secs: retry_after.unwrap_or(1),
        };
    }

    // only a missing price means the upsell itself is gone
    if status == StatusCode::NOT_FOUND {
        if let Some(price_id) = path.strip_prefix(PRICES_PATH) {
            return PaymentError::ProductNotFound {
                product_id: price_id.to_string(),
            };
        }
    }

    let message = serde_json::from_str::<StripeErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

    PaymentError::ProviderError {
        provider: PROVIDER.to_string(),
        message,
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn fetch_price(&self, price_id: &str) -> PaymentResult<PriceQuote> {
        self.retrieve_price(price_id).await
    }

    async fn create_checkout(&self, order: &CheckoutOrder) -> PaymentResult<CheckoutSession> {
        self.create_checkout_session(order).await
    }

    async fn find_customer_by_email(&self, email: &str) -> PaymentResult<Option<String>> {
        self.lookup_customer(email).await
    }

    async fn list_purchases(&self, customer_id: &str) -> PaymentResult<Vec<PurchasedItem>> {
        self.paid_line_items(customer_id).await
    }

    async fn create_one_time_discount(&self, grant: &CreditGrant) -> PaymentResult<AppliedDiscount> {
        self.mint_discount(grant).await
    }

    async fn revoke_discount(&self, discount: &AppliedDiscount) -> PaymentResult<()> {
        self.deactivate_promotion_code(&discount.promotion_code_id).await
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn is_test_mode(&self) -> bool {
        self.config.is_test_mode()
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

/// Stripe list envelope
#[derive(Debug, Deserialize)]
pub(crate) struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}
