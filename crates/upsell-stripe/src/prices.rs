//! # Stripe Prices
//!
//! Retrieves a single price with its product expanded so the caller gets
//! amount, currency, recurrence and display name in one round trip.

use crate::client::{StripeClient, PRICES_PATH};
use serde::Deserialize;
use tracing::{info, instrument};
use upsell_core::{Currency, PaymentError, PaymentResult, PriceQuote};

impl StripeClient {
    /// Fetch the current definition of a price
    #[instrument(skip(self))]
    pub async fn retrieve_price(&self, price_id: &str) -> PaymentResult<PriceQuote> {
        if price_id.is_empty() || price_id.contains('/') {
            return Err(PaymentError::InvalidRequest(format!(
                "Invalid price id: {:?}",
                price_id
            )));
        }

        let path = format!("{}{}", PRICES_PATH, price_id);
        let price: StripePrice = self.get(&path, &[("expand[]", "product")]).await?;

        let quote = price.into_quote()?;
        info!(
            "Fetched price: id={}, amount={}, currency={}",
            quote.price_id,
            quote.unit_amount,
            quote.currency
        );
        Ok(quote)
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
    #[serde(default = "default_true")]
    active: bool,
    currency: String,
    #[serde(default)]
    unit_amount: Option<i64>,
    #[serde(default)]
    recurring: Option<StripeRecurring>,
    #[serde(default)]
    product: Option<StripeProductRef>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct StripeRecurring {
    interval: String,
}

/// `product` is an id unless expanded
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StripeProductRef {
    Expanded { id: String, name: String },
    Id(String),
}

impl StripePrice {
    fn into_quote(self) -> PaymentResult<PriceQuote> {
        let unit_amount = self.unit_amount.ok_or_else(|| PaymentError::InvalidPrice {
            message: format!("Price {} has no fixed unit amount", self.id),
        })?;
        let currency: Currency = self.currency.parse()?;

        let (product_id, product_name) = match self.product {
            Some(StripeProductRef::Expanded { id, name }) => (Some(id), Some(name)),
            Some(StripeProductRef::Id(id)) => (Some(id), None),
            None => (None, None),
        };

        Ok(PriceQuote {
            price_id: self.id,
            unit_amount,
            currency,
            recurring: self.recurring.map(|r| r.interval),
            product_id,
            product_name,
            active: self.active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> StripeClient {
        StripeClient::new(StripeConfig::new("sk_test_123").with_api_base_url(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_retrieve_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/prices/price_featured"))
            .and(query_param("expand[]", "product"))
            .and(header("Authorization", "Bearer sk_test_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "price_featured",
                "object": "price",
                "active": true,
                "currency": "usd",
                "unit_amount": 4900,
                "recurring": null,
                "product": { "id": "prod_1", "name": "Featured Listing" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let quote = client(&server).await.retrieve_price("price_featured").await.unwrap();

        assert_eq!(quote.unit_amount, 4900);
        assert_eq!(quote.currency, Currency::USD);
        assert_eq!(quote.product_id.as_deref(), Some("prod_1"));
        assert_eq!(quote.product_name.as_deref(), Some("Featured Listing"));
        assert!(!quote.is_recurring());
    }

    #[tokio::test]
    async fn test_retrieve_recurring_price_unexpanded_product() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/prices/price_sub"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "price_sub",
                "currency": "eur",
                "unit_amount": 1900,
                "recurring": { "interval": "month" },
                "product": "prod_2"
            })))
            .mount(&server)
            .await;

        let quote = client(&server).await.retrieve_price("price_sub").await.unwrap();

        assert_eq!(quote.currency, Currency::EUR);
        assert_eq!(quote.recurring.as_deref(), Some("month"));
        assert_eq!(quote.product_id.as_deref(), Some("prod_2"));
        assert!(quote.product_name.is_none());
    }

    #[tokio::test]
    async fn test_price_without_amount_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/prices/price_custom"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "price_custom",
                "currency": "usd",
                "unit_amount": null
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.retrieve_price("price_custom").await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidPrice { .. }));
    }

    #[tokio::test]
    async fn test_missing_price_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/prices/price_gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "message": "No such price: 'price_gone'", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.retrieve_price("price_gone").await.unwrap_err();
        assert!(matches!(err, PaymentError::ProductNotFound { .. }));
    }

    #[tokio::test]
    async fn test_rejects_path_like_price_id() {
        let server = MockServer::start().await;
        let err = client(&server).await.retrieve_price("../customers").await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }
}
