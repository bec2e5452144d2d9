//! # Stripe Checkout Sessions
//!
//! Creates hosted Checkout Sessions for upsell orders. Lines reference
//! existing Stripe prices; amounts are never sent from this side.

use crate::client::{StripeClient, PROVIDER};
use chrono::DateTime;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use upsell_core::{CheckoutOrder, CheckoutSession, PaymentError, PaymentResult};

impl StripeClient {
    /// Create a Checkout Session and return its id and hosted URL
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn create_checkout_session(
        &self,
        order: &CheckoutOrder,
    ) -> PaymentResult<CheckoutSession> {
        if order.is_empty() {
            return Err(PaymentError::InvalidRequest(
                "Order has no items".to_string(),
            ));
        }

        let form_params = build_checkout_form(order);

        debug!(
            "Creating Stripe checkout session: {} lines, mode={}",
            order.lines.len(),
            order.mode.as_str()
        );

        let session: StripeCheckoutSessionResponse = self
            .post_form("/v1/checkout/sessions", &form_params, &order.idempotency_key)
            .await?;

        let url = session.url.ok_or_else(|| PaymentError::ProviderError {
            provider: PROVIDER.to_string(),
            message: format!("Checkout session {} has no URL", session.id),
        })?;

        info!("Created Stripe checkout session: id={}, url={}", session.id, url);

        Ok(CheckoutSession {
            session_id: session.id,
            url,
            expires_at: session
                .expires_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            customer_id: session.customer,
        })
    }
}

/// Form parameters for `POST /v1/checkout/sessions`
pub(crate) fn build_checkout_form(order: &CheckoutOrder) -> Vec<(String, String)> {
    let mut form_params: Vec<(String, String)> = vec![
        ("mode".to_string(), order.mode.as_str().to_string()),
        ("success_url".to_string(), order.success_url.clone()),
        ("cancel_url".to_string(), order.cancel_url.clone()),
    ];

    for (i, line) in order.lines.iter().enumerate() {
        form_params.push((format!("line_items[{}][price]", i), line.price_id.clone()));
        form_params.push((format!("line_items[{}][quantity]", i), line.quantity.to_string()));
    }

    // Stripe rejects customer and customer_email together
    if let Some(ref customer) = order.customer_id {
        form_params.push(("customer".to_string(), customer.clone()));
    } else if let Some(ref email) = order.customer_email {
        form_params.push(("customer_email".to_string(), email.clone()));
    }

    if let Some(ref reference) = order.client_reference_id {
        form_params.push(("client_reference_id".to_string(), reference.clone()));
    }

    // discounts and allow_promotion_codes are mutually exclusive
    match order.discount {
        Some(ref discount) => form_params.push((
            "discounts[0][promotion_code]".to_string(),
            discount.promotion_code_id.clone(),
        )),
        None => form_params.push(("allow_promotion_codes".to_string(), "true".to_string())),
    }

    form_params.push(("metadata[order_id]".to_string(), order.id.clone()));
    for (key, value) in &order.metadata {
        form_params.push((format!("metadata[{}]", key), value.clone()));
    }

    form_params
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;
    use serde_json::json;
    use upsell_core::{AppliedDiscount, Currency, OrderLine, PriceQuote, Product};
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quote(price_id: &str, recurring: Option<&str>) -> PriceQuote {
        PriceQuote {
            price_id: price_id.to_string(),
            unit_amount: 4900,
            currency: Currency::USD,
            recurring: recurring.map(String::from),
            product_id: None,
            product_name: None,
            active: true,
        }
    }

    fn order() -> CheckoutOrder {
        let product = Product::new("featured", "Featured", "price_featured");
        let mut order = CheckoutOrder::new(
            "https://jobs.test/upsell/success?session_id={CHECKOUT_SESSION_ID}",
            "https://jobs.test/upsell/cancel",
        );
        order.add_line(OrderLine::from_product(&product, 2).unwrap(), &quote("price_featured", None));
        order
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_form_for_plain_order() {
        let mut order = order().with_email("buyer@corp.test");
        order.client_reference_id = Some("job_42".to_string());
        let form = build_checkout_form(&order);

        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "line_items[0][price]"), Some("price_featured"));
        assert_eq!(value(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(value(&form, "customer_email"), Some("buyer@corp.test"));
        assert_eq!(value(&form, "client_reference_id"), Some("job_42"));
        assert_eq!(value(&form, "allow_promotion_codes"), Some("true"));
        assert_eq!(value(&form, "metadata[order_id]"), Some(order.id.as_str()));
    }

    #[test]
    fn test_form_prefers_customer_over_email() {
        let order = order().with_customer("cus_1").with_email("buyer@corp.test");
        let form = build_checkout_form(&order);

        assert_eq!(value(&form, "customer"), Some("cus_1"));
        assert!(value(&form, "customer_email").is_none());
    }

    #[test]
    fn test_form_with_discount() {
        let mut order = order().with_customer("cus_1");
        order.discount = Some(AppliedDiscount {
            coupon_id: "coup_1".to_string(),
            promotion_code_id: "promo_1".to_string(),
            code: "BUNDLE-ABC".to_string(),
            amount_off: 2500,
            currency: Currency::USD,
            expires_at: None,
        });
        let form = build_checkout_form(&order);

        assert_eq!(value(&form, "discounts[0][promotion_code]"), Some("promo_1"));
        assert!(value(&form, "allow_promotion_codes").is_none());
    }

    #[test]
    fn test_form_subscription_mode() {
        let product = Product::new("alerts", "Alerts", "price_alerts");
        let mut order = CheckoutOrder::new("s", "c");
        order.add_line(OrderLine::from_product(&product, 1).unwrap(), &quote("price_alerts", Some("month")));

        assert_eq!(value(&build_checkout_form(&order), "mode"), Some("subscription"));
    }

    #[tokio::test]
    async fn test_create_checkout_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header_exists("Idempotency-Key"))
            .and(body_string_contains("price_featured"))
            .and(body_string_contains("mode=payment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1",
                "customer": null,
                "expires_at": 1_900_000_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            StripeClient::new(StripeConfig::new("sk_test_1").with_api_base_url(server.uri())).unwrap();
        let session = client.create_checkout_session(&order()).await.unwrap();

        assert_eq!(session.session_id, "cs_test_1");
        assert_eq!(session.url, "https://checkout.stripe.com/c/pay/cs_test_1");
        assert!(session.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let client = StripeClient::new(StripeConfig::new("sk_test_1")).unwrap();
        let err = client
            .create_checkout_session(&CheckoutOrder::new("s", "c"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }
}
