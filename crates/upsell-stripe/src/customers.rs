//! # Customers & Purchase History
//!
//! Resolves customers by email and walks their completed Checkout
//! Sessions to collect the line items they actually paid for.

use crate::client::{StripeClient, StripeList};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use upsell_core::{Currency, PaymentResult, PurchasedItem};

/// Upper bound on pages fetched from any one list endpoint
const MAX_PAGES: usize = 10;
const PAGE_SIZE: &str = "100";

impl StripeClient {
    /// Most recent customer with this email, if any
    #[instrument(skip(self, email))]
    pub async fn lookup_customer(&self, email: &str) -> PaymentResult<Option<String>> {
        let customers: StripeList<StripeCustomer> = self
            .get("/v1/customers", &[("email", email), ("limit", "1")])
            .await?;

        let id = customers.data.into_iter().next().map(|c| c.id);
        debug!("Customer lookup: found={}", id.is_some());
        Ok(id)
    }

    /// Paid line items across the customer's completed sessions
    #[instrument(skip(self))]
    pub async fn paid_line_items(&self, customer_id: &str) -> PaymentResult<Vec<PurchasedItem>> {
        let sessions = self.completed_sessions(customer_id).await?;
        let mut purchases = Vec::new();

        for session in sessions.iter().filter(|s| s.payment_status == "paid") {
            let purchased_at =
                DateTime::from_timestamp(session.created, 0).unwrap_or_else(Utc::now);

            for item in self.session_line_items(&session.id).await? {
                let Some(price) = item.price else {
                    continue;
                };
                let currency = match item.currency.parse::<Currency>() {
                    Ok(c) => c,
                    Err(_) => {
                        warn!("Skipping line item in unsupported currency: {}", item.currency);
                        continue;
                    }
                };

                purchases.push(PurchasedItem {
                    session_id: session.id.clone(),
                    price_id: price.id,
                    amount_total: item.amount_total,
                    currency,
                    purchased_at,
                });
            }
        }

        info!(
            "Loaded purchase history: {} sessions, {} paid items",
            sessions.len(),
            purchases.len()
        );
        Ok(purchases)
    }

    async fn completed_sessions(&self, customer_id: &str) -> PaymentResult<Vec<StripeSession>> {
        let mut sessions = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut query = vec![
                ("customer", customer_id),
                ("status", "complete"),
                ("limit", PAGE_SIZE),
            ];
            if let Some(ref after) = cursor {
                query.push(("starting_after", after.as_str()));
            }

            let page: StripeList<StripeSession> = self.get("/v1/checkout/sessions", &query).await?;
            cursor = page.data.last().map(|s| s.id.clone());
            let has_more = page.has_more;
            sessions.extend(page.data);

            if !has_more || cursor.is_none() {
                return Ok(sessions);
            }
        }

        warn!(
            "Session history for {} truncated at {} pages",
            customer_id, MAX_PAGES
        );
        Ok(sessions)
    }

    async fn session_line_items(&self, session_id: &str) -> PaymentResult<Vec<StripeLineItem>> {
        let path = format!("/v1/checkout/sessions/{}/line_items", session_id);
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut query = vec![("limit", PAGE_SIZE)];
            if let Some(ref after) = cursor {
                query.push(("starting_after", after.as_str()));
            }

            let page: StripeList<StripeLineItem> = self.get(&path, &query).await?;
            cursor = page.data.last().map(|i| i.id.clone());
            let has_more = page.has_more;
            items.extend(page.data);

            if !has_more || cursor.is_none() {
                break;
            }
        }

        Ok(items)
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    created: i64,
    #[serde(default)]
    payment_status: String,
}

#[derive(Debug, Deserialize)]
struct StripeLineItem {
    id: String,
    #[serde(default)]
    amount_total: i64,
    currency: String,
    #[serde(default)]
    price: Option<StripeLinePrice>,
}

#[derive(Debug, Deserialize)]
struct StripeLinePrice {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> StripeClient {
        StripeClient::new(StripeConfig::new("sk_test_123").with_api_base_url(server.uri())).unwrap()
    }

    fn line(id: &str, price: &str, amount: i64, currency: &str) -> serde_json::Value {
        json!({
            "id": id,
            "object": "item",
            "amount_total": amount,
            "currency": currency,
            "quantity": 1,
            "price": { "id": price, "unit_amount": amount }
        })
    }

    #[tokio::test]
    async fn test_lookup_customer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/customers"))
            .and(query_param("email", "hr@acme.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{ "id": "cus_acme" }],
                "has_more": false
            })))
            .mount(&server)
            .await;

        let found = client(&server).await.lookup_customer("hr@acme.test").await.unwrap();
        assert_eq!(found.as_deref(), Some("cus_acme"));
    }

    #[tokio::test]
    async fn test_lookup_unknown_customer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list", "data": [], "has_more": false
            })))
            .mount(&server)
            .await;

        let found = client(&server).await.lookup_customer("nobody@x.test").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_paid_line_items_paginates_and_filters() {
        let server = MockServer::start().await;

        // first page of sessions
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions"))
            .and(query_param("customer", "cus_acme"))
            .and(query_param("status", "complete"))
            .and(query_param("starting_after", "cs_2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "cs_3", "created": 1_700_000_300, "payment_status": "paid" }],
                "has_more": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions"))
            .and(query_param("customer", "cus_acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "id": "cs_1", "created": 1_700_000_100, "payment_status": "paid" },
                    { "id": "cs_2", "created": 1_700_000_200, "payment_status": "unpaid" }
                ],
                "has_more": true
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_1/line_items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    line("li_1", "price_featured", 4900, "usd"),
                    line("li_2", "price_urgent", 1900, "zzz")
                ],
                "has_more": false
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_2/line_items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [line("li_x", "price_featured", 4900, "usd")],
                "has_more": false
            })))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_3/line_items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [line("li_3", "price_urgent", 1500, "usd")],
                "has_more": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = client(&server).await.paid_line_items("cus_acme").await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].session_id, "cs_1");
        assert_eq!(items[0].price_id, "price_featured");
        assert_eq!(items[0].amount_total, 4900);
        assert_eq!(items[1].session_id, "cs_3");
        assert_eq!(items[1].amount_total, 1500);
        assert_eq!(items[1].purchased_at.timestamp(), 1_700_000_300);
    }

    #[tokio::test]
    async fn test_session_history_stops_after_page_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "cs_loop", "created": 1_700_000_000, "payment_status": "paid" }],
                "has_more": true
            })))
            .expect(10)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_loop/line_items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [line("li_1", "price_featured", 4900, "usd")],
                "has_more": false
            })))
            .mount(&server)
            .await;

        let items = client(&server).await.paid_line_items("cus_acme").await.unwrap();

        // one paid item per fetched page, nothing past the tenth
        assert_eq!(items.len(), 10);
    }
}
