//! # Bundle Checkout
//!
//! Credit preview and the discounted bundle checkout.
//!
//! ```text
//! customer_id | email ──► resolve customer ──► list paid purchases
//!                                                  │
//!                              compute_credit ◄────┘
//!                                    │ credit > 0
//!                                    ▼
//!          one-time coupon + promotion code (or the unredeemed one)
//!                                    │
//!                                    ▼
//!                         bundle checkout session
//!                                    │ fails
//!                                    ▼
//!                          promotion code revoked
//! ```

use crate::handlers::{
    apply_common, checkout_reply, json_rejection_to_response, payment_error_to_response,
    validate_email, ApiError, RedirectQuery,
};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Response,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};
use upsell_core::{
    compute_credit, AppliedDiscount, CheckoutOrder, CreditComputation, CreditGrant, CreditPolicy, OrderLine,
    PaymentError, PaymentResult, PriceQuote, Product,
};

/// Who to compute credit for
#[derive(Debug, Default, Deserialize)]
pub struct CreditQuery {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Credit preview
#[derive(Debug, Serialize)]
pub struct CreditPreview {
    /// Resolved provider customer, absent for unknown emails
    pub customer_id: Option<String>,
    pub bundle: String,
    pub bundle_price: i64,
    pub currency: String,
    #[serde(flatten)]
    pub credit: CreditComputation,
    pub amount_due: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct BundleCheckoutRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct BundleCheckoutResponse {
    pub session_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// Discount on the bundle in smallest currency unit
    pub credit_applied: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_code_expires_at: Option<String>,
    pub amount_due: i64,
}

/// Credit assessment for one customer
struct Assessment<'a> {
    customer_id: Option<String>,
    bundle: &'a Product,
    quote: PriceQuote,
    credit: CreditComputation,
}

impl Assessment<'_> {
    fn amount_due(&self) -> i64 {
        (self.quote.unit_amount - self.credit.credit).max(0)
    }
}

async fn resolve_customer(
    state: &AppState,
    customer_id: Option<&str>,
    email: Option<&str>,
) -> PaymentResult<Option<String>> {
    match (
        customer_id.filter(|c| !c.is_empty()),
        email.filter(|e| !e.is_empty()),
    ) {
        (Some(id), _) => Ok(Some(id.to_string())),
        (None, Some(email)) => state.provider.find_customer_by_email(email).await,
        (None, None) => Err(PaymentError::InvalidRequest(
            "customer_id or customer email is required".to_string(),
        )),
    }
}

async fn assess<'a>(
    state: &'a AppState,
    customer_id: Option<&str>,
    email: Option<&str>,
) -> PaymentResult<Assessment<'a>> {
    if let Some(email) = email.filter(|e| !e.is_empty()) {
        validate_email(email)?;
    }
    let customer_id = resolve_customer(state, customer_id, email).await?;
    let (bundle, settings) = state.catalog.bundle()?;
    let quote = state.purchasable_quote(bundle).await?;

    let credit = match customer_id.as_deref() {
        Some(customer) => {
            let purchases = state.provider.list_purchases(customer).await?;
            let policy = CreditPolicy::from_settings(
                settings,
                state.catalog.eligible_price_ids(),
                quote.currency,
                Utc::now(),
            );
            compute_credit(&policy, &purchases, quote.unit_amount)
        }
        None => CreditComputation::none(),
    };

    Ok(Assessment {
        customer_id,
        bundle,
        quote,
        credit,
    })
}

/// Preview the bundle credit without minting anything
#[instrument(skip(state))]
pub async fn preview_credit(
    State(state): State<AppState>,
    Query(query): Query<CreditQuery>,
) -> Result<Json<CreditPreview>, ApiError> {
    let assessment = assess(&state, query.customer_id.as_deref(), query.email.as_deref())
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(CreditPreview {
        amount_due: assessment.amount_due(),
        customer_id: assessment.customer_id,
        bundle: assessment.bundle.id.clone(),
        bundle_price: assessment.quote.unit_amount,
        currency: assessment.quote.currency.as_str().to_string(),
        credit: assessment.credit,
    }))
}

/// Bundle checkout with prior upsell spend applied as a one-time discount
#[instrument(skip(state, payload))]
pub async fn create_bundle_checkout(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
    payload: Result<Json<BundleCheckoutRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(json_rejection_to_response)?;
    let (order, credit_applied, amount_due) = build_bundle_order(&state, request)
        .await
        .map_err(payment_error_to_response)?;

    let session = match state.provider.create_checkout(&order).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create bundle checkout: {}", e);
            if let Some(ref discount) = order.discount {
                revoke_unused(&state, discount).await;
            }
            return Err(payment_error_to_response(e));
        }
    };

    let promotion_code = order.discount.as_ref().map(|d| d.code.clone());
    let promotion_code_expires_at = order
        .discount
        .as_ref()
        .and_then(|d| d.expires_at)
        .map(|t| t.to_rfc3339());

    info!(
        "Created bundle session {} (credit {}, due {})",
        session.session_id, credit_applied, amount_due
    );

    let url = session.url.clone();
    Ok(checkout_reply(
        query.redirect,
        &url,
        BundleCheckoutResponse {
            session_id: session.session_id,
            url: session.url,
            expires_at: session.expires_at.map(|t| t.to_rfc3339()),
            credit_applied,
            promotion_code,
            promotion_code_expires_at,
            amount_due,
        },
    ))
}

/// Deactivate a code whose checkout never got created
async fn revoke_unused(state: &AppState, discount: &AppliedDiscount) {
    match state.provider.revoke_discount(discount).await {
        Ok(()) => info!("Revoked unused promotion code {}", discount.promotion_code_id),
        // still single use and expiring, so nothing else to do
        Err(e) => warn!(
            "Failed to revoke promotion code {}: {}",
            discount.promotion_code_id, e
        ),
    }
}

async fn build_bundle_order(
    state: &AppState,
    request: BundleCheckoutRequest,
) -> PaymentResult<(CheckoutOrder, i64, i64)> {
    let assessment = assess(
        state,
        request.customer_id.as_deref(),
        request.customer_email.as_deref(),
    )
    .await?;

    let mut order = CheckoutOrder::new(
        state.config.success_url_with_session(),
        state.config.cancel_url.clone(),
    );
    apply_common(
        &mut order,
        assessment.customer_id.clone(),
        request.customer_email,
        request.job_id,
        request.metadata,
    )?;

    order.add_line(OrderLine::from_product(assessment.bundle, 1)?, &assessment.quote);
    order
        .metadata
        .insert("products".to_string(), assessment.bundle.id.clone());

    let mut credit_applied = 0;
    if let (true, Some(customer)) = (assessment.credit.has_credit(), assessment.customer_id.as_deref()) {
        let product_id = assessment.quote.product_id.clone().ok_or_else(|| {
            PaymentError::InvalidPrice {
                message: format!(
                    "Bundle price {} is not attached to a product",
                    assessment.quote.price_id
                ),
            }
        })?;
        let grant = CreditGrant {
            customer_id: customer.to_string(),
            amount_off: assessment.credit.credit,
            currency: assessment.quote.currency,
            product_id,
        };
        let discount = state.provider.create_one_time_discount(&grant).await?;
        info!(
            "Promotion code {} for {} ({} off)",
            discount.code, customer, discount.amount_off
        );
        credit_applied = discount.amount_off;
        order
            .metadata
            .insert("bundle_credit".to_string(), credit_applied.to_string());
        order.discount = Some(discount);
    }

    let amount_due = (assessment.quote.unit_amount - credit_applied).max(0);
    Ok((order, credit_applied, amount_due))
}
