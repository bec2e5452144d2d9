//! # Request Handlers
//!
//! Axum request handlers for prices, checkout and service information.

use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, instrument};
use upsell_core::{
    CheckoutOrder, CheckoutSession, OrderLine, PaymentError, PaymentResult, PriceQuote, Product,
};

/// Metadata keys the service sets itself
const RESERVED_METADATA: &[&str] = &["order_id", "job_id", "products", "bundle_credit"];
const MAX_METADATA_ENTRIES: usize = 20;
const MAX_METADATA_KEY_LEN: usize = 40;
const MAX_METADATA_VALUE_LEN: usize = 500;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create checkout request
#[derive(Debug, Default, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Items to purchase
    #[serde(default)]
    pub items: Vec<CheckoutItem>,
    /// Convenience: product ids bought once each
    #[serde(default)]
    pub product_ids: Vec<String>,
    /// Existing provider customer (optional)
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Customer email (optional)
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Job posting being upsold
    #[serde(default)]
    pub job_id: Option<String>,
    /// Custom metadata passed through to the session
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Item in checkout request
#[derive(Debug, Deserialize)]
pub struct CheckoutItem {
    /// Product ID
    pub product_id: String,
    /// Quantity, range-checked when the order is built
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// `?redirect=true` answers with a 303 to the hosted page
#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    #[serde(default)]
    pub redirect: bool,
}

/// Create checkout response
#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    /// Session ID
    pub session_id: String,
    /// Checkout URL (redirect user here)
    pub url: String,
    /// Session expiration time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl From<CheckoutSession> for CreateCheckoutResponse {
    fn from(session: CheckoutSession) -> Self {
        Self {
            session_id: session.session_id,
            url: session.url,
            expires_at: session.expires_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Price of one upsell product
#[derive(Debug, Serialize)]
pub struct PriceView {
    pub product_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub price_id: String,
    pub unit_amount: i64,
    pub currency: String,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring: Option<String>,
}

impl PriceView {
    pub fn new(product: &Product, quote: &PriceQuote) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            price_id: quote.price_id.clone(),
            unit_amount: quote.unit_amount,
            currency: quote.currency.as_str().to_string(),
            display: quote.price().display(),
            recurring: quote.recurring.clone(),
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn payment_error_to_response(err: PaymentError) -> ApiError {
    let code = err.status_code();
    let mut response = ErrorResponse::new(err.to_string(), code);
    if let PaymentError::RateLimited {
        retry_after_secs, ..
    } = err
    {
        response = response.with_details(format!("retry after {}s", retry_after_secs));
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

/// Malformed or mistyped JSON bodies are plain bad requests
pub(crate) fn json_rejection_to_response(rejection: JsonRejection) -> ApiError {
    let response = ErrorResponse::new("Invalid request body", StatusCode::BAD_REQUEST.as_u16())
        .with_details(rejection.body_text());
    (StatusCode::BAD_REQUEST, Json(response))
}

/// JSON body or a 303 to the hosted checkout page
pub(crate) fn checkout_reply<T: Serialize>(redirect: bool, url: &str, body: T) -> Response {
    if redirect {
        Redirect::to(url).into_response()
    } else {
        Json(body).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "upsell-checkout",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Runtime diagnostics
pub async fn diagnostics(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = Utc::now() - state.started_at;
    let cache = state.prices.stats().await;
    let bundle = state.catalog.credit.as_ref().map(|c| c.bundle.clone());
    let products: Vec<_> = state.catalog.active_products().map(|p| p.id.as_str()).collect();

    Json(serde_json::json!({
        "service": "upsell-checkout",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime.num_seconds(),
        "provider": {
            "name": state.provider.provider_name(),
            "test_mode": state.provider.is_test_mode(),
        },
        "catalog": {
            "products": products,
            "bundle": bundle,
        },
        "price_cache": cache,
        "cors": {
            "allowed_origins": state.config.allowed_origins,
            "permissive": state.config.allowed_origins.is_empty() && !state.config.is_production(),
        },
    }))
}

/// Prices for every active upsell product
#[instrument(skip(state))]
pub async fn list_prices(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mut prices = Vec::new();

    for product in state.catalog.active_products() {
        let quote = state.quote(product).await.map_err(|e| {
            error!("Price lookup failed for {}: {}", product.id, e);
            payment_error_to_response(e)
        })?;
        prices.push(PriceView::new(product, &quote));
    }

    Ok(Json(serde_json::json!({
        "count": prices.len(),
        "prices": prices,
    })))
}

/// Price of a single upsell product
#[instrument(skip(state))]
pub async fn get_price(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<PriceView>, ApiError> {
    let product = state
        .catalog
        .get_active(&product_id)
        .map_err(payment_error_to_response)?;

    let quote = state.quote(product).await.map_err(payment_error_to_response)?;

    Ok(Json(PriceView::new(product, &quote)))
}

/// Create a checkout session for the requested upsells
#[instrument(skip(state, payload))]
pub async fn create_checkout(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
    payload: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(json_rejection_to_response)?;
    let order = build_order(&state, request)
        .await
        .map_err(payment_error_to_response)?;

    info!(
        "Creating checkout: order={}, {} items, job={:?}",
        order.id,
        order.item_count(),
        order.client_reference_id
    );

    let session = state.provider.create_checkout(&order).await.map_err(|e| {
        error!("Failed to create checkout: {}", e);
        payment_error_to_response(e)
    })?;

    info!("Created checkout session: {}", session.session_id);

    let url = session.url.clone();
    Ok(checkout_reply(
        query.redirect,
        &url,
        CreateCheckoutResponse::from(session),
    ))
}

/// Merge `items` and `product_ids`, summing quantities per product in first-seen order
pub(crate) fn merge_items(request: &CreateCheckoutRequest) -> Vec<(String, i64)> {
    let mut merged: Vec<(String, i64)> = Vec::new();

    let requested = request
        .items
        .iter()
        .map(|i| (i.product_id.as_str(), i.quantity))
        .chain(request.product_ids.iter().map(|id| (id.as_str(), 1)));

    for (product_id, quantity) in requested {
        match merged.iter_mut().find(|(id, _)| id == product_id) {
            Some((_, total)) => *total = total.saturating_add(quantity),
            None => merged.push((product_id.to_string(), quantity)),
        }
    }

    merged
}

pub(crate) fn validate_email(email: &str) -> PaymentResult<()> {
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(PaymentError::InvalidRequest(format!(
            "Invalid customer email: {}",
            email
        )))
    }
}

pub(crate) fn validate_metadata(metadata: &HashMap<String, String>) -> PaymentResult<()> {
    if metadata.len() > MAX_METADATA_ENTRIES {
        return Err(PaymentError::InvalidRequest(format!(
            "At most {} metadata entries allowed",
            MAX_METADATA_ENTRIES
        )));
    }
    for (key, value) in metadata {
        if RESERVED_METADATA.contains(&key.as_str()) {
            return Err(PaymentError::InvalidRequest(format!(
                "Metadata key is reserved: {}",
                key
            )));
        }
        if key.is_empty() || key.len() > MAX_METADATA_KEY_LEN || value.len() > MAX_METADATA_VALUE_LEN {
            return Err(PaymentError::InvalidRequest(format!(
                "Metadata entry too long or empty: {}",
                key
            )));
        }
    }
    Ok(())
}

/// Fill the customer, job reference and metadata shared by every checkout
pub(crate) fn apply_common(
    order: &mut CheckoutOrder,
    customer_id: Option<String>,
    customer_email: Option<String>,
    job_id: Option<String>,
    metadata: HashMap<String, String>,
) -> PaymentResult<()> {
    if let Some(ref email) = customer_email {
        validate_email(email)?;
    }
    validate_metadata(&metadata)?;

    order.customer_id = customer_id.filter(|c| !c.is_empty());
    order.customer_email = customer_email;
    order.metadata.extend(metadata);

    if let Some(job) = job_id.filter(|j| !j.is_empty()) {
        order.metadata.insert("job_id".to_string(), job.clone());
        order.client_reference_id = Some(job);
    }

    Ok(())
}

async fn build_order(state: &AppState, request: CreateCheckoutRequest) -> PaymentResult<CheckoutOrder> {
    let items = merge_items(&request);
    if items.is_empty() {
        return Err(PaymentError::InvalidRequest(
            "No items in checkout request (provide 'items' or 'product_ids')".to_string(),
        ));
    }

    let mut order = CheckoutOrder::new(
        state.config.success_url_with_session(),
        state.config.cancel_url.clone(),
    );
    apply_common(
        &mut order,
        request.customer_id,
        request.customer_email,
        request.job_id,
        request.metadata,
    )?;

    for (product_id, quantity) in &items {
        let product = state.catalog.get_active(product_id)?;
        let line = OrderLine::from_product(product, *quantity)?;
        let quote = state.purchasable_quote(product).await?;
        order.add_line(line, &quote);
    }

    let ids: Vec<&str> = items.iter().map(|(id, _)| id.as_str()).collect();
    order
        .metadata
        .insert("products".to_string(), ids.join(","));

    Ok(order)
}
