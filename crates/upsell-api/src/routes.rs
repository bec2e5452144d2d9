//! # Routes
//!
//! Axum router configuration for the upsell checkout API.

use crate::state::AppState;
use crate::{bundle, cors, handlers, widget};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the main application router
///
/// Routes:
/// - Service:
///   - GET /health, / - Health check
///   - GET /diagnostics - Runtime details
///   - GET /widget - Logo carousel fragment
///
/// - API v1:
///   - GET  /api/v1/prices - Prices for all active upsells
///   - GET  /api/v1/prices/{product_id} - Price of one upsell
///   - POST /api/v1/checkout - Create checkout session
///   - GET  /api/v1/credit - Preview bundle credit
///   - POST /api/v1/checkout/bundle - Bundle checkout with credit applied
pub fn create_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors::cors_layer(&state.config));

    let api_routes = Router::new()
        // Prices
        .route("/prices", get(handlers::list_prices))
        .route("/prices/{product_id}", get(handlers::get_price))
        // Checkout
        .route("/checkout", post(handlers::create_checkout))
        .route("/checkout/bundle", post(bundle::create_bundle_checkout))
        .route("/credit", get(bundle::preview_credit));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .route("/diagnostics", get(handlers::diagnostics))
        .route("/widget", get(widget::carousel))
        .nest("/api/v1", api_routes)
        .layer(middleware)
        .with_state(state)
}
