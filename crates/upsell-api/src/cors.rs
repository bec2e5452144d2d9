//! # CORS
//!
//! Browser origin policy. Configured origins are matched exactly. With no
//! configured origins the API is open in development and closed in
//! production.

use crate::config::AppConfig;
use axum::http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Build the CORS layer for the configured origin allow-list
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.is_empty() && !config.is_production() {
        AllowOrigin::from(Any)
    } else {
        let allowed: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();

        if allowed.is_empty() {
            tracing::warn!("No CORS origins allowed; browser calls will be rejected");
        }

        AllowOrigin::predicate(move |origin: &HeaderValue, _req| allowed.iter().any(|v| v == origin))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(600))
}
