//! # Application Configuration
//!
//! Everything is read from environment variables (a `.env` file is
//! honoured in development). Stripe credentials are loaded separately by
//! `upsell_stripe::StripeConfig`.

use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use upsell_core::DEFAULT_PRICE_TTL;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Public URL of the job board
    pub public_base_url: String,
    /// Where Stripe sends the customer after paying
    pub success_url: String,
    /// Where Stripe sends the customer after backing out
    pub cancel_url: String,
    /// Origins allowed to call the API from a browser
    pub allowed_origins: Vec<String>,
    /// How long a price lookup stays fresh
    pub price_cache_ttl: Duration,
    /// Explicit product catalog location
    pub catalog_path: Option<PathBuf>,
    /// Log output format
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match var("PORT") {
            Some(p) => p.parse().with_context(|| format!("Invalid PORT: {}", p))?,
            None => 8080,
        };

        let price_cache_ttl = match var("PRICE_CACHE_TTL_SECS") {
            Some(s) => Duration::from_secs(
                s.parse()
                    .with_context(|| format!("Invalid PRICE_CACHE_TTL_SECS: {}", s))?,
            ),
            None => DEFAULT_PRICE_TTL,
        };

        let log_format = match var("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => bail!("Invalid LOG_FORMAT: {} (expected pretty or json)", other),
        };

        let public_base_url = var("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let success_url = var("SUCCESS_URL")
            .unwrap_or_else(|| format!("{}/upsell/success", public_base_url));
        let cancel_url =
            var("CANCEL_URL").unwrap_or_else(|| format!("{}/upsell/cancel", public_base_url));

        let allowed_origins: Vec<String> = var("ALLOWED_ORIGINS")
            .map(|list| {
                list.split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            environment: var("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            public_base_url,
            success_url,
            cancel_url,
            allowed_origins,
            price_cache_ttl,
            catalog_path: var("PRODUCT_CATALOG").map(PathBuf::from),
            log_format,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Success URL with the session id placeholder Stripe fills in
    pub fn success_url_with_session(&self) -> String {
        if self.success_url.contains("{CHECKOUT_SESSION_ID}") {
            self.success_url.clone()
        } else if self.success_url.contains('?') {
            format!("{}&session_id={{CHECKOUT_SESSION_ID}}", self.success_url)
        } else {
            format!("{}?session_id={{CHECKOUT_SESSION_ID}}", self.success_url)
        }
    }
}
