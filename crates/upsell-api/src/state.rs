//! # Application State
//!
//! Shared state for the Axum application: the payment provider, the
//! upsell catalog, the price cache and configuration.

use crate::config::AppConfig;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use upsell_core::{
    BoxedPaymentProvider, PaymentError, PaymentResult, PriceQuote, Product, ProductCatalog,
    TtlCache,
};
use upsell_stripe::StripeClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment provider
    pub provider: BoxedPaymentProvider,
    /// Upsell catalog
    pub catalog: Arc<ProductCatalog>,
    /// Price lookups keyed by provider price id
    pub prices: Arc<TtlCache<PriceQuote>>,
    /// Application config
    pub config: Arc<AppConfig>,
    /// Process start
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state backed by Stripe, reading credentials from the environment
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let catalog = load_product_catalog(config.catalog_path.as_deref())?;

        let stripe = StripeClient::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        Ok(Self::from_parts(config, catalog, Arc::new(stripe)))
    }

    /// Assemble state from already-built parts
    pub fn from_parts(
        config: AppConfig,
        catalog: ProductCatalog,
        provider: BoxedPaymentProvider,
    ) -> Self {
        Self {
            provider,
            catalog: Arc::new(catalog),
            prices: Arc::new(TtlCache::new(config.price_cache_ttl)),
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }

    /// Current price of a catalog product, served from cache when fresh
    pub async fn quote(&self, product: &Product) -> PaymentResult<PriceQuote> {
        let provider = Arc::clone(&self.provider);
        let price_id = product.price_id.clone();

        self.prices
            .get_or_load(&product.price_id, || async move {
                provider.fetch_price(&price_id).await
            })
            .await
    }

    /// Current price of a product that must be purchasable right now
    pub async fn purchasable_quote(&self, product: &Product) -> PaymentResult<PriceQuote> {
        let quote = self.quote(product).await?;
        if !quote.active {
            return Err(PaymentError::InvalidPrice {
                message: format!("Price for {} is no longer active", product.id),
            });
        }
        Ok(quote)
    }
}

/// Load the product catalog from an explicit path or the default locations
fn load_product_catalog(explicit: Option<&Path>) -> anyhow::Result<ProductCatalog> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let catalog = ProductCatalog::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded {} products from {}", catalog.products.len(), path.display());
        return Ok(catalog);
    }

    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = ProductCatalog::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", path))?;
            tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
            return Ok(catalog);
        }
    }

    tracing::warn!("No product catalog found, using empty catalog");
    Ok(ProductCatalog::new())
}
