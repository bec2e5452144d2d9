//! # upsell-checkout
//!
//! Checkout backend for job-posting upsells.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export ALLOWED_ORIGINS=https://jobs.example.com
//!
//! # Run the server
//! upsell-checkout
//! ```

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use upsell_api::{routes, AppConfig, AppState, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }

    print_banner();

    let addr = config.socket_addr()?;
    let is_prod = config.is_production();

    let state = AppState::new(config)?;

    info!("Environment: {}", state.config.environment);
    info!("Products loaded: {}", state.catalog.products.len());
    info!(
        "Payment provider: {} (test mode: {})",
        state.provider.provider_name(),
        state.provider.is_test_mode()
    );
    info!("Price cache TTL: {}s", state.config.price_cache_ttl.as_secs());

    let app = routes::create_router(state);

    info!("Upsell checkout starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Prices: GET http://{}/api/v1/prices", addr);
        info!("Checkout: POST http://{}/api/v1/checkout", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_banner() {
    println!(
        r#"
  Upsell Checkout
  ━━━━━━━━━━━━━━━━━━━━━━━
  Job posting upsells via Stripe
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
