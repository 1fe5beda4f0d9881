//! # Storefront Cart
//!
//! Cart and checkout service for the DevStack Globe storefront.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export FLUTTERWAVE_PUBLIC_KEY=FLWPUBK_TEST-...
//! export LEDGER_URL=https://your-project.supabase.co
//! export LEDGER_API_KEY=...
//!
//! # Run the server
//! storefront-cart
//! ```

use cart_api::{routes, state::AppState};
use cart_core::CatalogStore;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Catalog items for sale: {}", state.catalog.list_active().await?.len());
    info!(
        "Payment gateway: flutterwave (test mode: {})",
        state.gateway.config().is_test_mode()
    );
    info!(
        "Ready timeout: {:?}, payment timeout: {:?}",
        state.config.ready_timeout, state.config.payment_timeout
    );

    let _sweeper = state.spawn_session_sweeper();
    let app = routes::create_router(state);

    info!("🛒 Storefront cart starting on http://{}", addr);

    if !is_prod {
        info!("📝 Health: http://{}/health", addr);
        info!("🧺 Cart: GET http://{}/api/v1/cart", addr);
        info!("💳 Checkout: POST http://{}/api/v1/checkout", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

fn print_banner() {
    println!(
        r#"
  🛒 Storefront Cart 🛒
  ━━━━━━━━━━━━━━━━━━━━━━━
  Cart & checkout reconciliation
  Version: {}
  
"#,
        env!("CARGO_PKG_VERSION")
    );
}
