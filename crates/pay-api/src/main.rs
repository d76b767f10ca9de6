//! # Dropics Pay
//!
//! Crypto checkout, newsletter and catalog API for the Dropics storefront.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export SUPABASE_URL=https://<project>.supabase.co
//! export SUPABASE_SERVICE_ROLE_KEY=...
//!
//! # Or run entirely in memory
//! export STORE_BACKEND=memory
//! export DEV_AUTH_TOKENS=dev-token:5f1d7f0a-2a55-4c1e-8d0e-9a1c3b2d4e5f
//!
//! # Run the server
//! dropics-pay
//! ```

use pay_api::{routes, state::AppState};
use pay_core::Authenticator;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Store: {}", state.config.store_backend.as_str());
    info!("Auth: {}", state.auth.authenticator_name());
    let cards_enabled = state.cards.is_some();

    let app = routes::create_router(state);

    info!("Dropics Pay starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Crypto checkout: POST http://{}/api/payments/crypto", addr);
        info!("Solana checkout: POST http://{}/api/payments/solana", addr);
        if cards_enabled {
            info!("Card checkout: POST http://{}/api/payments/stripe", addr);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  ✦ Dropics Pay ✦
  ━━━━━━━━━━━━━━━━━━━━━━━
  Crypto checkout API
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
