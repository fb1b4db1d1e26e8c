// Zakura gateway binary
// Decision: Configuration errors abort startup with the full context chain

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zakura_auth::{AccessPolicy, Authenticator};
use zakura_gateway::{build_router, AppState, GatewayConfig, Upstream};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "zakura_gateway=debug,zakura_auth=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Zakura gateway...");

    let config = GatewayConfig::from_env().context("Failed to load gateway configuration")?;

    let identities = config.build_identity_store().await?;
    let authenticator = Authenticator::from_config(&config.auth, identities)
        .context("Invalid authentication configuration")?;
    tracing::info!(rules = config.rules.len(), "Authorization rules loaded");
    let policy = AccessPolicy::new(config.rules.clone());

    let cors = config.cors.layer().context("Invalid CORS configuration")?;
    tracing::info!(origins = ?config.cors.allowed_origins, "CORS configured");

    let upstream = match &config.upstream_url {
        Some(url) => {
            let upstream = Upstream::new(url)?;
            tracing::info!(url = %upstream.base_url(), "Forwarding to upstream");
            Some(upstream)
        }
        None => {
            tracing::info!("No upstream configured; unmatched requests return 404");
            None
        }
    };

    let app = build_router(AppState::new(authenticator, upstream), policy, cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
