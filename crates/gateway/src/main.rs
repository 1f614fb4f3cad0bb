//! Gateway binary.

use std::env;
use std::sync::Arc;

use database::Database;
use gateway::{app, init_metrics, AppState, GatewayConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing();
    init_metrics();

    let config = GatewayConfig::from_env()?;
    info!(addr = %config.addr, "Starting gateway");
    if config.verify_token.is_none() {
        warn!("VERIFY_TOKEN not set; webhook verification will fail");
    }
    if config.admin_token.is_none() {
        warn!("ADMIN_API_TOKEN not set; admin API is disabled");
    }

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    // Providers are built on first use so the gateway starts without credentials.
    let embedder = Arc::new(openai_provider::embedder_slot());
    let completer = Arc::new(openai_provider::completer_slot());

    let addr = config.addr;
    let state = AppState::new(db.clone(), config, embedder, completer);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Gateway listening");
    info!("Metrics endpoint: /metrics");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Gateway stopped");
    Ok(())
}
