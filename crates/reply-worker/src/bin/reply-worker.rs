//! Reply worker binary.
//!
//! Runs `WORKER_CONCURRENCY` claim loops against the shared database until
//! Ctrl+C, then lets in-flight jobs finish.

use std::env;
use std::sync::Arc;

use database::Database;
use metrics_exporter_prometheus::PrometheusBuilder;
use reply_worker::{ReplyWorker, WorkerConfig};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use whatsapp_client::WhatsAppClient;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = WorkerConfig::from_env()?;
    info!(
        concurrency = config.concurrency,
        max_attempts = config.max_attempts(),
        soft_limit_secs = config.soft_time_limit.as_secs(),
        hard_limit_secs = config.hard_time_limit.as_secs(),
        "Starting reply worker pool"
    );

    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(addr = %addr, "Metrics endpoint: /metrics");
    }

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let completer = Arc::new(openai_provider::completer_slot());
    let embedder = Arc::new(openai_provider::embedder_slot());
    let sender = Arc::new(WhatsAppClient::from_env()?);

    let worker = ReplyWorker::new(db.clone(), completer, embedder, sender, config.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(config.concurrency);
    for i in 0..config.concurrency {
        let id = format!("{}-{}", worker.worker_id(), i);
        let worker = worker.clone().with_worker_id(id);
        handles.push(tokio::spawn(worker.run_until_shutdown(shutdown_rx.clone())));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, waiting for in-flight jobs");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Worker task panicked");
        }
    }

    db.close().await;
    info!("Reply worker pool stopped");
    Ok(())
}
