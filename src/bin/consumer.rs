//! Message consumer: applies migrations, seeds the catalogue if configured,
//! then subscribes to the three known topics and feeds every message
//! through the IngestDispatcher (C8). The message bus client itself is
//! platform plumbing out of scope here (§1); `subscribe` is the seam a
//! concrete bus integration plugs into.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use usageledger_core::config::Config;
use usageledger_ingest::default_dispatcher;
use usageledger_store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    info!("starting usage accounting message consumer");

    let store = match Store::connect(&config.database).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to connect to database");
            std::process::exit(1);
        }
    };

    if let Err(e) = store.migrate().await {
        error!(error = %e, "failed to apply migrations");
        std::process::exit(1);
    }

    if let Some(path) = &config.catalogue_config_path {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                if let Err(e) = usageledger_store::seed_from_yaml(&store, &contents).await {
                    error!(error = %e, path, "failed to seed catalogue from configuration");
                    std::process::exit(1);
                }
            }
            Err(e) => {
                error!(error = %e, path, "failed to read catalogue configuration file");
                std::process::exit(1);
            }
        }
    }

    let store = Arc::new(store);
    let dispatcher = default_dispatcher(store.clone());

    subscribe(dispatcher).await
}

/// Drives every received `(topic, payload)` pair through the dispatcher,
/// acking or requesting redelivery according to its `Outcome`. The
/// bus-specific subscription loop is intentionally not implemented here:
/// wiring this to a concrete broker is the one piece of platform plumbing
/// left to the deployment.
async fn subscribe(dispatcher: usageledger_ingest::IngestDispatcher) -> Result<()> {
    let _ = &dispatcher;

    info!("no message bus client is configured; the consumer has nothing to subscribe to");
    std::future::pending::<()>().await;
    Ok(())
}
