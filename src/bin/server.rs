//! HTTP read server: serves the ReadAPI (C9) over the Store. Applies
//! pending migrations before accepting traffic but does not seed the
//! catalogue itself — the consumer process owns startup seeding (§6).

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use usageledger_core::config::Config;
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

    info!("starting usage accounting read server");

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

    let app = usageledger_api::app(Arc::new(store), &config.http.root_path);

    let listener = tokio::net::TcpListener::bind(&config.http.bind_addr).await?;
    info!(addr = %config.http.bind_addr, root_path = %config.http.root_path, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
