//! The Store: a pooled connection handle passed through the call graph.
//! There is no process-wide singleton; every component that needs the
//! database holds its own `Store` (cheap to clone, the pool is `Arc`-backed
//! internally by `sqlx`).

use sqlx::postgres::{PgPool, PgPoolOptions};
use usageledger_core::config::DatabaseConfig;
use usageledger_core::error::{StoreError, StoreResult};

/// Postgres' foreign-key-violation SQLSTATE.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Postgres' not-null-violation SQLSTATE. The event/sample inserts resolve
/// `item_id` via a scalar subquery keyed on `sku`, so an unknown SKU surfaces
/// as a NULL landing in a `NOT NULL` column, not as an FK violation.
const NOT_NULL_VIOLATION: &str = "23502";

/// Turn a raw driver error into the right `StoreError` variant: a foreign
/// key or not-null violation is an `Integrity` error (the
/// `ensure_sku`-and-retry path knows to recover from either), everything
/// else is `Transient`.
pub fn classify_sqlx_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        let code = db_err.code();
        if code.as_deref() == Some(FOREIGN_KEY_VIOLATION) || code.as_deref() == Some(NOT_NULL_VIOLATION) {
            return StoreError::Integrity(db_err.message().to_string());
        }
    }

    StoreError::Transient(e)
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        Ok(Store { pool })
    }

    /// Apply pending migrations. Both binaries call this before serving any
    /// traffic.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
