//! Process configuration, loaded once at startup from the environment.
//!
//! Both binaries (the HTTP read server and the message consumer) construct
//! one of these before doing anything else and pass it down as an immutable
//! value; nothing re-reads the environment mid-request.

use crate::error::{ConfigError, ConfigResult};

/// Database connection parameters and pool sizing.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full Postgres connection string.
    pub url: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
}

/// HTTP server bind address and mount prefix.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    /// Mount prefix for every route, e.g. `/api/`.
    pub root_path: String,
}

/// Top-level process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    /// Path to the YAML catalogue seed file; absent means seeding is skipped.
    pub catalogue_config_path: Option<String>,
}

fn env_var(name: &str) -> ConfigResult<String> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnv(name.to_string()))
}

fn env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from the process environment. Fails fatally if
    /// `DATABASE_URL` is absent; every other value has a safe default.
    pub fn from_env() -> ConfigResult<Self> {
        let url = env_var("DATABASE_URL")?;

        let max_connections = env_var_or("DATABASE_MAX_CONNECTIONS", "10")
            .parse()
            .unwrap_or(10);

        Ok(Config {
            database: DatabaseConfig { url, max_connections },
            http: HttpConfig {
                bind_addr: env_var_or("BIND_ADDR", "0.0.0.0:8080"),
                root_path: env_var_or("ROOT_PATH", "/api/"),
            },
            catalogue_config_path: std::env::var("CATALOGUE_CONFIG_PATH").ok(),
        })
    }
}
