//! CatalogueSeeder (C11): seeds items and prices from the YAML configuration
//! file at startup (§6). A malformed file is fatal — the caller is expected
//! to exit the process rather than start serving traffic half-configured.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use usageledger_core::error::{CatalogueError, ConfigError, ConfigResult, StoreError};

use crate::repositories::catalogue::CatalogueRepository;
use crate::store::Store;

#[derive(Debug, Deserialize)]
struct ConfiguredItem {
    sku: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfiguredPrice {
    sku: String,
    valid_from: DateTime<Utc>,
    price: Decimal,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogueConfig {
    #[serde(default)]
    items: Vec<ConfiguredItem>,
    #[serde(default)]
    prices: Vec<ConfiguredPrice>,
}

/// Parse the YAML catalogue seed file's text. A non-mapping top level or any
/// other structural mismatch is reported as `ConfigError`, never panics.
fn parse_catalogue_config(contents: &str) -> ConfigResult<CatalogueConfig> {
    let raw: serde_yaml::Value = serde_yaml::from_str(contents)
        .map_err(|e| ConfigError::MalformedCatalogue(e.to_string()))?;

    if !raw.is_mapping() {
        return Err(ConfigError::CatalogueNotAMapping);
    }

    serde_yaml::from_value(raw).map_err(|e| ConfigError::MalformedCatalogue(e.to_string()))
}

/// Parse `contents` as the YAML catalogue seed file and upsert every item
/// and price it names into `store`, in file order.
pub async fn seed_from_yaml(store: &Store, contents: &str) -> ConfigResult<()> {
    let config = parse_catalogue_config(contents)?;

    for item in &config.items {
        store
            .upsert_item(&item.sku, item.name.as_deref(), item.unit.as_deref())
            .await
            .map_err(catalogue_error_to_config_error)?;
    }

    for price in &config.prices {
        store
            .upsert_price(&price.sku, price.valid_from, price.price)
            .await
            .map_err(catalogue_error_to_config_error)?;
    }

    tracing::info!(
        items = config.items.len(),
        prices = config.prices.len(),
        "seeded catalogue from configuration"
    );

    Ok(())
}

fn catalogue_error_to_config_error(e: CatalogueError) -> ConfigError {
    match e {
        CatalogueError::Store(StoreError::Transient(err)) => ConfigError::Malformed(
            config::ConfigError::Message(format!("database error seeding catalogue: {err}")),
        ),
        other => ConfigError::MalformedCatalogue(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_items_and_prices() {
        let yaml = r#"
items:
  - sku: wfcpu
    name: Workflow CPU seconds
    unit: seconds
prices:
  - sku: wfcpu
    valid_from: 2025-01-01T00:00:00Z
    price: 0.001
"#;
        let config = parse_catalogue_config(yaml).unwrap();
        assert_eq!(config.items.len(), 1);
        assert_eq!(config.items[0].sku, "wfcpu");
        assert_eq!(config.prices.len(), 1);
        assert_eq!(config.prices[0].price, Decimal::new(1, 3));
    }

    #[test]
    fn empty_mapping_is_valid() {
        let config = parse_catalogue_config("{}").unwrap();
        assert!(config.items.is_empty());
        assert!(config.prices.is_empty());
    }

    #[test]
    fn non_mapping_top_level_is_rejected() {
        let err = parse_catalogue_config("- just\n- a\n- list\n").unwrap_err();
        assert!(matches!(err, ConfigError::CatalogueNotAMapping));
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let err = parse_catalogue_config("items: [unterminated").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedCatalogue(_)));
    }
}
