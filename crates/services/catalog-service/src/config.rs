//! Catalog service configuration.

use std::env;

use common::DatabaseConfig;

const ENV_PREFIX: &str = "CATALOG";
const DEFAULT_DATABASE_URL: &str = "sqlite://catalog.db?mode=rwc";

/// Catalog service configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Connection pool settings
    pub database: DatabaseConfig,
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
}

impl CatalogConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            database: DatabaseConfig::from_env(ENV_PREFIX, DEFAULT_DATABASE_URL),
            log_level: env::var("CATALOG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                ..DatabaseConfig::default()
            },
            log_level: "info".to_string(),
        }
    }
}
