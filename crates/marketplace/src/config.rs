//! Marketplace configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKETPLACE_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to `DATABASE_URL`)
//!
//! ## Optional
//! - `MARKETPLACE_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `SHELF_LIFE_HOURS` - Hours a newly listed product stays on the shelf
//!   (default: 168)
//! - `SALES_TAX_RATE` - Sales tax as a fraction, e.g. `0.0875` (default: 0)

use std::str::FromStr;

use raredoor_core::{ShelfLife, TaxRate};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Marketplace configuration.
#[derive(Clone)]
pub struct MarketplaceConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Maximum pool connections
    pub max_connections: u32,
    /// Shelf life given to newly listed products
    pub shelf_life: ShelfLife,
    /// Sales tax applied at checkout and on offers
    pub sales_tax_rate: TaxRate,
}

impl std::fmt::Debug for MarketplaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("shelf_life", &self.shelf_life)
            .field("sales_tax_rate", &self.sales_tax_rate)
            .finish()
    }
}

impl MarketplaceConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the database URL is missing or any variable
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MARKETPLACE_DATABASE_URL")?;
        validate_database_url(&database_url, "MARKETPLACE_DATABASE_URL")?;

        let max_connections = parse_var(
            "MARKETPLACE_DB_MAX_CONNECTIONS",
            &get_env_or_default(
                "MARKETPLACE_DB_MAX_CONNECTIONS",
                &DEFAULT_MAX_CONNECTIONS.to_string(),
            ),
        )?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "MARKETPLACE_DB_MAX_CONNECTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let shelf_life = get_optional_env("SHELF_LIFE_HOURS")
            .map(|v| parse_var::<u32>("SHELF_LIFE_HOURS", &v).map(ShelfLife::new))
            .transpose()?
            .unwrap_or_default();

        let sales_tax_rate = get_optional_env("SALES_TAX_RATE")
            .map(|v| parse_tax_rate("SALES_TAX_RATE", &v))
            .transpose()?
            .unwrap_or(TaxRate::ZERO);

        Ok(Self {
            database_url,
            max_connections,
            shelf_life,
            sales_tax_rate,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_tax_rate(key: &str, value: &str) -> Result<TaxRate, ConfigError> {
    let rate: Decimal = parse_var(key, value)?;
    TaxRate::new(rate).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// The URL must parse and point at `PostgreSQL`.
fn validate_database_url(url: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url.expose_secret()).map_err(|e| {
        ConfigError::InvalidEnvVar(var_name.to_string(), format!("not a valid URL: {e}"))
    })?;
    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("expected a postgres:// URL, got {other}://"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_trims() {
        let n: u32 = parse_var("X", " 12 ").unwrap();
        assert_eq!(n, 12);
        assert!(matches!(
            parse_var::<u32>("X", "twelve"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_parse_tax_rate() {
        let rate = parse_tax_rate("SALES_TAX_RATE", "0.0875").unwrap();
        assert_eq!(rate.rate(), Decimal::new(875, 4));
        assert!(parse_tax_rate("SALES_TAX_RATE", "1.5").is_err());
        assert!(parse_tax_rate("SALES_TAX_RATE", "-0.1").is_err());
    }

    #[test]
    fn test_validate_database_url() {
        let ok = SecretString::from("postgres://rd:pw@localhost:5432/raredoor");
        assert!(validate_database_url(&ok, "DB").is_ok());

        let wrong_scheme = SecretString::from("mysql://localhost/raredoor");
        assert!(validate_database_url(&wrong_scheme, "DB").is_err());

        let garbage = SecretString::from("not a url");
        assert!(validate_database_url(&garbage, "DB").is_err());
    }

    #[test]
    fn test_debug_redacts_url() {
        let config = MarketplaceConfig {
            database_url: SecretString::from("postgres://rd:hunter2@db/raredoor"),
            max_connections: 10,
            shelf_life: ShelfLife::default(),
            sales_tax_rate: TaxRate::ZERO,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
