//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL (default: `http://localhost:3000`); `https://` enables secure cookies
//! - `STOREFRONT_TAX_RATE` - Sales tax rate (default: 0.08)
//! - `STOREFRONT_FLAT_SHIPPING_FEE` - Shipping fee below the threshold (default: 10.00)
//! - `STOREFRONT_FREE_SHIPPING_THRESHOLD` - Subtotal for free shipping (default: 100.00)
//! - `STOREFRONT_RATE_LIMIT` - Per-IP rate limiting on `/api` (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0 to 1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate, 0.0 to 1.0 (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use driftwood_core::PricingPolicy;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Tax and shipping rates
    pub pricing: PricingPolicy,
    /// Whether per-IP rate limiting is applied
    pub rate_limit: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let database_url = env.database_url("STOREFRONT_DATABASE_URL")?;
        let host = env.parsed::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = env.parsed::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = env.or_default("STOREFRONT_BASE_URL", "http://localhost:3000");

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            tax_rate: env.decimal("STOREFRONT_TAX_RATE", defaults.tax_rate)?,
            flat_shipping_fee: env.decimal("STOREFRONT_FLAT_SHIPPING_FEE", defaults.flat_shipping_fee)?,
            free_shipping_threshold: env.decimal(
                "STOREFRONT_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
        };
        if pricing.tax_rate > Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_TAX_RATE".to_owned(),
                "must not exceed 1".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            pricing,
            rate_limit: env.parsed::<bool>("STOREFRONT_RATE_LIMIT", "true")?,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.rate("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: env.rate("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_owned())
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_owned()))
    }

    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
    }

    /// Non-negative decimal amount.
    fn decimal(&self, key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };
        let value = Decimal::from_str(raw.trim())
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                key.to_owned(),
                "must not be negative".to_owned(),
            ));
        }
        Ok(value)
    }

    /// Sample rate between 0.0 and 1.0.
    fn rate(&self, key: &str, default: &str) -> Result<f32, ConfigError> {
        let value = self.parsed::<f32>(key, default)?;
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(ConfigError::InvalidEnvVar(
                key.to_owned(),
                "must be between 0.0 and 1.0".to_owned(),
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("STOREFRONT_DATABASE_URL", "postgres://localhost/driftwood")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.pricing, PricingPolicy::default());
        assert!(!config.secure_cookies());
        assert!(config.rate_limit);
        assert!(config.sentry_dsn.is_none());
        assert!((config.sentry_sample_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[("DATABASE_URL", "postgres://fallback/db")]).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fallback/db");

        assert!(matches!(load(&[]), Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_pricing_overrides() {
        let config = load(&[
            ("STOREFRONT_DATABASE_URL", "postgres://localhost/driftwood"),
            ("STOREFRONT_TAX_RATE", "0.05"),
            ("STOREFRONT_FLAT_SHIPPING_FEE", "4.99"),
            ("STOREFRONT_FREE_SHIPPING_THRESHOLD", "50"),
            ("STOREFRONT_BASE_URL", "https://shop.example.com"),
        ])
        .unwrap();
        assert_eq!(config.pricing.tax_rate, Decimal::new(5, 2));
        assert_eq!(config.pricing.flat_shipping_fee, Decimal::new(499, 2));
        assert_eq!(config.pricing.free_shipping_threshold, Decimal::new(50, 0));
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let db = ("STOREFRONT_DATABASE_URL", "postgres://localhost/driftwood");
        assert!(load(&[db, ("STOREFRONT_PORT", "http")]).is_err());
        assert!(load(&[db, ("STOREFRONT_TAX_RATE", "-0.01")]).is_err());
        assert!(load(&[db, ("STOREFRONT_TAX_RATE", "1.5")]).is_err());
        assert!(load(&[db, ("STOREFRONT_FLAT_SHIPPING_FEE", "ten")]).is_err());
        assert!(load(&[db, ("SENTRY_SAMPLE_RATE", "2")]).is_err());
        assert!(load(&[db, ("STOREFRONT_RATE_LIMIT", "sometimes")]).is_err());
    }
}
