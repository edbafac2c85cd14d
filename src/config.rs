use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Service settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub user_service_url: String,
    pub product_service_url: String,
    /// Per-request timeout on outbound HTTP calls.
    pub remote_timeout: Duration,
    /// Deadline given to each inbound request.
    pub request_timeout: Duration,
    pub max_order_items: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &'static str, default: &str| {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .filter(|url| !url.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            host: text("HOST", "0.0.0.0"),
            port: parsed(&lookup, "PORT", 8080)?,
            user_service_url: text("USER_SERVICE_URL", "http://localhost:8081"),
            product_service_url: text("PRODUCT_SERVICE_URL", "http://localhost:8082"),
            remote_timeout: Duration::from_millis(positive(&lookup, "REMOTE_TIMEOUT_MS", 5000)?),
            request_timeout: Duration::from_millis(positive(&lookup, "REQUEST_TIMEOUT_MS", 10000)?),
            max_order_items: usize::try_from(positive(&lookup, "MAX_ORDER_ITEMS", 100)?)
                .map_err(|e| ConfigError::Invalid {
                    key: "MAX_ORDER_ITEMS",
                    value: text("MAX_ORDER_ITEMS", ""),
                    reason: e.to_string(),
                })?,
        })
    }
}

fn parsed<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn positive<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parsed(lookup, key, default)? {
        0 => Err(ConfigError::Invalid {
            key,
            value: "0".into(),
            reason: "must be greater than zero".into(),
        }),
        n => Ok(n),
    }
}
