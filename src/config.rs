//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::time::Duration;

use serde::Deserialize;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): PostgreSQL connection string. In-memory storage is used when unset.
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `RATE_LIMIT_REQUESTS` / `RATE_LIMIT_WINDOW_SECS`: fixed-window quota per API key (100 per 60s)
/// - `WEBHOOK_TIMEOUT_SECS`: outbound delivery timeout (5s)
/// - `WEBHOOK_MAX_RETRIES` / `WEBHOOK_RETRY_BASE_MS`: background retry policy (disabled by default)
/// - `API_KEY_PREFIX`: prefix prepended to issued secrets (`ak_`)
/// - `TRUSTED_TENANT_HEADER`: header asserted by an upstream session layer (disabled by default)
/// - `LOG_FORMAT`: `pretty` or `json`
/// - `PROMETHEUS_ENABLED`: install the Prometheus recorder
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    #[serde(default)]
    pub webhook_max_retries: u32,

    #[serde(default = "default_webhook_retry_base_ms")]
    pub webhook_retry_base_ms: u64,

    #[serde(default = "default_api_key_prefix")]
    pub api_key_prefix: String,

    #[serde(default)]
    pub trusted_tenant_header: Option<String>,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub prometheus_enabled: bool,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_webhook_timeout_secs() -> u64 {
    5
}

fn default_webhook_retry_base_ms() -> u64 {
    500
}

fn default_api_key_prefix() -> String {
    "ak_".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variable values cannot be parsed into expected types.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        // Field names are automatically converted: rate_limit_requests -> RATE_LIMIT_REQUESTS
        envy::from_env::<Config>()
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_variables_are_missing() {
        let config = envy::from_iter::<_, Config>(Vec::<(String, String)>::new()).unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.rate_limit_requests, 100);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(config.webhook_timeout(), Duration::from_secs(5));
        assert_eq!(config.webhook_max_retries, 0);
        assert_eq!(config.api_key_prefix, "ak_");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert!(config.trusted_tenant_header.is_none());
    }

    #[test]
    fn parses_overrides() {
        let vars = vec![
            ("SERVER_PORT".to_string(), "8080".to_string()),
            ("RATE_LIMIT_REQUESTS".to_string(), "3".to_string()),
            ("LOG_FORMAT".to_string(), "json".to_string()),
            ("TRUSTED_TENANT_HEADER".to_string(), "x-tenant-id".to_string()),
        ];
        let config = envy::from_iter::<_, Config>(vars).unwrap();

        assert_eq!(config.server_port, 8080);
        assert_eq!(config.rate_limit_requests, 3);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.trusted_tenant_header.as_deref(), Some("x-tenant-id"));
    }
}
