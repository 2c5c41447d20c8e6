//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheOptions;

/// Default upstream endpoint for portfolio snapshots
pub const DEFAULT_PORTFOLIO_API_URL: &str = "https://api-invest.tinkoff.ru/openapi/portfolio";

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Background revalidation period in milliseconds for subscribed keys
    pub refresh_interval_ms: u64,
    /// Age in milliseconds after which a read forces a fetch
    pub max_age_ms: u64,
    /// Seconds an unsubscribed entry is kept before eviction
    pub eviction_grace: u64,
    /// Background eviction sweep interval in seconds
    pub sweep_interval: u64,
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// HTTP server port
    pub server_port: u16,
    /// Upstream portfolio endpoint
    pub portfolio_api_url: String,
    /// Upstream request timeout in seconds
    pub request_timeout: u64,
    /// How long a request waits for a first fetch, in milliseconds
    pub settle_timeout_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REFRESH_INTERVAL_MS` - Revalidation period (default: 60000)
    /// - `MAX_AGE_MS` - Read-time staleness limit (default: 60000)
    /// - `EVICTION_GRACE_SECS` - Idle grace window (default: 300)
    /// - `SWEEP_INTERVAL_SECS` - Eviction sweep frequency (default: 30)
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `PORTFOLIO_API_URL` - Upstream endpoint
    /// - `REQUEST_TIMEOUT_SECS` - Upstream timeout (default: 30)
    /// - `SETTLE_TIMEOUT_MS` - First-fetch wait (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            refresh_interval_ms: parse_var("REFRESH_INTERVAL_MS", defaults.refresh_interval_ms),
            max_age_ms: parse_var("MAX_AGE_MS", defaults.max_age_ms),
            eviction_grace: parse_var("EVICTION_GRACE_SECS", defaults.eviction_grace),
            sweep_interval: parse_var("SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            max_entries: parse_var("MAX_ENTRIES", defaults.max_entries),
            server_port: parse_var("SERVER_PORT", defaults.server_port),
            portfolio_api_url: env::var("PORTFOLIO_API_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.portfolio_api_url),
            request_timeout: parse_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            settle_timeout_ms: parse_var("SETTLE_TIMEOUT_MS", defaults.settle_timeout_ms),
        }
    }

    /// Cache tuning derived from this configuration.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            max_age: Duration::from_millis(self.max_age_ms),
            eviction_grace: Duration::from_secs(self.eviction_grace),
            max_entries: self.max_entries,
        }
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 60_000,
            max_age_ms: 60_000,
            eviction_grace: 300,
            sweep_interval: 30,
            max_entries: 1000,
            server_port: 3000,
            portfolio_api_url: DEFAULT_PORTFOLIO_API_URL.to_string(),
            request_timeout: 30,
            settle_timeout_ms: 10_000,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.refresh_interval_ms, 60_000);
        assert_eq!(config.max_age_ms, 60_000);
        assert_eq!(config.eviction_grace, 300);
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.portfolio_api_url, DEFAULT_PORTFOLIO_API_URL);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("REFRESH_INTERVAL_MS");
        env::remove_var("MAX_AGE_MS");
        env::remove_var("MAX_ENTRIES");
        env::remove_var("PORTFOLIO_API_URL");

        let config = Config::from_env();
        assert_eq!(config.refresh_interval_ms, 60_000);
        assert_eq!(config.max_age_ms, 60_000);
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.portfolio_api_url, DEFAULT_PORTFOLIO_API_URL);
    }

    #[test]
    fn test_cache_options_conversion() {
        let config = Config {
            refresh_interval_ms: 1_500,
            max_age_ms: 500,
            eviction_grace: 7,
            max_entries: 3,
            ..Config::default()
        };

        let options = config.cache_options();
        assert_eq!(options.refresh_interval, Duration::from_millis(1_500));
        assert_eq!(options.max_age, Duration::from_millis(500));
        assert_eq!(options.eviction_grace, Duration::from_secs(7));
        assert_eq!(options.max_entries, 3);
    }
}
