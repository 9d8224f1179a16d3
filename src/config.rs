use crate::error::{GhostlineError, Result};
use crate::models::RetryPolicy;
use crate::provider::DEFAULT_PROVIDER_URL;
use crate::proxy::pool::SelectionPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Proxy listing provider configuration
    pub provider: ProviderConfig,
    /// Proxied request configuration
    pub request: RequestConfig,
    /// Metrics endpoint configuration
    pub metrics: MetricsConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Clone)]
pub struct ProviderConfig {
    /// API key for the listing endpoint (required)
    pub api_key: String,
    /// Listing endpoint URL
    pub url: String,
    /// Which proxies are eligible for selection
    pub selection_policy: SelectionPolicy,
    /// Pool refresh interval in seconds (0 = never refresh)
    pub refresh_interval: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"***")
            .field("url", &self.url)
            .field("selection_policy", &self.selection_policy)
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-attempt timeout in seconds
    pub timeout: u64,
    /// Retry failed requests
    pub retry_enabled: bool,
    /// Total attempts per request
    pub retry_max_attempts: u32,
    /// Minimum wait between attempts in seconds
    pub retry_wait_min: u64,
    /// Maximum wait between attempts in seconds
    pub retry_wait_max: u64,
    /// Linear backoff step in seconds
    pub retry_backoff_step: u64,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Serve the metrics endpoint
    pub enabled: bool,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Port for the metrics endpoint (default: 9090)
    pub port: u16,
    /// Maximum distinct proxy labels (0 = unbounded)
    pub proxy_label_limit: usize,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl LogConfig {
    /// Logging settings alone, readable before the rest of the config
    pub fn from_env() -> Self {
        Self {
            level: get_env_or("LOG_LEVEL", "info"),
            format: get_env_or("LOG_FORMAT", "pretty"),
        }
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = get_env_or("GHOSTLINE_API_KEY", "");
        if api_key.trim().is_empty() {
            return Err(GhostlineError::MissingCredential);
        }

        let config = Config {
            provider: ProviderConfig {
                api_key,
                url: get_env_or("GHOSTLINE_PROVIDER_URL", DEFAULT_PROVIDER_URL),
                selection_policy: SelectionPolicy::from_str(&get_env_or(
                    "GHOSTLINE_SELECTION_POLICY",
                    "include_all",
                )),
                refresh_interval: parse_env("GHOSTLINE_REFRESH_INTERVAL", "0")?,
            },
            request: RequestConfig {
                timeout: parse_env("REQUEST_TIMEOUT", "5")?,
                retry_enabled: parse_env("RETRY_ENABLED", "true")?,
                retry_max_attempts: parse_env("RETRY_MAX_ATTEMPTS", "3")?,
                retry_wait_min: parse_env("RETRY_WAIT_MIN", "1")?,
                retry_wait_max: parse_env("RETRY_WAIT_MAX", "30")?,
                retry_backoff_step: parse_env("RETRY_BACKOFF_STEP", "1")?,
            },
            metrics: MetricsConfig {
                enabled: parse_env("METRICS_ENABLED", "true")?,
                host: get_env_or("METRICS_HOST", "0.0.0.0"),
                port: get_env_or("METRICS_PORT", "9090").parse().map_err(|_| {
                    GhostlineError::InvalidConfig(
                        "METRICS_PORT must be a valid port number".into(),
                    )
                })?,
                proxy_label_limit: parse_env("METRICS_PROXY_LABEL_LIMIT", "0")?,
            },
            log: LogConfig::from_env(),
        };

        if config.request.timeout == 0 {
            return Err(GhostlineError::InvalidConfig(
                "REQUEST_TIMEOUT must be greater than zero".into(),
            ));
        }
        config.retry_policy()?;

        Ok(config)
    }

    /// Retry policy for proxied requests, `None` when retries are disabled
    pub fn retry_policy(&self) -> Result<Option<RetryPolicy>> {
        if !self.request.retry_enabled {
            return Ok(None);
        }
        RetryPolicy::new(
            self.request.retry_max_attempts,
            self.request.retry_wait_min,
            self.request.retry_wait_max,
            self.request.retry_backoff_step,
        )
        .map(Some)
    }

    /// Per-attempt request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request.timeout)
    }

    /// Pool refresh interval, `None` when refreshing is disabled
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.provider.refresh_interval {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Get the metrics endpoint address
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.metrics.host, self.metrics.port)
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env<T: FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| GhostlineError::InvalidConfig(format!("{} has an invalid value", key)))
}
