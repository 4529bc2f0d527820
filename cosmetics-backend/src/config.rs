use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse CONFIG: {0}")]
    InvalidBlob(#[from] serde_json::Error),

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid port: {0}")]
    InvalidPort(String),
}

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    /// Env: PORT (default: 8080)
    pub port: u16,

    /// Database file path
    /// Env: DATABASE_PATH (default: "cosmetics.db")
    pub database_path: String,

    /// Static token required by mutating endpoints
    /// Env: API_TOKEN (required)
    pub api_token: String,

    /// Development mode (verbose logging, database path from CONFIG)
    /// Env: DEV_MODE (default: false)
    pub dev_mode: bool,

    /// Request body size limit in bytes
    /// Env: REQUEST_BODY_LIMIT (default: 1048576 = 1MB)
    pub request_body_limit: usize,

    /// Request timeout in seconds
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// How long the `/` snapshot is served before being rebuilt
    /// Env: ENTRIES_CACHE_SECS (default: 5)
    pub entries_cache_ttl: Duration,

    /// Interval after which one rate limit token is replenished
    /// Env: RATE_LIMIT_PERIOD_MS (default: 100)
    pub rate_limit_period_ms: u64,

    /// Rate limit burst size per client IP, 0 disables rate limiting
    /// Env: RATE_LIMIT_BURST (default: 50)
    pub rate_limit_burst: u32,
}

/// The single-variable form: `CONFIG='{"api_token": "...", ...}'`
#[derive(Debug, Deserialize)]
struct ConfigBlob {
    database_path: Option<String>,
    api_token: String,
    #[serde(default)]
    dev_mode: bool,
    port: Option<Port>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Port {
    Number(u16),
    Text(String),
}

impl Config {
    /// Load configuration from environment variables with defaults.
    ///
    /// If `CONFIG` holds a JSON blob it provides the core settings. Outside
    /// dev mode the database location always comes from `DATABASE_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv(); //for debugging mostly
        let defaults = Self::default();

        let mut config = match var("CONFIG") {
            Ok(blob) => Self::from_blob(&blob)?,
            Err(_) => Self {
                port: env_or_default("PORT", defaults.port),
                database_path: env_or_default_string("DATABASE_PATH", &defaults.database_path),
                api_token: var("API_TOKEN").map_err(|_| ConfigError::Missing("API_TOKEN"))?,
                dev_mode: env_or_default("DEV_MODE", false),
                ..defaults
            },
        };

        if config.api_token.is_empty() {
            return Err(ConfigError::Missing("API_TOKEN"));
        }

        config.request_body_limit = env_or_default("REQUEST_BODY_LIMIT", config.request_body_limit);
        config.request_timeout = Duration::from_secs(env_or_default(
            "REQUEST_TIMEOUT_SECS",
            config.request_timeout.as_secs(),
        ));
        config.entries_cache_ttl = Duration::from_secs(env_or_default(
            "ENTRIES_CACHE_SECS",
            config.entries_cache_ttl.as_secs(),
        ));
        config.rate_limit_period_ms = env_or_default("RATE_LIMIT_PERIOD_MS", config.rate_limit_period_ms);
        config.rate_limit_burst = env_or_default("RATE_LIMIT_BURST", config.rate_limit_burst);

        Ok(config)
    }

    fn from_blob(blob: &str) -> Result<Self, ConfigError> {
        let blob: ConfigBlob = serde_json::from_str(blob)?;
        let defaults = Self::default();

        let port = match blob.port {
            None => defaults.port,
            Some(Port::Number(port)) => port,
            Some(Port::Text(text)) => text.parse().map_err(|_| ConfigError::InvalidPort(text))?,
        };

        let database_path = if blob.dev_mode {
            blob.database_path.unwrap_or_else(|| defaults.database_path.clone())
        } else {
            var("DATABASE_PATH").map_err(|_| ConfigError::Missing("DATABASE_PATH"))?
        };

        Ok(Self {
            port,
            database_path,
            api_token: blob.api_token,
            dev_mode: blob.dev_mode,
            ..defaults
        })
    }

    /// Address the HTTP listener binds to
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn rate_limit_enabled(&self) -> bool {
        self.rate_limit_burst > 0 && self.rate_limit_period_ms > 0
    }
}

impl Default for Config {
    /// Create configuration with all default values
    fn default() -> Self {
        Self {
            port: 8080,
            database_path: "cosmetics.db".to_string(),
            api_token: String::new(),
            dev_mode: false,
            request_body_limit: 1024 * 1024, // 1 MB
            request_timeout: Duration::from_secs(30),
            entries_cache_ttl: Duration::from_secs(5),
            rate_limit_period_ms: 100,
            rate_limit_burst: 50,
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
