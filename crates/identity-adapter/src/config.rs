//! Identity adapter configuration.
//!
//! Configuration is loaded from environment variables. Durations are given in
//! whole seconds and validated at startup so that an outbound JWKS fetch can
//! never outlive the request that triggered it.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default JWKS cache entry lifetime (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default minimum interval between two fetches triggered for the same cause.
pub const DEFAULT_JWKS_MIN_REFRESH_SECONDS: u64 = 10;

/// Default timeout for one JWKS fetch.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Default inbound request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Identity adapter configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8081").
    pub bind_address: String,

    /// URL of the identity provider's JWKS document.
    pub jwks_url: String,

    /// How long a resolved signing key is served from cache.
    pub jwks_cache_ttl: Duration,

    /// Minimum spacing between fetches caused by unknown key ids or
    /// signature failures.
    pub jwks_min_refresh_interval: Duration,

    /// Timeout for a single JWKS fetch.
    pub jwks_fetch_timeout: Duration,

    /// Inbound request timeout.
    pub request_timeout: Duration,

    /// When set, the `iss` claim must equal this value.
    pub expected_issuer: Option<String>,

    /// Connection drain period on shutdown.
    pub drain_period: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("jwks_url", &self.jwks_url)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_min_refresh_interval", &self.jwks_min_refresh_interval)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("expected_issuer", &self.expected_issuer)
            .field("drain_period", &self.drain_period)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Inconsistent timeout configuration: {0}")]
    InconsistentTimeouts(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwks_url = vars
            .get("JWKS_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("JWKS_URL".to_string()))?
            .clone();

        let jwks_cache_ttl =
            parse_seconds(vars, "JWKS_CACHE_TTL_SECONDS", DEFAULT_JWKS_CACHE_TTL_SECONDS)?;
        let jwks_min_refresh_interval = parse_seconds(
            vars,
            "JWKS_MIN_REFRESH_SECONDS",
            DEFAULT_JWKS_MIN_REFRESH_SECONDS,
        )?;
        let jwks_fetch_timeout = parse_seconds(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
        )?;
        let request_timeout =
            parse_seconds(vars, "REQUEST_TIMEOUT_SECONDS", DEFAULT_REQUEST_TIMEOUT_SECONDS)?;

        if jwks_min_refresh_interval > jwks_cache_ttl {
            return Err(ConfigError::InconsistentTimeouts(format!(
                "JWKS_MIN_REFRESH_SECONDS ({}) must not exceed JWKS_CACHE_TTL_SECONDS ({})",
                jwks_min_refresh_interval.as_secs(),
                jwks_cache_ttl.as_secs()
            )));
        }

        // An outbound fetch must never be looser than the inbound request
        if jwks_fetch_timeout > request_timeout {
            return Err(ConfigError::InconsistentTimeouts(format!(
                "JWKS_FETCH_TIMEOUT_SECONDS ({}) must not exceed REQUEST_TIMEOUT_SECONDS ({})",
                jwks_fetch_timeout.as_secs(),
                request_timeout.as_secs()
            )));
        }

        let expected_issuer = vars
            .get("EXPECTED_ISSUER")
            .filter(|v| !v.trim().is_empty())
            .cloned();

        let drain_period = vars
            .get("DRAIN_SECONDS")
            .and_then(|s| s.parse().ok())
            .map_or(Duration::ZERO, Duration::from_secs);

        Ok(Config {
            bind_address,
            jwks_url,
            jwks_cache_ttl,
            jwks_min_refresh_interval,
            jwks_fetch_timeout,
            request_timeout,
            expected_issuer,
            drain_period,
        })
    }
}

/// Parse a strictly positive number of seconds, falling back to `default`.
fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(Duration::from_secs(default));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidDuration(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(Duration::from_secs(value))
}
