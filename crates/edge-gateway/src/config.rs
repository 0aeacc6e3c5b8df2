//! Edge gateway configuration.
//!
//! Configuration is loaded from environment variables. The verifier call
//! timeout is validated against the inbound request timeout so that an
//! outbound call can never outlive the request waiting on it.

use crate::services::proxy::{UpstreamRoutes, DEFAULT_UPSTREAM_ROUTES};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default identity adapter base URL.
pub const DEFAULT_VERIFIER_URL: &str = "http://localhost:8081";

/// Role every forwarded request must carry.
pub const DEFAULT_REQUIRED_ROLE: &str = "Partners";

/// Default timeout for one verifier call.
pub const DEFAULT_VERIFIER_TIMEOUT_SECONDS: u64 = 5;

/// Default inbound request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default largest relayed request body (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default connection drain period on shutdown.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Edge gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Identity adapter base URL.
    pub verifier_url: String,

    /// Role required on every forwarded request.
    pub required_role: String,

    /// Timeout for a single verifier call.
    pub verifier_timeout: Duration,

    /// Inbound request timeout. Also bounds upstream calls.
    pub request_timeout: Duration,

    /// First path segment to upstream base URL.
    pub upstream_routes: UpstreamRoutes,

    /// Largest request body relayed upstream.
    pub max_body_bytes: usize,

    /// Connection drain period on shutdown.
    pub drain_period: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("verifier_url", &self.verifier_url)
            .field("required_role", &self.required_role)
            .field("verifier_timeout", &self.verifier_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("upstream_routes", &self.upstream_routes)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("drain_period", &self.drain_period)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Inconsistent timeout configuration: {0}")]
    InconsistentTimeouts(String),

    #[error("Invalid upstream routes: {0}")]
    InvalidRoutes(String),
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

        let verifier_url = vars
            .get("VERIFIER_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_VERIFIER_URL.to_string());
        if !(verifier_url.starts_with("http://") || verifier_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(format!(
                "VERIFIER_URL must be an http(s) URL, got '{verifier_url}'"
            )));
        }

        let required_role = vars
            .get("REQUIRED_ROLE")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| DEFAULT_REQUIRED_ROLE.to_string());
        if required_role.is_empty() {
            return Err(ConfigError::InvalidValue(
                "REQUIRED_ROLE must not be empty".to_string(),
            ));
        }

        let verifier_timeout = parse_seconds(
            vars,
            "VERIFIER_TIMEOUT_SECONDS",
            DEFAULT_VERIFIER_TIMEOUT_SECONDS,
        )?;
        let request_timeout =
            parse_seconds(vars, "REQUEST_TIMEOUT_SECONDS", DEFAULT_REQUEST_TIMEOUT_SECONDS)?;

        // An outbound call must never be looser than the inbound request
        if verifier_timeout > request_timeout {
            return Err(ConfigError::InconsistentTimeouts(format!(
                "VERIFIER_TIMEOUT_SECONDS ({}) must not exceed REQUEST_TIMEOUT_SECONDS ({})",
                verifier_timeout.as_secs(),
                request_timeout.as_secs()
            )));
        }

        let upstream_routes = vars
            .get("UPSTREAM_ROUTES")
            .map_or(DEFAULT_UPSTREAM_ROUTES, String::as_str)
            .parse::<UpstreamRoutes>()
            .map_err(ConfigError::InvalidRoutes)?;

        let max_body_bytes = match vars.get("MAX_BODY_BYTES") {
            None => DEFAULT_MAX_BODY_BYTES,
            Some(value) => value.parse().map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "MAX_BODY_BYTES must be a valid integer, got '{value}': {e}"
                ))
            })?,
        };

        let drain_period = vars
            .get("DRAIN_SECONDS")
            .and_then(|s| s.parse().ok())
            .map_or(Duration::from_secs(DEFAULT_DRAIN_SECONDS), Duration::from_secs);

        Ok(Config {
            bind_address,
            verifier_url,
            required_role,
            verifier_timeout,
            request_timeout,
            upstream_routes,
            max_body_bytes,
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
