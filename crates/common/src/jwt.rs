//! JWT and bearer-header utilities shared across services.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - `Authorization` header validation (`Bearer <token>`)
//! - Key ID extraction from unverified JWT headers
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing read from an unverified header is trusted beyond key lookup
//! - Error messages are generic; raw tokens never reach logs
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_unverified_header, parse_bearer};
//!
//! let token = parse_bearer(header_value)?;
//! let header = decode_unverified_header(token.expose_secret())?;
//! let key = key_cache.get_key(&header.kid).await?;
//! ```

use crate::error::AuthError;
use crate::secret::SecretString;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any base64 decoding or
/// cryptographic work. Typical identity-provider access tokens are 1-2KB.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// The only accepted authorization scheme (case-sensitive).
pub const BEARER_SCHEME: &str = "Bearer";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while reading an unverified JWT header.
///
/// Messages are intentionally generic. Detailed information is logged at
/// debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is malformed")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is malformed")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is malformed")]
    MissingKid,
}

impl From<JwtValidationError> for AuthError {
    fn from(_: JwtValidationError) -> Self {
        AuthError::MalformedToken
    }
}

/// Fields read from the unverified JOSE header.
#[derive(Debug, Clone, Deserialize)]
pub struct UnverifiedHeader {
    /// Declared signing algorithm.
    pub alg: String,

    /// Key ID.
    pub kid: String,
}

// =============================================================================
// Functions
// =============================================================================

/// Validate an `Authorization` header value and return the bearer credential.
///
/// The value must be the literal `Bearer`, one space, then a non-empty token
/// containing no whitespace.
///
/// # Errors
///
/// Returns `AuthError::MalformedHeader` for any other shape.
pub fn parse_bearer(header_value: &str) -> Result<SecretString, AuthError> {
    let mut segments = header_value.split(' ');

    match (segments.next(), segments.next(), segments.next()) {
        (Some(BEARER_SCHEME), Some(token), None)
            if !token.is_empty() && !token.contains(char::is_whitespace) =>
        {
            Ok(SecretString::from(token))
        }
        (scheme, _, _) => {
            tracing::debug!(
                target: "common.jwt",
                scheme_present = scheme.is_some(),
                "Rejected Authorization header with unexpected structure"
            );
            Err(AuthError::MalformedHeader)
        }
    }
}

/// Strip an optional `Bearer` scheme and surrounding whitespace.
///
/// Lenient counterpart of [`parse_bearer`] used by the verifier endpoint,
/// which also accepts a bare token.
#[must_use]
pub fn strip_bearer_scheme(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed
        .strip_prefix(BEARER_SCHEME)
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        .map_or(trimmed, str::trim)
}

/// Read the JOSE header of a JWT without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - The returned values MUST only be used to select a key from a trusted JWKS
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON or no `alg`
/// - `MissingKid` - Header has no non-empty string `kid`
pub fn decode_unverified_header(token: &str) -> Result<UnverifiedHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MalformedToken)?;

    // Empty kid is rejected along with a missing one
    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(UnverifiedHeader { alg, kid })
}

// =============================================================================
// Tests
// =============================================================================
