//! Token Verifier.
//!
//! Verifies bearer tokens against signing keys from the [`KeyCache`] and reads
//! their expiry and realm roles.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The unverified header is only used to select a key and an algorithm
//! - The header algorithm must be allowed by the resolved key; `none` and HMAC
//!   algorithms never verify
//! - No claim is read before the signature has been verified
//! - Raw tokens never appear in logs or errors

use crate::auth::claims::{self, DecodedToken};
use crate::auth::jwks::{KeyCache, KeyFamily, SigningKey};
use crate::observability::metrics::record_token_verification;
use common::error::AuthError;
use common::jwt::{decode_unverified_header, strip_bearer_scheme};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Verifies bearer tokens and extracts their realm roles.
pub struct TokenVerifier {
    key_cache: Arc<KeyCache>,

    /// When set, `iss` must equal this value.
    expected_issuer: Option<String>,
}

impl TokenVerifier {
    /// Create a new verifier.
    ///
    /// # Arguments
    ///
    /// * `key_cache` - Source of signing keys
    /// * `expected_issuer` - Required `iss` value, if any
    pub fn new(key_cache: Arc<KeyCache>, expected_issuer: Option<String>) -> Self {
        Self {
            key_cache,
            expected_issuer,
        }
    }

    /// Verify a credential and optionally require a realm role.
    ///
    /// # Checks, in order
    ///
    /// 1. Strip an optional `Bearer` scheme
    /// 2. Size and structure check, read `kid` from the unverified header
    /// 3. Resolve the signing key
    /// 4. Verify the signature with the header algorithm
    /// 5. `exp` must be after the current time
    /// 6. `iss` must match, when an issuer is configured
    /// 7. `realm_access.roles` must be a list of strings
    /// 8. `required_role` must be among the roles, when given
    ///
    /// # Errors
    ///
    /// The first failing check determines the [`AuthError`].
    #[instrument(skip_all, fields(required_role = required_role.unwrap_or("")))]
    pub async fn verify(
        &self,
        credential: &str,
        required_role: Option<&str>,
    ) -> Result<DecodedToken, AuthError> {
        let start = Instant::now();
        let result = self.verify_inner(credential, required_role).await;

        match &result {
            Ok(token) => {
                tracing::debug!(
                    target: "adapter.auth.jwt",
                    kid = %token.kid,
                    role_count = token.roles.len(),
                    "Token verified"
                );
                record_token_verification("success", "none", start.elapsed());
            }
            Err(e) => {
                tracing::debug!(target: "adapter.auth.jwt", error_kind = e.kind(), "Token rejected");
                record_token_verification("failure", e.kind(), start.elapsed());
            }
        }

        result
    }

    async fn verify_inner(
        &self,
        credential: &str,
        required_role: Option<&str>,
    ) -> Result<DecodedToken, AuthError> {
        let token = strip_bearer_scheme(credential);

        let header = decode_unverified_header(token).map_err(|e| {
            tracing::debug!(target: "adapter.auth.jwt", error = ?e, "Token header rejected");
            AuthError::from(e)
        })?;

        let key = self.key_cache.get_key(&header.kid).await?;

        let payload = match verify_signature(token, &header.alg, &key) {
            Ok(payload) => payload,
            Err(AuthError::InvalidSignature) => {
                // A rotated key may have been republished under the same kid
                self.key_cache.invalidate_stale(&header.kid);
                return Err(AuthError::InvalidSignature);
            }
            Err(e) => return Err(e),
        };

        let expires_at = claims::expiry(&payload)?;
        check_expiry_at(expires_at, chrono::Utc::now().timestamp())?;

        let issuer = claims::optional_string(&payload, "iss");
        if let Some(expected) = &self.expected_issuer {
            if issuer.as_deref() != Some(expected.as_str()) {
                tracing::debug!(target: "adapter.auth.jwt", "Token issuer mismatch");
                return Err(AuthError::MissingOrInvalidClaim("iss".to_string()));
            }
        }

        let decoded = DecodedToken {
            kid: header.kid,
            issuer,
            subject: claims::optional_string(&payload, "sub"),
            expires_at,
            roles: claims::realm_roles(&payload)?,
        };

        match required_role {
            Some(role) if !decoded.has_role(role) => {
                Err(AuthError::MissingRequiredRole(role.to_string()))
            }
            _ => Ok(decoded),
        }
    }
}

/// Verify the signature and return the payload without any claim checks.
fn verify_signature(token: &str, declared_alg: &str, key: &SigningKey) -> Result<Value, AuthError> {
    let alg = Algorithm::from_str(declared_alg).map_err(|_| {
        tracing::warn!(target: "adapter.auth.jwt", kid = %key.kid(), "Unsupported token algorithm");
        AuthError::InvalidSignature
    })?;

    if KeyFamily::of(alg).is_none() || !key.accepts(alg) {
        tracing::warn!(
            target: "adapter.auth.jwt",
            kid = %key.kid(),
            alg = ?alg,
            "Token algorithm not allowed for key"
        );
        return Err(AuthError::InvalidSignature);
    }

    let mut validation = Validation::new(alg);
    // Claims are checked after verification, in a fixed order
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation.leeway = 0;

    decode::<Value>(token, key.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(target: "adapter.auth.jwt", kid = %key.kid(), error = %e, "Token verification failed");
            match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidKeyFormat
                | ErrorKind::Crypto(_) => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            }
        })
}

/// A token is expired once `now` reaches `exp`.
pub(crate) fn check_expiry_at(expires_at: i64, now: i64) -> Result<(), AuthError> {
    if expires_at <= now {
        return Err(AuthError::Expired);
    }
    Ok(())
}
