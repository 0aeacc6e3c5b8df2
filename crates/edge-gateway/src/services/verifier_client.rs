//! Identity adapter HTTP client.
//!
//! The Edge Filter asks the identity adapter whether a bearer credential is
//! valid and which realm roles it carries.
//!
//! # Security
//!
//! - The credential stays a [`SecretString`] until it is placed on the wire
//! - One attempt per request; no retries
//! - The client timeout is no looser than the gateway request timeout
//! - Verifier classifications are passed through untouched

use async_trait::async_trait;
use common::error::AuthError;
use common::jwt::BEARER_SCHEME;
use common::problem::StandardErrorResponse;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

/// Successful verifier answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedRoles {
    /// Realm roles carried by the token.
    pub roles: Vec<String>,

    /// Token expiry (Unix epoch seconds).
    pub expires_at: i64,
}

impl VerifiedRoles {
    /// Whether the role set contains `role` exactly.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Token verification as seen from the gateway.
#[async_trait]
pub trait RoleVerifier: Send + Sync {
    /// Verify a bearer credential.
    ///
    /// # Errors
    ///
    /// - The verifier's classification when it rejects the token
    /// - `AuthError::CommunicationFailure` when the verifier cannot be asked
    async fn verify(
        &self,
        credential: &SecretString,
        required_role: &str,
    ) -> Result<VerifiedRoles, AuthError>;
}

/// [`RoleVerifier`] backed by the identity adapter's `GET /roles`.
#[derive(Clone)]
pub struct HttpRoleVerifier {
    /// HTTP client with configured timeouts.
    client: Client,

    /// `GET /roles` endpoint URL.
    roles_url: String,
}

impl HttpRoleVerifier {
    /// Create a new verifier client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Identity adapter base URL (e.g., "http://localhost:8081")
    /// * `timeout` - Bound on one verifier call
    ///
    /// # Errors
    ///
    /// Returns the builder error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            roles_url: format!("{}/roles", base_url.trim_end_matches('/')),
        })
    }

    /// Map a verifier response to roles or a classification.
    async fn handle_response(response: reqwest::Response) -> Result<VerifiedRoles, AuthError> {
        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(|e| {
                warn!(target: "gateway.services.verifier_client", error = %e, "Failed to parse verifier response");
                AuthError::CommunicationFailure("invalid response from identity adapter".to_string())
            });
        }

        let problem = response.json::<StandardErrorResponse>().await.ok();
        match problem.as_ref().and_then(AuthError::from_problem) {
            Some(error) => Err(error),
            None => {
                warn!(target: "gateway.services.verifier_client", status = %status, "Unexpected verifier response");
                Err(AuthError::CommunicationFailure(format!(
                    "identity adapter returned {}",
                    status.as_u16()
                )))
            }
        }
    }
}

#[async_trait]
impl RoleVerifier for HttpRoleVerifier {
    #[instrument(skip_all, fields(required_role = %required_role))]
    async fn verify(
        &self,
        credential: &SecretString,
        required_role: &str,
    ) -> Result<VerifiedRoles, AuthError> {
        let response = self
            .client
            .get(&self.roles_url)
            .query(&[("required_role", required_role)])
            .header(
                reqwest::header::AUTHORIZATION,
                format!("{BEARER_SCHEME} {}", credential.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| {
                warn!(
                    target: "gateway.services.verifier_client",
                    error = %e,
                    timeout = e.is_timeout(),
                    "Verifier request failed"
                );
                let cause = if e.is_timeout() {
                    "identity adapter timed out"
                } else {
                    "identity adapter is unreachable"
                };
                AuthError::CommunicationFailure(cause.to_string())
            })?;

        Self::handle_response(response).await
    }
}

/// Mock verifier module for testing.
///
/// This module provides a mock [`RoleVerifier`] for use in tests.
pub mod mock {

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock verifier for unit testing.
    pub struct MockRoleVerifier {
        /// Result returned on every call.
        result: Result<VerifiedRoles, AuthError>,
        /// Number of calls made.
        call_count: AtomicUsize,
        /// Required role passed on the last call.
        last_required_role: Mutex<Option<String>>,
    }

    impl MockRoleVerifier {
        /// Create a mock that accepts every token with the given roles.
        pub fn granting(roles: &[&str]) -> Self {
            Self::with_result(Ok(VerifiedRoles {
                roles: roles.iter().map(ToString::to_string).collect(),
                expires_at: 4_102_444_800,
            }))
        }

        /// Create a mock that rejects every token.
        pub fn rejecting(error: AuthError) -> Self {
            Self::with_result(Err(error))
        }

        fn with_result(result: Result<VerifiedRoles, AuthError>) -> Self {
            Self {
                result,
                call_count: AtomicUsize::new(0),
                last_required_role: Mutex::new(None),
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Required role passed on the last call.
        pub fn last_required_role(&self) -> Option<String> {
            self.last_required_role
                .lock()
                .ok()
                .and_then(|role| role.clone())
        }
    }

    #[async_trait]
    impl RoleVerifier for MockRoleVerifier {
        async fn verify(
            &self,
            _credential: &SecretString,
            required_role: &str,
        ) -> Result<VerifiedRoles, AuthError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last_required_role.lock() {
                *last = Some(required_role.to_string());
            }
            self.result.clone()
        }
    }
}
