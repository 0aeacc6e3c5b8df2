//! Edge Filter.
//!
//! Every downstream request passes through [`edge_filter`] before it is
//! forwarded. The filter validates the `Authorization` header shape, asks the
//! identity adapter to verify the credential, enforces the required role and
//! then either runs the next stage with the untouched request or rejects it.
//!
//! # Authorization Header Format
//!
//! ```text
//! Authorization: Bearer <token>
//! ```
//!
//! The scheme is case-sensitive and is separated from the token by exactly
//! one space. Any other whitespace makes the header malformed.

use crate::errors::GatewayError;
use crate::observability::metrics::{record_authorization_decision, record_verifier_call};
use crate::services::RoleVerifier;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::error::AuthError;
use common::jwt::parse_bearer;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// State for the Edge Filter.
#[derive(Clone)]
pub struct EdgeFilterState {
    /// Identity adapter client.
    pub verifier: Arc<dyn RoleVerifier>,

    /// Role every forwarded request must carry.
    pub required_role: String,
}

/// Outcome of the Edge Filter for one request.
///
/// Constructed once per request and never altered afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    allowed: bool,
    reason: Option<AuthError>,
    required_role: String,
}

impl AuthorizationDecision {
    fn allow(required_role: &str) -> Self {
        Self {
            allowed: true,
            reason: None,
            required_role: required_role.to_string(),
        }
    }

    fn deny(reason: AuthError, required_role: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            required_role: required_role.to_string(),
        }
    }

    /// Whether the request may be forwarded.
    pub fn allowed(&self) -> bool {
        self.allowed
    }

    /// Why the request was denied. `None` when allowed.
    pub fn reason(&self) -> Option<&AuthError> {
        self.reason.as_ref()
    }

    /// The role that was required.
    pub fn required_role(&self) -> &str {
        &self.required_role
    }
}

/// Decide whether a request with these headers may be forwarded.
///
/// Makes at most one verifier call, and none when the header is absent or
/// malformed.
pub async fn authorize(state: &EdgeFilterState, headers: &HeaderMap) -> AuthorizationDecision {
    let required_role = state.required_role.as_str();

    let Some(value) = headers.get(AUTHORIZATION) else {
        return AuthorizationDecision::deny(AuthError::MissingHeader, required_role);
    };

    let credential = match value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)
        .and_then(parse_bearer)
    {
        Ok(credential) => credential,
        Err(error) => return AuthorizationDecision::deny(error, required_role),
    };

    let start = Instant::now();
    let result = state.verifier.verify(&credential, required_role).await;

    let status = match &result {
        Ok(_) => "success",
        Err(AuthError::CommunicationFailure(_)) => "unavailable",
        Err(_) => "rejected",
    };
    record_verifier_call(status, start.elapsed());

    match result {
        Ok(verified) if verified.has_role(required_role) => {
            AuthorizationDecision::allow(required_role)
        }
        Ok(_) => AuthorizationDecision::deny(
            AuthError::MissingRequiredRole(required_role.to_string()),
            required_role,
        ),
        Err(error) => AuthorizationDecision::deny(error, required_role),
    }
}

/// Edge Filter middleware.
///
/// # Response
///
/// - 401 with `WWW-Authenticate` for authentication failures
/// - 403 when the required role is missing
/// - 502 when the identity adapter cannot be reached
/// - Otherwise the next stage's response, with the request passed through untouched
#[instrument(skip_all, name = "gateway.filter", fields(path = %request.uri().path()))]
pub async fn edge_filter(
    State(state): State<Arc<EdgeFilterState>>,
    request: Request,
    next: Next,
) -> Response {
    let decision = authorize(&state, request.headers()).await;

    match decision.reason() {
        None => {
            tracing::debug!(
                target: "gateway.filter",
                required_role = decision.required_role(),
                "Request authorized"
            );
            record_authorization_decision("allowed", "none");
            next.run(request).await
        }
        Some(reason) => {
            if let AuthError::CommunicationFailure(cause) = reason {
                tracing::warn!(
                    target: "gateway.filter",
                    cause = %cause,
                    "Identity adapter unavailable, request rejected"
                );
            } else {
                tracing::info!(
                    target: "gateway.filter",
                    reason = reason.kind(),
                    required_role = decision.required_role(),
                    "Request rejected"
                );
            }
            record_authorization_decision("denied", reason.kind());
            GatewayError::rejected(reason.clone(), request.uri().path()).into_response()
        }
    }
}
