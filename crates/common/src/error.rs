//! Authentication and authorization error taxonomy.
//!
//! Every failure in the bearer-token pipeline is classified into exactly one
//! [`AuthError`] variant at the point of detection. The classification is
//! carried across the gateway/adapter boundary inside a
//! [`StandardErrorResponse`] and recovered with [`AuthError::from_problem`],
//! so the gateway can return a verifier classification untouched.
//!
//! Detail strings never contain the raw token.

use crate::problem::StandardErrorResponse;
use thiserror::Error;

/// Classified failure of the authentication pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header on the request.
    #[error("Missing Authorization header")]
    MissingHeader,

    /// `Authorization` header is not `Bearer <token>`.
    #[error("Bad Authorization structure")]
    MalformedHeader,

    /// Credential is not a decodable JWT (structure, size, or missing `kid`).
    #[error("The access token is malformed")]
    MalformedToken,

    /// No signing key could be resolved for the token's key id.
    #[error("No signing key found for the access token")]
    KeyNotFound,

    /// Signature does not verify against the resolved key.
    #[error("The access token signature is invalid")]
    InvalidSignature,

    /// Expiry is at or before the verification instant.
    #[error("The access token has expired")]
    Expired,

    /// A required claim is absent or has the wrong shape.
    #[error("Claim '{0}' is missing or invalid")]
    MissingOrInvalidClaim(String),

    /// The verified role set lacks the required role.
    #[error("Role {0} missing")]
    MissingRequiredRole(String),

    /// The verifier or key source could not be reached.
    #[error("Communication Error: {0}")]
    CommunicationFailure(String),
}

impl AuthError {
    /// Application-specific error code carried in the problem body.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "error-1001",
            AuthError::MalformedHeader => "error-1002",
            AuthError::MalformedToken => "error-1003",
            AuthError::KeyNotFound => "error-1004",
            AuthError::InvalidSignature => "error-1005",
            AuthError::Expired => "error-1006",
            AuthError::MissingOrInvalidClaim(_) => "error-1007",
            AuthError::MissingRequiredRole(_) => "error-1008",
            AuthError::CommunicationFailure(_) => "error-1024",
        }
    }

    /// Problem type URI reference.
    #[must_use]
    pub fn problem_type(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "/errors/authentication/missing-header",
            AuthError::MalformedHeader => "/errors/authentication/malformed-header",
            AuthError::MalformedToken => "/errors/authentication/malformed-token",
            AuthError::KeyNotFound => "/errors/authentication/key-not-found",
            AuthError::InvalidSignature => "/errors/authentication/invalid-signature",
            AuthError::Expired => "/errors/authentication/expired",
            AuthError::MissingOrInvalidClaim(_) => "/errors/authentication/invalid-claim",
            AuthError::MissingRequiredRole(_) => "/errors/authorization/missing-role",
            AuthError::CommunicationFailure(_) => "/errors/communication",
        }
    }

    /// Short, human-readable summary of the problem type.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "Missing Authorization header",
            AuthError::MalformedHeader => "Bad Authorization structure",
            AuthError::MalformedToken => "Malformed token",
            AuthError::KeyNotFound => "Signing key not found",
            AuthError::InvalidSignature => "Invalid token signature",
            AuthError::Expired => "Token expired",
            AuthError::MissingOrInvalidClaim(_) => "Invalid token claims",
            AuthError::MissingRequiredRole(_) => "Missing required role",
            AuthError::CommunicationFailure(_) => "Connection error",
        }
    }

    /// HTTP status code for this classification.
    ///
    /// Authentication failures are 401, a missing role is 403 and an
    /// unreachable collaborator is 502.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingRequiredRole(_) => 403,
            AuthError::CommunicationFailure(_) => 502,
            _ => 401,
        }
    }

    /// Short label for logs and metrics (bounded cardinality).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "expired",
            AuthError::MissingOrInvalidClaim(_) => "invalid_claim",
            AuthError::MissingRequiredRole(_) => "missing_required_role",
            AuthError::CommunicationFailure(_) => "communication_failure",
        }
    }

    /// Builds the problem body for this error at the given occurrence URI.
    #[must_use]
    pub fn to_problem(&self, instance: &str) -> StandardErrorResponse {
        StandardErrorResponse::new(self.title(), self.code(), self.to_string())
            .with_type(self.problem_type())
            .with_instance(instance)
    }

    /// Recovers the classification from a problem body produced by [`to_problem`].
    ///
    /// Returns `None` for bodies that do not carry a known authentication code.
    ///
    /// [`to_problem`]: AuthError::to_problem
    #[must_use]
    pub fn from_problem(problem: &StandardErrorResponse) -> Option<Self> {
        let error = match problem.code.as_str() {
            "error-1001" => AuthError::MissingHeader,
            "error-1002" => AuthError::MalformedHeader,
            "error-1003" => AuthError::MalformedToken,
            "error-1004" => AuthError::KeyNotFound,
            "error-1005" => AuthError::InvalidSignature,
            "error-1006" => AuthError::Expired,
            "error-1007" => AuthError::MissingOrInvalidClaim(
                quoted_argument(&problem.detail).unwrap_or_default(),
            ),
            "error-1008" => AuthError::MissingRequiredRole(
                problem
                    .detail
                    .strip_prefix("Role ")
                    .and_then(|rest| rest.strip_suffix(" missing"))
                    .unwrap_or_default()
                    .to_string(),
            ),
            "error-1024" => AuthError::CommunicationFailure(
                problem
                    .detail
                    .strip_prefix("Communication Error: ")
                    .unwrap_or(&problem.detail)
                    .to_string(),
            ),
            _ => return None,
        };
        Some(error)
    }
}

/// Returns the text between the first pair of single quotes.
fn quoted_argument(detail: &str) -> Option<String> {
    let (_, rest) = detail.split_once('\'')?;
    let (arg, _) = rest.split_once('\'')?;
    Some(arg.to_string())
}
