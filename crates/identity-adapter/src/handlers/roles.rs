//! Token verification endpoints.
//!
//! - `GET /roles` verifies the bearer token and returns its realm roles
//! - `GET /valid` verifies the bearer token and reports validity
//!
//! Both read the credential from the `Authorization` header. A bare token
//! without the `Bearer` scheme is accepted here; the edge gateway enforces the
//! strict header shape before it calls in.

use crate::errors::ApiError;
use crate::routes::AppState;
use axum::extract::{Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, Uri};
use axum::Json;
use common::error::AuthError;
use common::secret::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Query parameters for `GET /roles`.
#[derive(Debug, Default, Deserialize)]
pub struct RolesQuery {
    /// Role the token must carry. Absent or empty means no role policy.
    pub required_role: Option<String>,
}

/// Response body of `GET /roles`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolesResponse {
    /// Realm roles, in token order.
    pub roles: Vec<String>,

    /// Token expiry (Unix epoch seconds).
    pub expires_at: i64,
}

/// Response body of `GET /valid`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidResponse {
    pub is_valid: String,
}

/// Handler for GET /roles
#[instrument(skip_all, name = "adapter.roles")]
pub async fn get_roles(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Query(query): Query<RolesQuery>,
    headers: HeaderMap,
) -> Result<Json<RolesResponse>, ApiError> {
    let required_role = query
        .required_role
        .as_deref()
        .map(str::trim)
        .filter(|role| !role.is_empty());

    let credential = credential(&headers).map_err(|e| ApiError::new(e, uri.path()))?;

    let token = state
        .verifier
        .verify(credential.expose_secret(), required_role)
        .await
        .map_err(|e| ApiError::new(e, uri.path()))?;

    Ok(Json(RolesResponse {
        roles: token.roles,
        expires_at: token.expires_at,
    }))
}

/// Handler for GET /valid
#[instrument(skip_all, name = "adapter.valid")]
pub async fn get_valid(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<ValidResponse>, ApiError> {
    let credential = credential(&headers).map_err(|e| ApiError::new(e, uri.path()))?;

    state
        .verifier
        .verify(credential.expose_secret(), None)
        .await
        .map_err(|e| ApiError::new(e, uri.path()))?;

    Ok(Json(ValidResponse {
        is_valid: "true".to_string(),
    }))
}

/// Read the `Authorization` header value.
fn credential(headers: &HeaderMap) -> Result<SecretString, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_credential_missing_header() {
        assert_eq!(
            credential(&HeaderMap::new()).unwrap_err(),
            AuthError::MissingHeader
        );
    }

    #[test]
    fn test_credential_non_ascii_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_bytes(b"Bearer \xff").unwrap());

        assert_eq!(credential(&headers).unwrap_err(), AuthError::MalformedHeader);
    }

    #[test]
    fn test_credential_passes_value_through() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));

        assert_eq!(credential(&headers).unwrap().expose_secret(), "Bearer abc.def.ghi");
    }

    #[test]
    fn test_roles_response_shape() {
        let body = serde_json::to_value(RolesResponse {
            roles: vec!["Partners".to_string()],
            expires_at: 1_700_000_000,
        })
        .unwrap();

        assert_eq!(body, serde_json::json!({"roles": ["Partners"], "expires_at": 1_700_000_000}));
    }
}
