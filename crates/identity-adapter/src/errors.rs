//! Identity adapter error responses.
//!
//! Every failure is an [`AuthError`] classification rendered as a
//! [`StandardErrorResponse`] body. The `instance` field carries the path of
//! the rejected request. Details never include the raw token.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::error::AuthError;

/// A classified failure bound to the request it rejected.
#[derive(Debug)]
pub struct ApiError {
    /// The classification.
    pub error: AuthError,

    /// Request path used as the problem `instance`.
    pub instance: String,
}

impl ApiError {
    pub fn new(error: AuthError, instance: impl Into<String>) -> Self {
        Self {
            error,
            instance: instance.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);

        if let AuthError::CommunicationFailure(cause) = &self.error {
            tracing::warn!(target: "adapter.errors", cause = %cause, "Key source unavailable");
        }

        let problem = self.error.to_problem(&self.instance);
        let mut response = (status, Json(problem)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"paymentchain\", error=\"invalid_token\""),
            );
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_into_response_expired() {
        let response = ApiError::new(AuthError::Expired, "/roles").into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("Bearer realm=\"paymentchain\""));

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["type"], "/errors/authentication/expired");
        assert_eq!(body["title"], "Token expired");
        assert_eq!(body["code"], "error-1006");
        assert_eq!(body["detail"], "The access token has expired");
        assert_eq!(body["instance"], "/roles");
    }

    #[tokio::test]
    async fn test_into_response_missing_role_is_forbidden() {
        let response = ApiError::new(
            AuthError::MissingRequiredRole("Partners".to_string()),
            "/roles",
        )
        .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["code"], "error-1008");
        assert_eq!(body["detail"], "Role Partners missing");
    }

    #[tokio::test]
    async fn test_into_response_communication_failure_is_bad_gateway() {
        let response = ApiError::new(
            AuthError::CommunicationFailure("JWKS endpoint returned 503".to_string()),
            "/roles",
        )
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["code"], "error-1024");
        assert_eq!(body["title"], "Connection error");
    }
}
