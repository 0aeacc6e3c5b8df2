//! Edge gateway error responses.
//!
//! Authentication rejections carry the [`AuthError`] classification
//! unchanged. Routing failures use gateway-specific codes. Every response body
//! is a [`StandardErrorResponse`] whose `instance` is the request path.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::error::AuthError;
use common::problem::StandardErrorResponse;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The Edge Filter rejected the request.
    #[error("{error}")]
    Rejected { error: AuthError, instance: String },

    /// No upstream route matches the path.
    #[error("No route for {instance}")]
    RouteNotFound { instance: String },

    /// The upstream service could not be reached.
    #[error("Upstream unavailable: {cause}")]
    UpstreamUnavailable { cause: String, instance: String },

    /// The request body exceeds the relay limit.
    #[error("Request body too large")]
    PayloadTooLarge { instance: String },
}

impl GatewayError {
    pub fn rejected(error: AuthError, instance: impl Into<String>) -> Self {
        GatewayError::Rejected {
            error,
            instance: instance.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Rejected { error, .. } => {
                StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::UNAUTHORIZED)
            }
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn to_problem(&self) -> StandardErrorResponse {
        match self {
            GatewayError::Rejected { error, instance } => error.to_problem(instance),
            GatewayError::RouteNotFound { instance } => StandardErrorResponse::new(
                "Route not found",
                "error-1404",
                "No downstream service is mapped to this path",
            )
            .with_type("/errors/routing/not-found")
            .with_instance(instance),
            GatewayError::UpstreamUnavailable { cause, instance } => {
                AuthError::CommunicationFailure(cause.clone()).to_problem(instance)
            }
            GatewayError::PayloadTooLarge { instance } => StandardErrorResponse::new(
                "Payload too large",
                "error-1413",
                "The request body exceeds the gateway limit",
            )
            .with_type("/errors/routing/payload-too-large")
            .with_instance(instance),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.to_problem())).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"paymentchain\", error=\"invalid_token\""),
            );
        }

        response
    }
}
