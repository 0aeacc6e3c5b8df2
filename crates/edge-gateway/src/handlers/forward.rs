//! Fallback handler relaying authorized requests downstream.

use crate::errors::GatewayError;
use crate::services::Forwarder;
use axum::extract::{Request, State};
use axum::response::Response;
use std::sync::Arc;

/// Relay the request to the upstream its path maps to.
///
/// Only reached after the Edge Filter allowed the request.
pub async fn forward(
    State(forwarder): State<Arc<Forwarder>>,
    request: Request,
) -> Result<Response, GatewayError> {
    forwarder.forward(request).await
}
