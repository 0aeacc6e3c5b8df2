//! Liveness handler.

use axum::Json;
use serde::{Deserialize, Serialize};

/// Liveness response body.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness probe handler.
///
/// Does NOT check the identity provider; a JWKS outage surfaces on `/roles`
/// as a communication failure, not as a dead process.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_reports_healthy() {
        let Json(body) = health_check().await;
        assert_eq!(body.status, "healthy");
    }
}
