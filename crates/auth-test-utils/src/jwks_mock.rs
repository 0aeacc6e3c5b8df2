//! Mocked identity provider JWKS endpoint
//!
//! Starts a wiremock server publishing a JWKS document at [`JWKS_PATH`].

use crate::crypto_fixtures::jwks_json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mocked JWKS is served under, as published by Keycloak.
pub const JWKS_PATH: &str = "/realms/paymentchain/protocol/openid-connect/certs";

/// A running mock identity provider.
pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    /// Start a provider serving `keys`.
    pub async fn start(keys: Vec<serde_json::Value>) -> Self {
        Self::start_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)), None).await
    }

    /// Start a provider serving `keys` that expects exactly `fetches` requests.
    ///
    /// The expectation is verified when the provider is dropped.
    pub async fn start_expecting(keys: Vec<serde_json::Value>, fetches: u64) -> Self {
        Self::start_with(
            ResponseTemplate::new(200).set_body_json(jwks_json(keys)),
            Some(fetches),
        )
        .await
    }

    /// Start a provider answering every JWKS request with `response`.
    pub async fn start_with(response: ResponseTemplate, fetches: Option<u64>) -> Self {
        let server = MockServer::start().await;

        let mock = Mock::given(method("GET")).and(path(JWKS_PATH)).respond_with(response);
        let mock = match fetches {
            Some(n) => mock.expect(n),
            None => mock,
        };
        mock.mount(&server).await;

        Self { server }
    }

    /// Full URL of the JWKS document.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Number of requests the provider has received.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}
