//! Token verification endpoint integration tests.
//!
//! Spawns the adapter against a mocked identity provider and exercises
//! `/roles`, `/valid`, `/health` and `/metrics` over HTTP.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use auth_test_utils::{
    jwks_json, rsa_test_jwk, sign_rsa_token, MockIdentityProvider, TestKeypair, TestTokenBuilder,
};
use identity_adapter::auth::{HttpJwksSource, KeyCache, TokenVerifier};
use identity_adapter::config::Config;
use identity_adapter::routes::{self, init_metrics_recorder, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use wiremock::ResponseTemplate;

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> =
    OnceLock::new();

fn get_test_metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Adapter bound to a random port, verifying against a mock provider.
struct TestAdapter {
    addr: SocketAddr,
    _server_handle: JoinHandle<()>,
    provider: MockIdentityProvider,
}

impl TestAdapter {
    async fn spawn(provider: MockIdentityProvider) -> Result<Self> {
        Self::spawn_with(provider, HashMap::new()).await
    }

    async fn spawn_with(
        provider: MockIdentityProvider,
        extra_vars: HashMap<String, String>,
    ) -> Result<Self> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("JWKS_URL".to_string(), provider.jwks_url()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);
        vars.extend(extra_vars);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let source = HttpJwksSource::new(config.jwks_url.clone(), config.jwks_fetch_timeout)?;
        let key_cache = Arc::new(KeyCache::with_policy(
            Arc::new(source),
            config.jwks_cache_ttl,
            config.jwks_min_refresh_interval,
        ));
        let verifier = Arc::new(TokenVerifier::new(key_cache, config.expected_issuer.clone()));

        let state = Arc::new(AppState { config, verifier });
        let app = routes::build_routes(state, get_test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            _server_handle: server_handle,
            provider,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get_roles(&self, authorization: Option<&str>, required_role: Option<&str>) -> reqwest::Response {
        let mut request = reqwest::Client::new().get(self.url("/roles"));
        if let Some(role) = required_role {
            request = request.query(&[("required_role", role)]);
        }
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request.send().await.expect("request should reach the adapter")
    }
}

async fn assert_problem(response: reqwest::Response, status: u16, code: &str) -> serde_json::Value {
    assert_eq!(response.status().as_u16(), status);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], code);
    assert_eq!(body["instance"], "/roles");
    for field in ["type", "title", "detail"] {
        assert!(body[field].is_string(), "problem body missing {field}");
    }
    body
}

// ============================================================================
// /roles success paths
// ============================================================================

#[tokio::test]
async fn test_roles_returns_exact_role_list() -> Result<()> {
    let keypair = TestKeypair::new(1, "test-key-01");
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![keypair.jwk_json()]).await).await?;

    let claims = TestTokenBuilder::new()
        .for_user("partner-app")
        .with_roles(&["Partners", "offline_access", "uma_authorization"])
        .build();
    let token = keypair.sign_token(&claims);

    let response = adapter.get_roles(Some(&format!("Bearer {token}")), Some("Partners")).await;
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(
        body["roles"],
        serde_json::json!(["Partners", "offline_access", "uma_authorization"])
    );
    assert_eq!(body["expires_at"], claims["exp"]);

    Ok(())
}

#[tokio::test]
async fn test_roles_with_rs256_key() -> Result<()> {
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![rsa_test_jwk("rsa-01")]).await).await?;

    let token = sign_rsa_token("rsa-01", &TestTokenBuilder::new().with_roles(&["Partners"]).build());

    let response = adapter.get_roles(Some(&format!("Bearer {token}")), None).await;
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["roles"], serde_json::json!(["Partners"]));

    Ok(())
}

#[tokio::test]
async fn test_valid_endpoint() -> Result<()> {
    let keypair = TestKeypair::new(1, "test-key-01");
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![keypair.jwk_json()]).await).await?;
    let token = keypair.sign_token(&TestTokenBuilder::new().build());

    let response = reqwest::Client::new()
        .get(adapter.url("/valid"))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await?;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({"is_valid": "true"}));

    Ok(())
}

// ============================================================================
// /roles rejections
// ============================================================================

#[tokio::test]
async fn test_roles_missing_header() -> Result<()> {
    let keypair = TestKeypair::new(1, "test-key-01");
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![keypair.jwk_json()]).await).await?;

    let response = adapter.get_roles(None, Some("Partners")).await;
    assert!(response.headers().get("www-authenticate").is_some());

    let body = assert_problem(response, 401, "error-1001").await;
    assert_eq!(body["detail"], "Missing Authorization header");

    // Nothing to verify, so nothing was fetched
    assert_eq!(adapter.provider.request_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_roles_expired_token() -> Result<()> {
    let keypair = TestKeypair::new(1, "test-key-01");
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![keypair.jwk_json()]).await).await?;

    let token = keypair.sign_token(
        &TestTokenBuilder::new()
            .with_roles(&["Partners"])
            .expires_in(-30)
            .build(),
    );

    let response = adapter.get_roles(Some(&format!("Bearer {token}")), Some("Partners")).await;
    assert_problem(response, 401, "error-1006").await;

    Ok(())
}

#[tokio::test]
async fn test_roles_missing_required_role_is_forbidden() -> Result<()> {
    let keypair = TestKeypair::new(1, "test-key-01");
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![keypair.jwk_json()]).await).await?;

    let token = keypair.sign_token(&TestTokenBuilder::new().with_roles(&["Customers"]).build());

    let response = adapter.get_roles(Some(&format!("Bearer {token}")), Some("Partners")).await;
    let body = assert_problem(response, 403, "error-1008").await;
    assert_eq!(body["detail"], "Role Partners missing");

    Ok(())
}

#[tokio::test]
async fn test_roles_untrusted_key() -> Result<()> {
    let trusted = TestKeypair::new(1, "test-key-01");
    let attacker = TestKeypair::new(42, "attacker");
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![trusted.jwk_json()]).await).await?;

    let token = attacker.sign_token_as("test-key-01", &TestTokenBuilder::new().with_roles(&["Partners"]).build());

    let response = adapter.get_roles(Some(&format!("Bearer {token}")), Some("Partners")).await;
    assert_problem(response, 401, "error-1005").await;

    Ok(())
}

#[tokio::test]
async fn test_roles_unknown_kid() -> Result<()> {
    let trusted = TestKeypair::new(1, "test-key-01");
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![trusted.jwk_json()]).await).await?;

    let token = TestKeypair::new(2, "rotated-away").sign_token(&TestTokenBuilder::new().build());

    let response = adapter.get_roles(Some(&format!("Bearer {token}")), None).await;
    assert_problem(response, 401, "error-1004").await;

    Ok(())
}

#[tokio::test]
async fn test_roles_malformed_token() -> Result<()> {
    let trusted = TestKeypair::new(1, "test-key-01");
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![trusted.jwk_json()]).await).await?;

    let response = adapter.get_roles(Some("Bearer not.a-jwt"), None).await;
    assert_problem(response, 401, "error-1003").await;

    Ok(())
}

#[tokio::test]
async fn test_roles_jwks_unavailable_is_bad_gateway() -> Result<()> {
    let provider =
        MockIdentityProvider::start_with(ResponseTemplate::new(503), None).await;
    let adapter = TestAdapter::spawn(provider).await?;

    let token = TestKeypair::new(1, "test-key-01").sign_token(&TestTokenBuilder::new().build());

    let response = adapter.get_roles(Some(&format!("Bearer {token}")), None).await;
    let body = assert_problem(response, 502, "error-1024").await;
    assert_eq!(body["title"], "Connection error");

    Ok(())
}

#[tokio::test]
async fn test_roles_slow_jwks_is_bounded_by_fetch_timeout() -> Result<()> {
    let keypair = TestKeypair::new(1, "test-key-01");
    let provider = MockIdentityProvider::start_with(
        ResponseTemplate::new(200)
            .set_body_json(jwks_json(vec![keypair.jwk_json()]))
            .set_delay(Duration::from_secs(5)),
        None,
    )
    .await;
    let adapter = TestAdapter::spawn_with(
        provider,
        HashMap::from([("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "1".to_string())]),
    )
    .await?;

    let token = keypair.sign_token(&TestTokenBuilder::new().build());

    let response = adapter.get_roles(Some(&format!("Bearer {token}")), None).await;
    assert_problem(response, 502, "error-1024").await;

    Ok(())
}

#[tokio::test]
async fn test_roles_issuer_enforced_when_configured() -> Result<()> {
    let keypair = TestKeypair::new(1, "test-key-01");
    let adapter = TestAdapter::spawn_with(
        MockIdentityProvider::start(vec![keypair.jwk_json()]).await,
        HashMap::from([(
            "EXPECTED_ISSUER".to_string(),
            "http://keycloak:8080/realms/paymentchain".to_string(),
        )]),
    )
    .await?;

    let foreign = keypair.sign_token(&TestTokenBuilder::new().issued_by("http://elsewhere/realms/x").build());
    let response = adapter.get_roles(Some(&format!("Bearer {foreign}")), None).await;
    let body = assert_problem(response, 401, "error-1007").await;
    assert_eq!(body["detail"], "Claim 'iss' is missing or invalid");

    let ours = keypair.sign_token(
        &TestTokenBuilder::new()
            .issued_by("http://keycloak:8080/realms/paymentchain")
            .build(),
    );
    let response = adapter.get_roles(Some(&format!("Bearer {ours}")), None).await;
    assert_eq!(response.status().as_u16(), 200);

    Ok(())
}

// ============================================================================
// Key Cache behavior over HTTP
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_unseen_kid_fetch_jwks_once() -> Result<()> {
    let keypair = TestKeypair::new(1, "test-key-01");
    let provider = MockIdentityProvider::start_with(
        ResponseTemplate::new(200)
            .set_body_json(jwks_json(vec![keypair.jwk_json()]))
            .set_delay(Duration::from_millis(200)),
        Some(1),
    )
    .await;
    let adapter = TestAdapter::spawn(provider).await?;

    let token = keypair.sign_token(&TestTokenBuilder::new().with_roles(&["Partners"]).build());
    let authorization = format!("Bearer {token}");
    let client = reqwest::Client::new();
    let url = adapter.url("/roles");

    let requests: Vec<_> = (0..16)
        .map(|_| {
            let request = client
                .get(&url)
                .query(&[("required_role", "Partners")])
                .header("Authorization", authorization.clone());
            tokio::spawn(async move { request.send().await.map(|r| r.status().as_u16()) })
        })
        .collect();

    for request in requests {
        assert_eq!(request.await??, 200);
    }

    assert_eq!(adapter.provider.request_count().await, 1);

    Ok(())
}

#[tokio::test]
async fn test_cached_key_serves_repeat_requests() -> Result<()> {
    let keypair = TestKeypair::new(1, "test-key-01");
    let provider = MockIdentityProvider::start_expecting(vec![keypair.jwk_json()], 1).await;
    let adapter = TestAdapter::spawn(provider).await?;

    let token = keypair.sign_token(&TestTokenBuilder::new().build());
    for _ in 0..5 {
        let response = adapter.get_roles(Some(&format!("Bearer {token}")), None).await;
        assert_eq!(response.status().as_u16(), 200);
    }

    Ok(())
}

// ============================================================================
// Operational endpoints
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![]).await).await?;

    let response = reqwest::get(adapter.url("/health")).await?;
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "healthy");

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<()> {
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![]).await).await?;

    let response = reqwest::get(adapter.url("/metrics")).await?;
    assert_eq!(response.status().as_u16(), 200);

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_not_found() -> Result<()> {
    let adapter = TestAdapter::spawn(MockIdentityProvider::start(vec![]).await).await?;

    let response = reqwest::get(adapter.url("/login")).await?;
    assert_eq!(response.status().as_u16(), 404);

    Ok(())
}
