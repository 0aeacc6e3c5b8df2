//! Downstream forwarding.
//!
//! A static route table maps the first path segment to an upstream base URL.
//! Authorized requests are relayed with method, path, query, headers and body
//! unchanged, minus hop-by-hop headers; the upstream response is relayed the
//! same way.

use crate::errors::GatewayError;
use crate::observability::metrics::record_upstream_request;
use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::Response;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Default route table, one entry per downstream domain service.
pub const DEFAULT_UPSTREAM_ROUTES: &str =
    "customer=http://localhost:8091,product=http://localhost:8092,transaction=http://localhost:8093";

/// Headers scoped to a single connection; never forwarded.
const HOP_BY_HOP_HEADERS: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Route table keyed by first path segment.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamRoutes {
    routes: BTreeMap<String, String>,
}

impl fmt::Debug for UpstreamRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.routes.iter()).finish()
    }
}

impl FromStr for UpstreamRoutes {
    type Err = String;

    /// Parse `name=url` pairs separated by commas.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut routes = BTreeMap::new();

        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, url) = entry
                .split_once('=')
                .ok_or_else(|| format!("route '{entry}' must have the form name=url"))?;
            let name = name.trim();
            let url = url.trim().trim_end_matches('/');

            if name.is_empty() || name.contains('/') {
                return Err(format!("route name '{name}' must be a single path segment"));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("upstream for '{name}' must be an http(s) URL"));
            }
            if routes.insert(name.to_string(), url.to_string()).is_some() {
                return Err(format!("route '{name}' is defined twice"));
            }
        }

        if routes.is_empty() {
            return Err("at least one route is required".to_string());
        }

        Ok(Self { routes })
    }
}

impl UpstreamRoutes {
    /// Find the upstream for a request path.
    ///
    /// Returns the route name and the upstream base URL.
    pub fn resolve(&self, path: &str) -> Option<(&str, &str)> {
        let segment = path.trim_start_matches('/').split('/').next()?;
        self.routes
            .get_key_value(segment)
            .map(|(name, url)| (name.as_str(), url.as_str()))
    }
}

/// Relays authorized requests to their upstream service.
pub struct Forwarder {
    client: reqwest::Client,
    routes: UpstreamRoutes,
    max_body_bytes: usize,
}

impl Forwarder {
    /// Create a forwarder.
    ///
    /// # Arguments
    ///
    /// * `routes` - Route table
    /// * `timeout` - Bound on one upstream exchange
    /// * `max_body_bytes` - Largest request body relayed
    ///
    /// # Errors
    ///
    /// Returns the builder error if the HTTP client cannot be constructed.
    pub fn new(
        routes: UpstreamRoutes,
        timeout: Duration,
        max_body_bytes: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            // Redirects are the caller's business
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            routes,
            max_body_bytes,
        })
    }

    /// Relay a request and return the upstream response.
    ///
    /// # Errors
    ///
    /// - `GatewayError::RouteNotFound` if no route matches the path
    /// - `GatewayError::PayloadTooLarge` if the body exceeds the limit
    /// - `GatewayError::UpstreamUnavailable` if the upstream cannot be reached
    #[instrument(skip_all, fields(path = %request.uri().path()))]
    pub async fn forward(&self, request: Request) -> Result<Response, GatewayError> {
        let (parts, body) = request.into_parts();
        let instance = parts.uri.path().to_string();

        let Some((name, base_url)) = self.routes.resolve(&instance) else {
            tracing::debug!(target: "gateway.proxy", "No route for path");
            return Err(GatewayError::RouteNotFound { instance });
        };

        let body = to_bytes(body, self.max_body_bytes).await.map_err(|e| {
            tracing::debug!(target: "gateway.proxy", error = %e, "Request body rejected");
            GatewayError::PayloadTooLarge {
                instance: instance.clone(),
            }
        })?;

        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or(instance.as_str(), |pq| pq.as_str());
        let url = format!("{base_url}{path_and_query}");

        let start = Instant::now();
        let result = self
            .client
            .request(parts.method, url)
            .headers(forwardable_headers(&parts.headers, true))
            .body(body)
            .send()
            .await;

        let upstream = match result {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(target: "gateway.proxy", upstream = name, error = %e, "Upstream request failed");
                record_upstream_request(name, "unavailable", start.elapsed());
                return Err(GatewayError::UpstreamUnavailable {
                    cause: format!("upstream {name} is unavailable"),
                    instance,
                });
            }
        };

        let status = upstream.status();
        let headers = forwardable_headers(upstream.headers(), false);
        let bytes = upstream.bytes().await.map_err(|e| {
            tracing::warn!(target: "gateway.proxy", upstream = name, error = %e, "Upstream response body failed");
            record_upstream_request(name, "unavailable", start.elapsed());
            GatewayError::UpstreamUnavailable {
                cause: format!("upstream {name} is unavailable"),
                instance: instance.clone(),
            }
        })?;

        record_upstream_request(name, status_category(status.as_u16()), start.elapsed());

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Copy headers except hop-by-hop ones.
///
/// On the request side `Host` and `Content-Length` are also dropped; the
/// client sets both for the upstream connection.
fn forwardable_headers(headers: &HeaderMap, request_side: bool) -> HeaderMap {
    let mut forwarded = headers.clone();

    // Headers named by Connection are hop-by-hop too
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();

    for name in HOP_BY_HOP_HEADERS.iter().chain(named.iter()) {
        forwarded.remove(name);
    }
    forwarded.remove("keep-alive");

    if request_side {
        forwarded.remove(header::HOST);
        forwarded.remove(header::CONTENT_LENGTH);
    } else {
        // The relayed body is re-framed by the server
        forwarded.remove(header::CONTENT_LENGTH);
    }

    forwarded
}

fn status_category(status: u16) -> &'static str {
    match status {
        200..=399 => "success",
        400..=499 => "client_error",
        _ => "server_error",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Method, Request as HttpRequest, StatusCode};
    use wiremock::matchers::{body_string, header as header_matcher, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn routes(table: &str) -> UpstreamRoutes {
        table.parse().unwrap()
    }

    #[test]
    fn test_default_routes_parse() {
        let table = routes(DEFAULT_UPSTREAM_ROUTES);
        assert_eq!(
            table.resolve("/customer/42"),
            Some(("customer", "http://localhost:8091"))
        );
        assert_eq!(
            table.resolve("/product/7"),
            Some(("product", "http://localhost:8092"))
        );
        assert_eq!(
            table.resolve("/transaction"),
            Some(("transaction", "http://localhost:8093"))
        );
    }

    #[test]
    fn test_resolve_matches_whole_segment_only() {
        let table = routes(DEFAULT_UPSTREAM_ROUTES);
        assert_eq!(table.resolve("/customers/42"), None);
        assert_eq!(table.resolve("/"), None);
        assert_eq!(table.resolve("/unknown/customer"), None);
    }

    #[test]
    fn test_trailing_slash_trimmed_from_upstream() {
        let table = routes("customer=http://svc:8091/");
        assert_eq!(table.resolve("/customer"), Some(("customer", "http://svc:8091")));
    }

    #[test]
    fn test_invalid_route_tables() {
        assert!("".parse::<UpstreamRoutes>().is_err());
        assert!("customer".parse::<UpstreamRoutes>().is_err());
        assert!("customer=localhost:8091".parse::<UpstreamRoutes>().is_err());
        assert!("=http://localhost:8091".parse::<UpstreamRoutes>().is_err());
        assert!("a/b=http://localhost:8091".parse::<UpstreamRoutes>().is_err());
        assert!("customer=http://a,customer=http://b"
            .parse::<UpstreamRoutes>()
            .is_err());
    }

    #[test]
    fn test_hop_by_hop_headers_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace-hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace-hop", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::HOST, HeaderValue::from_static("gateway:8080"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));

        let forwarded = forwardable_headers(&headers, true);

        assert!(forwarded.get(header::CONNECTION).is_none());
        assert!(forwarded.get("keep-alive").is_none());
        assert!(forwarded.get("x-trace-hop").is_none());
        assert!(forwarded.get(header::TRANSFER_ENCODING).is_none());
        assert!(forwarded.get(header::HOST).is_none());
        assert_eq!(forwarded.get(header::AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(forwarded.get("x-request-id").unwrap(), "req-1");
    }

    #[tokio::test]
    async fn test_forward_relays_request_and_response() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/customer/42"))
            .and(query_param("expand", "true"))
            .and(header_matcher("x-request-id", "req-7"))
            .and(body_string("{\"name\":\"Ada\"}"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-upstream", "customer")
                    .set_body_string("created"),
            )
            .expect(1)
            .mount(&upstream)
            .await;

        let forwarder = Forwarder::new(
            routes(&format!("customer={}", upstream.uri())),
            Duration::from_secs(5),
            1024,
        )
        .unwrap();

        let request = HttpRequest::builder()
            .method(Method::POST)
            .uri("/customer/42?expand=true")
            .header("x-request-id", "req-7")
            .body(Body::from("{\"name\":\"Ada\"}"))
            .unwrap();

        let response = forwarder.forward(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-upstream").unwrap(), "customer");
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"created");
    }

    #[tokio::test]
    async fn test_forward_without_route() {
        let forwarder =
            Forwarder::new(routes(DEFAULT_UPSTREAM_ROUTES), Duration::from_secs(1), 1024).unwrap();

        let request = HttpRequest::builder().uri("/billing/1").body(Body::empty()).unwrap();

        assert!(matches!(
            forwarder.forward(request).await,
            Err(GatewayError::RouteNotFound { instance }) if instance == "/billing/1"
        ));
    }

    #[tokio::test]
    async fn test_forward_body_too_large() {
        let forwarder =
            Forwarder::new(routes(DEFAULT_UPSTREAM_ROUTES), Duration::from_secs(1), 4).unwrap();

        let request = HttpRequest::builder()
            .method(Method::POST)
            .uri("/customer")
            .body(Body::from("too large"))
            .unwrap();

        assert!(matches!(
            forwarder.forward(request).await,
            Err(GatewayError::PayloadTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_forward_unreachable_upstream() {
        // Nothing listens on the discard port
        let forwarder = Forwarder::new(
            routes("customer=http://127.0.0.1:9"),
            Duration::from_secs(1),
            1024,
        )
        .unwrap();

        let request = HttpRequest::builder().uri("/customer/1").body(Body::empty()).unwrap();

        assert!(matches!(
            forwarder.forward(request).await,
            Err(GatewayError::UpstreamUnavailable { .. })
        ));
    }
}
