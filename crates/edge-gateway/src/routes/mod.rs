//! HTTP routes for the edge gateway.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{edge_filter, http_metrics_middleware, EdgeFilterState};
use crate::services::{Forwarder, RoleVerifier};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Application state shared across the router.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Identity adapter client used by the Edge Filter.
    pub verifier: Arc<dyn RoleVerifier>,

    /// Downstream forwarder.
    pub forwarder: Arc<Forwarder>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (public)
/// - `/metrics` - Prometheus metrics endpoint (public)
/// - Every other path - Edge Filter, then forwarded to its upstream
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - Request timeout from configuration
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = state.config.request_timeout;

    let filter_state = Arc::new(EdgeFilterState {
        verifier: Arc::clone(&state.verifier),
        required_role: state.config.required_role.clone(),
    });

    // The filter wraps the fallback, so nothing reaches an upstream unfiltered
    let gateway_routes = Router::new()
        .fallback(handlers::forward)
        .layer(middleware::from_fn_with_state(filter_state, edge_filter))
        .with_state(Arc::clone(&state.forwarder));

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TraceLayer - Log request details (innermost)
    // 2. TimeoutLayer - Bound the whole request, verifier call included
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(gateway_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
}
