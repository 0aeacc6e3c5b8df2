//! Middleware for the edge gateway.
//!
//! # Components
//!
//! - `auth` - Edge Filter: bearer header validation, verification and role policy
//! - `http_metrics` - Records every response, including rejections

pub mod auth;
pub mod http_metrics;

pub use auth::{edge_filter, AuthorizationDecision, EdgeFilterState};
pub use http_metrics::http_metrics_middleware;
