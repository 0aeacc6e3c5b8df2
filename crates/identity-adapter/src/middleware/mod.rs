//! Middleware for the identity adapter.
//!
//! # Components
//!
//! - `http_metrics` - Records every response, including framework-level errors

pub mod http_metrics;

pub use http_metrics::http_metrics_middleware;
