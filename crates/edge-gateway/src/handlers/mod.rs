//! HTTP request handlers for the edge gateway.

pub mod forward;
pub mod health;
pub mod metrics;

pub use forward::forward;
pub use health::health_check;
pub use metrics::metrics_handler;
