//! HTTP request handlers for the identity adapter.

pub mod health;
pub mod metrics;
pub mod roles;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use roles::{get_roles, get_valid};
