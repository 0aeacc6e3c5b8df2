//! Observability module for the identity adapter.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
