//! Observability module for the edge gateway.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
