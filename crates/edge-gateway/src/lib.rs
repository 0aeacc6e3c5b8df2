//! Edge Gateway Library
//!
//! Single entry point in front of the downstream domain services. Every
//! request other than the public probes passes the Edge Filter, which has the
//! bearer credential verified by the identity adapter and enforces the
//! required role before the request is forwarded.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs (Edge Filter) -> services/verifier_client.rs
//!               -> handlers/forward.rs -> services/proxy.rs (Forwarder)
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Problem-details responses with HTTP status mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Edge Filter and HTTP metrics middleware
//! - `observability` - Metrics definitions
//! - `routes` - Axum router setup
//! - `services` - Identity adapter client and downstream forwarder

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod services;
