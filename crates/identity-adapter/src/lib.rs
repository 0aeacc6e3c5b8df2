//! Identity Adapter Library
//!
//! Verifies bearer tokens issued by the identity provider and reports their
//! realm roles to the edge gateway.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/roles.rs -> auth/jwt.rs (TokenVerifier) -> auth/jwks.rs (KeyCache)
//! ```
//!
//! # Modules
//!
//! - `auth` - Key Cache, Token Verifier and decoded claims
//! - `config` - Service configuration from environment
//! - `errors` - Problem-details responses with HTTP status mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `observability` - Metrics definitions
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
