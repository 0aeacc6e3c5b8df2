//! Common utilities and types shared by the edge gateway and the identity adapter.

#![warn(clippy::pedantic)]

/// Module for the authentication error taxonomy
pub mod error;

/// Module for the problem-details error body
pub mod problem;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT and bearer-header utilities
pub mod jwt;
