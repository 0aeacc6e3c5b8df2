//! # Auth Test Utilities
//!
//! Shared test utilities for the identity adapter and the edge gateway.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (Ed25519 keypairs from seeds, a fixed RSA key)
//! - Claim builders with realm roles (TestTokenBuilder)
//! - A mocked identity provider serving a JWKS document
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::new(1, "test-key-01");
//!     let provider = MockIdentityProvider::start(vec![keypair.jwk_json()]).await;
//!
//!     let token = keypair.sign_token(
//!         &TestTokenBuilder::new()
//!             .for_user("alice")
//!             .with_roles(&["Partners"])
//!             .build(),
//!     );
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_mock;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_mock::*;
pub use token_builders::*;
