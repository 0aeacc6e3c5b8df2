//! Token verification for the identity adapter.
//!
//! - `jwks` - Key Cache over the identity provider's JWKS document
//! - `jwt` - Token Verifier
//! - `claims` - Verified token contents

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::DecodedToken;
pub use jwks::{HttpJwksSource, JwksSource, KeyCache, SigningKey};
pub use jwt::TokenVerifier;
