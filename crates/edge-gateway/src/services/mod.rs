//! Outbound collaborators of the edge gateway.
//!
//! - `verifier_client` - Identity adapter client behind the [`RoleVerifier`] trait
//! - `proxy` - Static route table and pass-through forwarder

pub mod proxy;
pub mod verifier_client;

pub use proxy::{Forwarder, UpstreamRoutes};
pub use verifier_client::{HttpRoleVerifier, RoleVerifier, VerifiedRoles};
