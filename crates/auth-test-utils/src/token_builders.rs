//! Builder patterns for test data construction
//!
//! Provides a fluent API for identity-provider style claims, with realm roles
//! under `realm_access.roles`.

use chrono::{Duration, Utc};
use serde_json::json;

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_roles(&["Partners", "offline_access"])
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestTokenBuilder {
    sub: String,
    iss: Option<String>,
    exp: Option<i64>,
    iat: i64,
    roles: Option<Vec<String>>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults: one hour lifetime, no roles.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            iss: None,
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            iat: now.timestamp(),
            roles: Some(Vec::new()),
        }
    }

    /// Set the subject
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the issuer
    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    /// Set the realm roles
    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = Some(roles.iter().map(|r| (*r).to_string()).collect());
        self
    }

    /// Omit the `realm_access` claim entirely
    pub fn without_realm_access(mut self) -> Self {
        self.roles = None;
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Set expiration to an absolute timestamp
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = Some(timestamp);
        self
    }

    /// Omit the `exp` claim
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> serde_json::Value {
        let mut claims = json!({
            "sub": self.sub,
            "iat": self.iat,
        });

        if let Some(exp) = self.exp {
            claims["exp"] = json!(exp);
        }
        if let Some(iss) = self.iss {
            claims["iss"] = json!(iss);
        }
        if let Some(roles) = self.roles {
            claims["realm_access"] = json!({ "roles": roles });
        }

        claims
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
