//! Verified token contents.
//!
//! Claims are read out of the verified payload into [`DecodedToken`]. The
//! subject is redacted in Debug output to prevent exposure in logs.

use common::error::AuthError;
use serde_json::Value;
use std::fmt;

/// The verified contents of an access token.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedToken {
    /// Key id the token was verified with.
    pub kid: String,

    /// Issuer (`iss`), if present.
    pub issuer: Option<String>,

    /// Subject (`sub`), if present - redacted in Debug output.
    pub subject: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    pub expires_at: i64,

    /// Realm roles from `realm_access.roles`.
    pub roles: Vec<String>,
}

impl fmt::Debug for DecodedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedToken")
            .field("kid", &self.kid)
            .field("issuer", &self.issuer)
            .field("subject", &self.subject.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("roles", &self.roles)
            .finish()
    }
}

impl DecodedToken {
    /// Check if the token carries a realm role. Role names are case-sensitive.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Read `exp` as whole seconds.
///
/// # Errors
///
/// `MissingOrInvalidClaim("exp")` when absent or not a number.
pub fn expiry(claims: &Value) -> Result<i64, AuthError> {
    let exp = claims
        .get("exp")
        .ok_or_else(|| AuthError::MissingOrInvalidClaim("exp".to_string()))?;

    exp.as_i64()
        // Fractional NumericDate values are truncated
        .or_else(|| exp.as_f64().filter(|v| v.is_finite()).map(|v| v as i64))
        .ok_or_else(|| AuthError::MissingOrInvalidClaim("exp".to_string()))
}

/// Read `realm_access.roles` as a list of strings.
///
/// # Errors
///
/// `MissingOrInvalidClaim("realm_access")` when the claim is absent or not an
/// object, `MissingOrInvalidClaim("realm_access.roles")` when the roles are
/// absent or not a list of strings.
pub fn realm_roles(claims: &Value) -> Result<Vec<String>, AuthError> {
    let realm_access = claims
        .get("realm_access")
        .and_then(Value::as_object)
        .ok_or_else(|| AuthError::MissingOrInvalidClaim("realm_access".to_string()))?;

    let invalid_roles = || AuthError::MissingOrInvalidClaim("realm_access.roles".to_string());

    realm_access
        .get("roles")
        .and_then(Value::as_array)
        .ok_or_else(invalid_roles)?
        .iter()
        .map(|role| role.as_str().map(ToString::to_string).ok_or_else(invalid_roles))
        .collect()
}

/// Read an optional string claim.
pub fn optional_string(claims: &Value, name: &str) -> Option<String> {
    claims.get(name).and_then(Value::as_str).map(ToString::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token(subject: Option<&str>) -> DecodedToken {
        DecodedToken {
            kid: "key-1".to_string(),
            issuer: Some("http://keycloak/realms/paymentchain".to_string()),
            subject: subject.map(ToString::to_string),
            expires_at: 1_700_000_000,
            roles: vec!["Partners".to_string(), "offline_access".to_string()],
        }
    }

    #[test]
    fn test_debug_redacts_subject() {
        let debug_str = format!("{:?}", token(Some("secret-user-id")));

        assert!(!debug_str.contains("secret-user-id"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("Partners"));
        assert!(debug_str.contains("key-1"));
    }

    #[test]
    fn test_has_role_is_case_sensitive() {
        let token = token(None);
        assert!(token.has_role("Partners"));
        assert!(!token.has_role("partners"));
        assert!(!token.has_role("Admin"));
    }

    #[test]
    fn test_expiry_integer() {
        assert_eq!(expiry(&json!({"exp": 1_700_000_000})).unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_expiry_fractional_truncates() {
        assert_eq!(expiry(&json!({"exp": 1_700_000_000.9})).unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_expiry_missing_or_wrong_type() {
        let expected = AuthError::MissingOrInvalidClaim("exp".to_string());
        assert_eq!(expiry(&json!({})).unwrap_err(), expected);
        assert_eq!(expiry(&json!({"exp": "tomorrow"})).unwrap_err(), expected);
    }

    #[test]
    fn test_realm_roles_valid() {
        let roles = realm_roles(&json!({"realm_access": {"roles": ["Partners", "uma_authorization"]}}))
            .unwrap();
        assert_eq!(roles, vec!["Partners", "uma_authorization"]);
    }

    #[test]
    fn test_realm_roles_empty_list_is_valid() {
        assert!(realm_roles(&json!({"realm_access": {"roles": []}})).unwrap().is_empty());
    }

    #[test]
    fn test_realm_roles_missing_realm_access() {
        assert_eq!(
            realm_roles(&json!({"sub": "alice"})).unwrap_err(),
            AuthError::MissingOrInvalidClaim("realm_access".to_string())
        );
    }

    #[test]
    fn test_realm_roles_wrong_shapes() {
        let expected = AuthError::MissingOrInvalidClaim("realm_access.roles".to_string());
        assert_eq!(
            realm_roles(&json!({"realm_access": {}})).unwrap_err(),
            expected
        );
        assert_eq!(
            realm_roles(&json!({"realm_access": {"roles": "Partners"}})).unwrap_err(),
            expected
        );
        assert_eq!(
            realm_roles(&json!({"realm_access": {"roles": ["Partners", 7]}})).unwrap_err(),
            expected
        );
    }

    #[test]
    fn test_optional_string() {
        let claims = json!({"iss": "issuer", "sub": 42});
        assert_eq!(optional_string(&claims, "iss").as_deref(), Some("issuer"));
        assert_eq!(optional_string(&claims, "sub"), None);
        assert_eq!(optional_string(&claims, "aud"), None);
    }
}
