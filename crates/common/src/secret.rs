//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports types from the [`secrecy`] crate. Bearer tokens are carried as
//! [`SecretString`] from the moment they are read off the `Authorization`
//! header until they are handed to the verifier, so any `Debug` output or
//! `tracing` field that captures them is redacted.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Credential {
//!     kid: String,
//!     token: SecretString,
//! }
//!
//! let credential = Credential {
//!     kid: "key-1".to_string(),
//!     token: SecretString::from("eyJhbGciOi..."),
//! };
//!
//! // Safe: token is redacted
//! println!("{:?}", credential);
//!
//! // Explicit access is required to read the value
//! let raw: &str = credential.token.expose_secret();
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("eyJhbGciOiJSUzI1NiJ9.payload.sig");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("eyJhbGciOiJSUzI1NiJ9"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("token123");
        assert_eq!(secret.expose_secret(), "token123");
    }

    #[test]
    fn test_struct_with_secret_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct Credential {
            kid: String,
            token: SecretString,
        }

        let credential = Credential {
            kid: "key-1".to_string(),
            token: SecretString::from("super-secret-token"),
        };

        let debug_str = format!("{credential:?}");

        assert!(debug_str.contains("key-1"));
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("super-secret-token"));
    }

    #[test]
    fn test_clone_works() {
        let secret = SecretString::from("cloneable");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "cloneable");
    }
}
