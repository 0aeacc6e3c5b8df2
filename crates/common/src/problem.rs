//! Problem-details error body shared by every service.
//!
//! Every rejection emitted by the gateway and the identity adapter carries a
//! body of this shape. The layout follows RFC 7807 with an extra
//! application-specific `code`:
//!
//! ```json
//! {
//!   "type": "/errors/authentication/expired",
//!   "title": "Token expired",
//!   "code": "error-1006",
//!   "detail": "The access token has expired",
//!   "instance": "/customer/42"
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Type URI used when a problem has not been categorized.
pub const UNCATEGORIZED_TYPE: &str = "/errors/uncategorized";

/// Instance URI used when the occurrence is not tied to a request path.
pub const UNCATEGORIZED_INSTANCE: &str = "/errors/uncategorized/bank";

/// Standardized API error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardErrorResponse {
    /// URI reference identifying the problem type.
    #[serde(rename = "type", default = "default_type")]
    pub problem_type: String,

    /// Short, human-readable summary of the problem type.
    pub title: String,

    /// Application-specific error code.
    pub code: String,

    /// Human-readable explanation specific to this occurrence.
    pub detail: String,

    /// URI reference identifying this occurrence (the request path).
    #[serde(default = "default_instance")]
    pub instance: String,
}

fn default_type() -> String {
    UNCATEGORIZED_TYPE.to_string()
}

fn default_instance() -> String {
    UNCATEGORIZED_INSTANCE.to_string()
}

impl StandardErrorResponse {
    /// Creates an uncategorized problem body.
    #[must_use]
    pub fn new(title: impl Into<String>, code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            problem_type: default_type(),
            title: title.into(),
            code: code.into(),
            detail: detail.into(),
            instance: default_instance(),
        }
    }

    /// Sets the problem type URI.
    #[must_use]
    pub fn with_type(mut self, problem_type: impl Into<String>) -> Self {
        self.problem_type = problem_type.into();
        self
    }

    /// Sets the occurrence URI. Empty values keep the uncategorized default.
    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        let instance = instance.into();
        if !instance.is_empty() {
            self.instance = instance;
        }
        self
    }
}
