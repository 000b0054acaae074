//! ARM-shaped error bodies surfaced to callers on failed operations.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub const CODE_INTERNAL_SERVER_ERROR: &str = "InternalServerError";
pub const CODE_MULTIPLE_ERRORS: &str = "MultipleErrorsOccurred";

/// An ARM cloud error body: a code/message pair with optional nested details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<CloudError>,
}

impl CloudError {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// The generic body used when the remote system supplies no structured
    /// error detail.
    #[must_use]
    pub fn internal_server_error() -> Self {
        Self::new(CODE_INTERNAL_SERVER_ERROR, "An internal error occurred.")
    }

    /// A multi-error body wrapping one detail per underlying failure.
    #[must_use]
    pub fn multiple(details: Vec<CloudError>) -> Self {
        Self {
            code: CODE_MULTIPLE_ERRORS.to_owned(),
            message: "Multiple errors occurred.".to_owned(),
            details,
        }
    }
}

impl Display for CloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
