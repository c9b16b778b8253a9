//! Tagged service results
//!
//! Lifecycle operations never let allocator or store errors escape; they are
//! recovered at the manager boundary and turned into a `ServiceResponse` with
//! a stable error code the HTTP layer maps to a status.

use serde::{Deserialize, Serialize};

/// Stable error code strings surfaced to callers.
pub mod codes {
    pub const NO_PORTS_AVAILABLE: &str = "no_ports_available";
    pub const CONNECTION_NOT_FOUND: &str = "connection_not_found";
    pub const SERVER_ERROR: &str = "server_error";
}

/// Outcome envelope for lifecycle operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ServiceResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>, code: &str) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(code.to_string()),
        }
    }

    /// Error code, if this is a failure response.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
