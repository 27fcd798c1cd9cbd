//! Typed error types for Atelier host-capability traits.
//!
//! Provides [`HostError`] — the canonical error type for the capability
//! trait methods (`RecordStore`, `HttpGateway`) consumed by the script
//! sandbox. Host implementations map their internal failures onto these
//! variants; the sandbox forwards the rendered message verbatim to the
//! script author.

use thiserror::Error;

/// Canonical error type for host capability operations.
///
/// All variants are `#[non_exhaustive]` to allow future additions without
/// breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HostError {
    /// The requested doctype is not defined in the record store.
    #[error("doctype not found: {0}")]
    DoctypeNotFound(String),

    /// The requested record does not exist.
    #[error("record not found: '{name}' of doctype '{doctype}'")]
    RecordNotFound {
        /// The doctype that was queried.
        doctype: String,
        /// The record name that was not found.
        name: String,
    },

    /// The caller's permission context does not allow the operation.
    #[error("permission denied: {reason}")]
    PermissionDenied {
        /// Explanation of why the operation was denied.
        reason: String,
    },

    /// The outbound HTTP layer returned an error.
    #[error("gateway error: {message}")]
    Gateway {
        /// The error message from the HTTP layer.
        message: String,
    },

    /// An internal error (catch-all for unexpected failures).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HostError {
    /// Returns a static error code string for programmatic matching.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DoctypeNotFound(_) => "DOCTYPE_NOT_FOUND",
            Self::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::Gateway { .. } => "GATEWAY_ERROR",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(HostError::DoctypeNotFound("Page".into()).code(), "DOCTYPE_NOT_FOUND");
        assert_eq!(
            HostError::RecordNotFound {
                doctype: "Page".into(),
                name: "home".into(),
            }
            .code(),
            "RECORD_NOT_FOUND"
        );
        assert_eq!(
            HostError::PermissionDenied {
                reason: "read not allowed".into(),
            }
            .code(),
            "PERMISSION_DENIED"
        );
    }

    #[test]
    fn display_includes_context() {
        let err = HostError::RecordNotFound {
            doctype: "Page".into(),
            name: "home".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Page"));
        assert!(msg.contains("home"));
    }
}
