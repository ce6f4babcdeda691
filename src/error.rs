//! Error types for zeptoctl
//!
//! This module defines all error types used by the plugin manager and the
//! host CLI. Uses `thiserror` for ergonomic error handling with automatic
//! `Display` and `Error` trait implementations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The primary error type for zeptoctl operations.
#[derive(Error, Debug)]
pub enum ZeptoctlError {
    /// The name resolves to neither a built-in command nor a usable plugin.
    #[error("No such CLI plugin: {0}")]
    NotFound(String),

    /// The candidate's metadata document is missing, malformed, or the
    /// candidate is otherwise unusable (bad name, non-zero metadata exit).
    #[error("invalid plugin {}: {reason}", path.display())]
    InvalidPlugin { path: PathBuf, reason: String },

    /// The metadata parsed but declares a protocol version we do not speak.
    #[error(
        "plugin {} declares unsupported SchemaVersion {version:?} (supported: {supported})",
        path.display()
    )]
    UnsupportedSchema {
        path: PathBuf,
        version: String,
        supported: String,
    },

    /// The candidate could not be started at all.
    #[error("failed to execute plugin {}: {source}", path.display())]
    Exec {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The candidate did not answer the metadata request in time.
    #[error("plugin {} did not respond to metadata request within {timeout:?}", path.display())]
    ProbeTimeout { path: PathBuf, timeout: Duration },

    /// Configuration-related errors (unreadable or malformed config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ZeptoctlError {
    /// Whether this error means "no such command", as opposed to a broken one.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ZeptoctlError::NotFound(_))
    }
}

/// Returns true if `err`, or any error in its source chain, is a
/// [`ZeptoctlError::NotFound`]. `None` is never "not found".
pub fn is_not_found(err: Option<&(dyn std::error::Error + 'static)>) -> bool {
    let mut current = err;
    while let Some(e) = current {
        if let Some(z) = e.downcast_ref::<ZeptoctlError>() {
            if z.is_not_found() {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// A specialized `Result` type for zeptoctl operations.
pub type Result<T> = std::result::Result<T, ZeptoctlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ZeptoctlError::NotFound("test".to_string());
        assert_eq!(err.to_string(), "No such CLI plugin: test");
    }

    #[test]
    fn test_is_not_found_predicate() {
        let err = ZeptoctlError::NotFound("test".to_string());
        assert!(err.is_not_found());
        assert!(is_not_found(Some(&err)));
        assert!(!is_not_found(None));
    }

    #[test]
    fn test_other_variants_are_not_not_found() {
        let err = ZeptoctlError::InvalidPlugin {
            path: PathBuf::from("/tmp/zeptoctl-x"),
            reason: "bad".into(),
        };
        assert!(!err.is_not_found());
        assert!(!is_not_found(Some(&err)));

        let err = ZeptoctlError::Config("broken".into());
        assert!(!is_not_found(Some(&err)));
    }

    #[test]
    fn test_is_not_found_through_anyhow_context() {
        let err = anyhow::Error::new(ZeptoctlError::NotFound("ccc".into()))
            .context("dispatching command");
        let dyn_err: &(dyn std::error::Error + 'static) = err.as_ref();
        assert!(is_not_found(Some(dyn_err)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ZeptoctlError = io_err.into();
        assert!(matches!(err, ZeptoctlError::Io(_)));
        // An io NotFound is a filesystem problem, not a missing command.
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_exec_error_keeps_source() {
        let err = ZeptoctlError::Exec {
            path: PathBuf::from("/opt/zeptoctl-broken"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/opt/zeptoctl-broken"));
    }

    #[test]
    fn test_unsupported_schema_display() {
        let err = ZeptoctlError::UnsupportedSchema {
            path: PathBuf::from("/p/zeptoctl-a"),
            version: "2.0.0".into(),
            supported: "^0.1.0".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"2.0.0\""));
        assert!(msg.contains("^0.1.0"));
    }
}
