//! Error types for the machine config server.
//!
//! Library crates use [`MachineConfigServerError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all machine config server operations.
#[derive(Debug, thiserror::Error)]
pub enum MachineConfigServerError {
    /// Inline file content is not a valid `data:` URL.
    #[error("malformed content: {message}")]
    MalformedContent { message: String },

    /// The provisioning document could not be parsed.
    #[error("malformed document: {message}")]
    MalformedDocument { message: String },

    /// The provisioning document declares a schema version we do not speak.
    #[error("unsupported ignition version: {version:?}")]
    UnsupportedVersion { version: String },

    /// Internal encoding failure. Never expected in normal operation.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The kubeconfig collaborator failed to produce credentials.
    #[error("credential fetch error: {0}")]
    CredentialFetch(String),

    /// The configuration lookup collaborator could not resolve a pool.
    #[error("config lookup error: {0}")]
    ConfigLookup(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A pipeline appender failed; `appender` names the step.
    #[error("{appender} appender failed: {source}")]
    Append {
        appender: &'static str,
        source: Box<MachineConfigServerError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MachineConfigServerError>;

impl MachineConfigServerError {
    /// Create a malformed-content error from any displayable message.
    pub fn malformed_content(msg: impl Into<String>) -> Self {
        Self::MalformedContent {
            message: msg.into(),
        }
    }

    /// Create a malformed-document error from any displayable message.
    pub fn malformed_document(msg: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Tag an error with the name of the appender that raised it.
    pub fn append(appender: &'static str, source: Self) -> Self {
        Self::Append {
            appender,
            source: Box::new(source),
        }
    }

    /// The underlying error with any `Append` context stripped.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Append { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = MachineConfigServerError::config("missing config dir");
        assert_eq!(err.to_string(), "config error: missing config dir");

        let err = MachineConfigServerError::UnsupportedVersion {
            version: "3.0.0".into(),
        };
        assert!(err.to_string().contains("\"3.0.0\""));
    }

    #[test]
    fn append_names_the_step_and_keeps_the_cause() {
        let err = MachineConfigServerError::append(
            "kubeconfig",
            MachineConfigServerError::CredentialFetch("connection refused".into()),
        );
        assert_eq!(
            err.to_string(),
            "kubeconfig appender failed: credential fetch error: connection refused"
        );
        assert!(matches!(
            err.root_cause(),
            MachineConfigServerError::CredentialFetch(_)
        ));
    }
}
