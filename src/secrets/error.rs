//! Error types for secrets discovery operations.

use thiserror::Error;

/// Result type for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur while listing, reading or walking secrets.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// The address was well-formed but nothing exists there.
    #[error("no data at {path}")]
    NotFound { path: String },

    /// The server refused the request (HTTP 403).
    #[error("permission denied at {path}: {message}")]
    PermissionDenied { path: String, message: String },

    /// Any other non-success status from the server.
    #[error("Vault returned status {status} at {path}: {message}")]
    Api { path: String, status: u16, message: String },

    /// The request never produced a usable response.
    #[error("transport error at {path}: {message}")]
    Transport { path: String, message: String },

    /// The response violated the expected shape.
    #[error("unexpected response at {path}: {reason}")]
    UnexpectedResponse { path: String, reason: String },

    /// The walk was cancelled by its owner.
    #[error("operation cancelled")]
    Cancelled,

    /// The overall or per-request deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A walk rooted at `target` failed; `source` is the underlying cause.
    #[error("error walking {target}: {source}")]
    Walk {
        target: String,
        #[source]
        source: Box<SecretsError>,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SecretsError {
    /// Create a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a permission denied error.
    pub fn permission_denied(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PermissionDenied { path: path.into(), message: message.into() }
    }

    /// Create an API status error.
    pub fn api(path: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api { path: path.into(), status, message: message.into() }
    }

    /// Create a transport error.
    pub fn transport(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport { path: path.into(), message: message.into() }
    }

    /// Create an unexpected response error.
    pub fn unexpected_response(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse { path: path.into(), reason: reason.into() }
    }

    /// Create a config error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Wrap an error with the walk root it came from.
    pub fn walk(target: impl Into<String>, source: SecretsError) -> Self {
        Self::Walk { target: target.into(), source: Box::new(source) }
    }

    /// The innermost error, looking through walk context.
    pub fn root_cause(&self) -> &SecretsError {
        match self {
            Self::Walk { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True for the 403 condition that enables the mount listing fallback.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.root_cause(), Self::PermissionDenied { .. })
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.root_cause(), Self::DeadlineExceeded)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled)
    }
}
