//! Request outcome error types.
//!
//! Every remote call resolves to an [`Outcome`]. Failures are values carrying
//! an [`ErrorKind`] and a message that can be shown to the user verbatim.

use thiserror::Error;

/// The result of a single remote operation.
pub type Outcome<T> = std::result::Result<T, ApiError>;

/// Message used for every authorization failure.
pub const SESSION_EXPIRED: &str = "session expired";

/// Message used when a response body is not valid JSON.
pub const INVALID_RESPONSE_FORMAT: &str = "invalid response format";

/// Classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response reached the client.
    Transport,
    /// The server answered with a non-success status.
    Server,
    /// The server rejected the credential (HTTP 401).
    AuthExpired,
    /// Caller-supplied input was rejected before dispatch.
    Validation,
    /// The local session storage failed.
    Storage,
}

impl ErrorKind {
    /// Short machine-readable name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Server => "server",
            Self::AuthExpired => "auth_expired",
            Self::Validation => "validation",
            Self::Storage => "storage",
        }
    }
}

/// A classified failure with a displayable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// What kind of failure this is.
    pub kind: ErrorKind,
    /// Human-readable message, shown verbatim by collaborators.
    pub message: String,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
}

impl ApiError {
    /// Create an error without an HTTP status.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Attach the HTTP status that produced this error.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// A network-level failure (no response).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// A non-success response from the server.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message).with_status(status)
    }

    /// The credential was rejected.
    #[must_use]
    pub fn auth_expired() -> Self {
        Self::new(ErrorKind::AuthExpired, SESSION_EXPIRED).with_status(401)
    }

    /// Input rejected before dispatch.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Local persistence failed.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Returns `true` if this is an authorization failure.
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        self.kind == ErrorKind::AuthExpired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_message_verbatim() {
        let err = ApiError::server(400, "Please provide an email and password");
        assert_eq!(err.to_string(), "Please provide an email and password");
        assert_eq!(err.status, Some(400));
    }

    #[test]
    fn auth_expired_shape() {
        let err = ApiError::auth_expired();
        assert!(err.is_auth_expired());
        assert_eq!(err.message, SESSION_EXPIRED);
        assert_eq!(err.status, Some(401));
    }

    #[test]
    fn kind_names() {
        assert_eq!(ErrorKind::Transport.as_str(), "transport");
        assert_eq!(ErrorKind::Validation.as_str(), "validation");
        assert!(!ApiError::transport("connection refused").is_auth_expired());
    }
}
