//! Error types for the session store

use super::models::SessionKey;
use thiserror::Error;

/// Result type for session store operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by a [`SessionStore`](super::SessionStore)
#[derive(Error, Debug)]
pub enum SessionError {
    /// The backing store could not be reached or written
    #[error("Session storage unavailable: {message}")]
    StorageUnavailable { message: String },

    #[error("Session not found: {key}")]
    NotFound { key: SessionKey },

    #[error("Session already exists: {key}")]
    AlreadyExists { key: SessionKey },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    /// Create a storage unavailable error
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Check whether the backing store was unreachable
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let key = SessionKey::new("app", "user_1", "session_001");
        let err = SessionError::NotFound { key };
        assert_eq!(err.to_string(), "Session not found: app/user_1/session_001");

        let err = SessionError::unavailable("connection refused");
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_io_error_maps_to_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SessionError = io.into();
        assert!(err.is_unavailable());
    }
}
