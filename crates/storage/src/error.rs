// Error types for board storage
//
// Backends return typed failures; translating them into transport responses
// is the caller's job.

use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while talking to a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    /// No board or remote resource matches the request
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The request cannot be served as given (e.g. empty board name)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The remote API answered with a non-2xx status
    #[error("Failed to {action}: {status} - {status_text}")]
    RemoteFailure {
        action: String,
        status: u16,
        status_text: String,
    },

    /// The remote API could not be reached or its body could not be read
    #[error("Failed to {action}: {source}")]
    Transport {
        action: String,
        #[source]
        source: reqwest::Error,
    },

    /// No access token could be obtained for the remote API
    #[error("credential error: {0}")]
    Credentials(String),

    /// A remote record is malformed or lacks its embedded board
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        StorageError::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        StorageError::AlreadyExists(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        StorageError::InvalidRequest(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        StorageError::InvalidData(msg.into())
    }

    pub fn credentials(msg: impl Into<String>) -> Self {
        StorageError::Credentials(msg.into())
    }

    /// True for `NotFound` and for a remote 404
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::RemoteFailure { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// True when the failure originates from the remote side of the call
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            StorageError::RemoteFailure { .. }
                | StorageError::Transport { .. }
                | StorageError::Credentials(_)
        )
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::InvalidData(err.to_string())
    }
}
