//! Error types for the session core.

use thiserror::Error;

/// Failures inside the local storage layer.
///
/// Components that persist best-effort (the session repository, the
/// interaction log, snapshot writes) log these and carry on; they are
/// surfaced only by the storage APIs themselves.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Value for '{key}' is {size} bytes, store capacity is {capacity}")]
    ValueTooLarge {
        key: String,
        size: usize,
        capacity: usize,
    },

    #[error("Chunk sequence for '{key}' is corrupt: {reason}")]
    CorruptChunks { key: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by an [`AnalysisClient`](crate::AnalysisClient)
/// implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Session-level failures surfaced to callers of the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("File cannot be uploaded: {0}")]
    InvalidFile(String),

    #[error("The service rejected the contract format")]
    InvalidFormat,

    #[error("The contract exceeds the service size limit")]
    FileTooLarge,

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No active session")]
    NoActiveSession,

    #[error("An operation is already in flight for term {0}")]
    TermBusy(String),

    #[error("Superseded by a newer session")]
    Superseded,

    #[error("Failed to load session {session_id}: {message}")]
    LoadFailed { session_id: String, message: String },
}

impl From<ApiError> for SessionError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Status { status, message } => {
                SessionError::Network(format!("status {status}: {message}"))
            }
            ApiError::Network(message) => SessionError::Network(message),
            ApiError::MalformedResponse(message) => SessionError::MalformedResponse(message),
        }
    }
}

impl SessionError {
    /// Map an upload failure onto the typed taxonomy.
    ///
    /// Status 413 means the file exceeded the service limit and 400 means
    /// the format was rejected; everything else is a transport failure.
    pub fn from_upload_failure(e: ApiError) -> Self {
        match e {
            ApiError::Status { status: 413, .. } => SessionError::FileTooLarge,
            ApiError::Status { status: 400, .. } => SessionError::InvalidFormat,
            other => other.into(),
        }
    }
}
