//! Error types for history and document storage

use std::fmt;

/// Failures reported by a document backend
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document '{id}' not found in partition '{partition_key}'")]
    NotFound { partition_key: String, id: String },

    #[error("container '{container_id}' not found in database '{database_id}'")]
    ContainerNotFound {
        database_id: String,
        container_id: String,
    },

    #[error("partition key '{expected}' does not match document userid '{actual}'")]
    PartitionKeyMismatch { expected: String, actual: String },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("connection lock poisoned")]
    LockPoisoned,
}

impl DocumentError {
    /// True only for a missing document, never for a missing container
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentError::NotFound { .. })
    }
}

/// Storage call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Upsert,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => f.write_str("read"),
            Operation::Upsert => f.write_str("upsert"),
            Operation::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to {operation} chat history for user '{user_id}' session '{session_id}': {source}")]
    Storage {
        operation: Operation,
        user_id: String,
        session_id: String,
        #[source]
        source: DocumentError,
    },

    #[error("failed to encode or decode chat history for user '{user_id}' session '{session_id}': {source}")]
    Codec {
        user_id: String,
        session_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HistoryError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, HistoryError::InvalidArgument(_))
    }

    /// Anything that came from the storage round trip, codec included
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, HistoryError::Storage { .. } | HistoryError::Codec { .. })
    }
}

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;
