//! Error taxonomy for the managed store.
//!
//! Three tiers, matching the coordination layer's error-handling design:
//! semantic domain errors (surfaced verbatim), invariant-preserving faults
//! (wrapped `Io`/`Sqlx`, triggering compensating cleanup upstream), and
//! lifecycle errors (`NotConnected`/`NotOpen`/`Closed`).

pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file not found: {bucket}:{path}")]
    FileNotFound { bucket: String, path: String },

    #[error("file already exists: {bucket}:{path}")]
    FileExists { bucket: String, path: String },

    #[error("invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("{} error(s) occurred: {}", .0.len(), join_messages(.0))]
    Aggregate(Vec<Error>),

    #[error("catalog is not connected")]
    NotConnected,

    #[error("manager is not open")]
    NotOpen,

    #[error("stream is already closed")]
    Closed,

    #[error("value exceeds configured size limit: {what} ({actual} > {limit})")]
    SizeLimitExceeded {
        what: &'static str,
        actual: usize,
        limit: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn file_not_found(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Error::FileNotFound {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    pub fn file_exists(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Error::FileExists {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    /// True for the subset of errors that represent a business outcome
    /// rather than an operational fault (tier 1 of the error design).
    pub fn is_semantic(&self) -> bool {
        matches!(
            self,
            Error::FileNotFound { .. }
                | Error::FileExists { .. }
                | Error::InvalidBucketName(_)
                | Error::InvalidPath(_)
                | Error::TypeMismatch { .. }
        )
    }
}
