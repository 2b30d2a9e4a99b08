//! Deploy error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for deploy operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Result type for operations against a remote session.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that abort a deploy before or outside the per-file loop.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("sync root not found: {}", .0.display())]
    SyncRootMissing(PathBuf),

    #[error("sync root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("local file not found: {}", .0.display())]
    FileMissing(PathBuf),

    #[error("scan failed under {}: {message}", .root.display())]
    Scan { root: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

/// Errors reported by a remote session.
///
/// `Rejected` is the expected class: the server answered with a negative
/// reply (missing file, directory already present, ...). Everything else is
/// a fault in the conversation itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("server rejected command: {0}")]
    Rejected(String),

    #[error("transport fault: {0}")]
    Transport(String),

    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Returns true if the server answered normally but refused the command.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SessionError::Rejected(_))
    }
}
