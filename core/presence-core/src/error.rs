//! Error types for presence-core operations.

use std::path::PathBuf;

/// All errors that can occur in presence-core operations.
///
/// Fetch failures have no variant: a failed snapshot is represented
/// by [`crate::snapshot::Snapshot::invalid`] and never surfaces as an error.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    // ─────────────────────────────────────────────────────────────────────
    // Watch List Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Watched key must not be blank")]
    BlankKey,

    #[error("Already watching: {0}")]
    DuplicateKey(String),

    #[error("Not watching: {0}")]
    EntityNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Storage path has no parent directory: {0}")]
    NoParentDir(PathBuf),

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Alert Delivery
    // ─────────────────────────────────────────────────────────────────────
    #[error("Notification delivery failed: {0}")]
    NotifyFailed(String),
}

/// Convenience type alias for Results using PresenceError.
pub type Result<T> = std::result::Result<T, PresenceError>;

impl From<PresenceError> for String {
    fn from(err: PresenceError) -> String {
        err.to_string()
    }
}
