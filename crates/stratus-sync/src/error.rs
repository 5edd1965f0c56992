//! Error types for synchronization and command dispatch.

use reqwest::StatusCode;
use thiserror::Error;

use crate::model::{FileAction, InfoHash};

/// Input rejected before any remote call was made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Magnet input was blank.
    #[error("please enter a magnet link")]
    EmptyMagnet,
    /// Magnet input did not use the `magnet:` scheme.
    #[error("invalid magnet link format")]
    InvalidMagnet,
    /// Info hash was not 40 hexadecimal characters.
    #[error("invalid info hash '{value}'")]
    InvalidInfoHash {
        /// Rejected input.
        value: String,
    },
    /// File path was blank.
    #[error("file path must not be empty")]
    EmptyPath,
    /// Path is not part of the torrent's file list.
    #[error("torrent {info_hash} has no file '{path}'")]
    UnknownFile {
        /// Owning torrent.
        info_hash: InfoHash,
        /// Path that was not found.
        path: String,
    },
    /// Detail was requested before the daemon loaded the torrent's metadata.
    #[error("file list for torrent {info_hash} is not loaded yet")]
    FilesNotLoaded {
        /// Torrent whose files are missing.
        info_hash: InfoHash,
    },
    /// A selection operation was invoked without an open detail session.
    #[error("no torrent detail session is open")]
    NoDetailSession,
    /// The open detail session is for another torrent.
    #[error("open detail session belongs to torrent {open}")]
    SessionMismatch {
        /// Torrent of the session that is actually open.
        open: InfoHash,
    },
    /// The selection is being applied; edits are refused until it settles.
    #[error("file selection is being applied")]
    SessionBusy,
    /// A configuration field failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidConfig {
        /// Offending field.
        field: &'static str,
        /// Human readable reason.
        reason: &'static str,
    },
}

/// One rejected batch from a file-selection apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Batch direction.
    pub action: FileAction,
    /// Number of paths in the batch.
    pub paths: usize,
    /// Rendered failure.
    pub message: String,
}

/// Primary error type for daemon interaction.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Input rejected locally.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Network or timeout failure.
    #[error("request `{operation}` failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// Daemon answered with a non-success status.
    #[error("request `{operation}` returned {status}: {message}")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status returned.
        status: StatusCode,
        /// Response body text, trimmed.
        message: String,
    },
    /// Response body could not be decoded.
    #[error("response to `{operation}` could not be decoded")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// Request URL could not be built from the base URL.
    #[error("invalid URL for `{operation}`")]
    Url {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// At least one file-selection batch failed.
    #[error("{} file selection batch(es) failed", failed.len())]
    Batch {
        /// Failed batches.
        failed: Vec<BatchFailure>,
    },
}

impl SyncError {
    /// Whether the error was raised before contacting the daemon.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Convenience alias for synchronization results.
pub type SyncResult<T> = Result<T, SyncError>;
