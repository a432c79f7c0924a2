//! Error taxonomy for the ingestion and persistence pipeline.
//!
//! Malformed rows and unit conflicts are deliberately NOT errors: the
//! splitter degrades gracefully and reports them through its parse summary.
//! The types here cover only the conditions that stop an operation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions while splitting a flat log into channel series.
#[derive(Debug, Error)]
pub enum SplitError {
    /// The log has no header row at all.
    #[error("log is empty: no header row found")]
    EmptyLog,

    /// The header row does not carry one of the required columns.
    #[error("log header is missing required column '{column}' (header: '{header}')")]
    MissingColumn {
        column: &'static str,
        header: String,
    },
}

/// Failures surfaced by the channel store and the snapshot registry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The import identifier does not resolve. A typed absence, not an abort:
    /// snapshot loading turns this into a missing-reference entry.
    #[error("import '{0}' not found")]
    NotFound(String),

    /// The snapshot identifier does not resolve.
    #[error("snapshot '{0}' not found")]
    SnapshotNotFound(String),

    /// A name contains a character reserved by common filesystems.
    #[error("name '{name}' contains reserved character '{reserved}'")]
    InvalidName { name: String, reserved: char },

    /// A snapshot with this name already exists.
    #[error("a snapshot named '{0}' already exists")]
    DuplicateName(String),

    /// A stored record exists but cannot be decoded.
    #[error("stored record '{}' is corrupt", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded for storage.
    #[error("failed to encode record for storage")]
    Encode(#[from] serde_json::Error),

    /// I/O failure with path and operation context. Transient I/O errors are
    /// retried with bounded backoff before this surfaces.
    #[error("I/O failure during {operation} on '{}'", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Whether this error means "the thing does not exist" rather than
    /// "storage is broken".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::SnapshotNotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
