//! Local metadata store
//!
//! Row-oriented bookkeeping for every file in the remote snapshot. The store
//! answers equality queries over the tri-state bookkeeping columns, adds those
//! columns on demand and flips `imported` for whole batches.
//!
//! - [`MetadataStore`] is the seam used by the pipeline
//! - [`SqliteMetadataStore`] keeps state in a SQLite file next to the mirrored
//!   snapshot
//! - [`snapshot`] reads the mirrored CSV snapshot

use docimport_common::types::{ContentHash, FileRecord, Flag};
use docimport_common::CommonError;
use std::path::PathBuf;

pub mod snapshot;
pub mod sqlite;

pub use sqlite::SqliteMetadataStore;

pub type Result<T> = std::result::Result<T, MetastoreError>;

#[derive(Debug, thiserror::Error)]
pub enum MetastoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Snapshot CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Row encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record: {0}")]
    Record(#[from] CommonError),

    #[error("Invalid snapshot row in {file} line {line}: {reason}")]
    InvalidRow {
        file: String,
        line: u64,
        reason: String,
    },

    #[error("Snapshot directory not found: {0}")]
    MissingSnapshot(PathBuf),

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Invalid column name '{0}'")]
    InvalidColumnName(String),

    #[error("Metadata store lock poisoned")]
    Lock,
}

/// Equality filter over bookkeeping columns, matching absence as `Unset`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    conditions: Vec<(String, Flag)>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(mut self, column: impl Into<String>, value: Flag) -> Self {
        self.conditions.push((column.into(), value));
        self
    }

    pub fn conditions(&self) -> &[(String, Flag)] {
        &self.conditions
    }

    /// Evaluate against an already loaded record.
    ///
    /// Columns the record does not carry never match.
    pub fn matches(&self, record: &FileRecord) -> bool {
        self.conditions
            .iter()
            .all(|(column, wanted)| record.flag(column) == Some(*wanted))
    }
}

/// Outcome of re-reading the snapshot into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub rows: usize,
    pub inserted: usize,
    pub marked_deleted: usize,
    /// Previously deleted rows that reappeared in the snapshot.
    pub restored: usize,
}

pub trait MetadataStore: Send + Sync {
    /// Re-read the mirrored snapshot. Content fields are replaced and
    /// `__deleted` follows presence in the snapshot; `imported` is never
    /// touched.
    fn refresh(&self) -> Result<RefreshStats>;

    /// Add a bookkeeping column defaulting to unset. No-op when present.
    fn ensure_flag_column(&self, column: &str) -> Result<()>;

    /// Up to `limit` rows matching `filter` with position greater than
    /// `after`, in position order.
    fn find(&self, filter: &RecordFilter, after: Option<u64>, limit: usize)
        -> Result<Vec<FileRecord>>;

    /// Set `imported` on every listed row. Returns the number of rows changed.
    fn mark_imported(&self, hashes: &[ContentHash]) -> Result<usize>;
}

/// Reject anything that could not be used verbatim as a quoted identifier.
pub(crate) fn validate_column(column: &str) -> Result<()> {
    let valid = !column.is_empty()
        && column
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MetastoreError::InvalidColumnName(column.to_string()))
    }
}
