//! Error types for the import pipeline
//!
//! Everything here is fatal for a run. The one recoverable condition, a
//! missing remote object, is handled inside the fetcher and never surfaces
//! as an [`ImportError`].

use crate::metastore::MetastoreError;
use crate::storage::StorageError;
use crate::transform::TransformError;
use std::path::Path;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Metadata store error: {0}")]
    Metastore(#[from] MetastoreError),

    #[error("Metadata transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Import command '{command}' failed with {}", exit_label(.code))]
    CommandFailed { command: String, code: Option<i32> },

    #[error("Failed to start import command '{command}': {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File operation failed on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl ImportError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
