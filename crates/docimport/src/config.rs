//! Resolved run configuration
//!
//! Everything a run needs is collected here once and handed to the
//! components at construction; nothing downstream reads the environment.

use crate::command::ShellCommand;
use crate::error::{ImportError, Result};
use crate::importer::DEFAULT_BATCH_SIZE;
use crate::storage::StorageConfig;
use crate::transform::DEFAULT_LANGUAGE;
use std::path::PathBuf;

/// Default root of the local metadata mirror.
pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Collection name written as `portal` into every sidecar.
    pub collection: String,
    /// Directory inside the bucket holding payloads and `_mmmeta`.
    pub remote_dir: String,
    /// Staging directory scanned by the import command.
    pub target_dir: PathBuf,
    /// Import command line, split on whitespace.
    pub command: String,
    pub tag: Option<String>,
    pub batch_size: usize,
    pub data_dir: PathBuf,
    pub language: String,
    pub storage: StorageConfig,
}

impl ImportConfig {
    pub fn new(
        collection: impl Into<String>,
        storage: StorageConfig,
        remote_dir: impl Into<String>,
        target_dir: impl Into<PathBuf>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            remote_dir: remote_dir.into(),
            target_dir: target_dir.into(),
            command: command.into(),
            tag: None,
            batch_size: DEFAULT_BATCH_SIZE,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            language: DEFAULT_LANGUAGE.to_string(),
            storage,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(ImportError::config("collection must not be empty"));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(ImportError::config("bucket must not be empty"));
        }
        if self.remote_dir.trim_matches('/').is_empty() {
            return Err(ImportError::config("remote directory must not be empty"));
        }
        if self.target_dir.as_os_str().is_empty() {
            return Err(ImportError::config("target directory must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(ImportError::config("batch size must be greater than 0"));
        }
        ShellCommand::parse(&self.command)?;
        Ok(())
    }
}
