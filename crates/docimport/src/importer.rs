//! Batch importer
//!
//! Walks the pending files, stages each payload with its sidecar and hands
//! full batches to the import command:
//!
//! ```text
//! Accumulating --(batch full)--> Flushing --(command ok)--> Accumulating
//!      |                             |
//!      |                             +--(command failed)--> error, run aborts
//!      +--(selector exhausted)--> Flushing (partial batch) --> Done
//! ```
//!
//! A batch is marked imported only after the command succeeded and the
//! staging directory was cleared. A failed command leaves the whole batch
//! unmarked, so the next run picks the same files up again.

use crate::command::{CommandStatus, ImportCommand};
use crate::error::{ImportError, Result};
use crate::fetcher::FileFetcher;
use crate::metastore::MetadataStore;
use crate::selector::pending_files;
use crate::transform::Transformer;
use docimport_common::types::{ContentHash, FileRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Accumulating,
    Flushing,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Successful command invocations.
    pub batches: usize,
    /// Files marked imported.
    pub imported: usize,
    /// Files skipped because the remote object does not exist.
    pub missing: usize,
}

pub struct BatchImporter<'a> {
    metastore: &'a dyn MetadataStore,
    fetcher: FileFetcher<'a>,
    transformer: Transformer,
    command: &'a dyn ImportCommand,
    target_dir: PathBuf,
    batch_size: usize,
    batch: Vec<ContentHash>,
    state: ImportState,
    report: ImportReport,
}

impl<'a> BatchImporter<'a> {
    pub fn new(
        metastore: &'a dyn MetadataStore,
        fetcher: FileFetcher<'a>,
        transformer: Transformer,
        command: &'a dyn ImportCommand,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            metastore,
            fetcher,
            transformer,
            command,
            target_dir: target_dir.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch: Vec::new(),
            state: ImportState::Accumulating,
            report: ImportReport::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn pending_batch(&self) -> &[ContentHash] {
        &self.batch
    }

    /// Stage payload and sidecar for one record.
    ///
    /// `None` means the payload does not exist remotely and the record is
    /// skipped for this run.
    pub async fn process_file(&self, record: &FileRecord) -> Result<Option<PathBuf>> {
        let Some(pdf_path) = self.fetcher.fetch(record, &self.target_dir).await? else {
            return Ok(None);
        };
        self.transformer
            .write_sidecar(&record.row, &pdf_path)
            .await?;
        Ok(Some(pdf_path))
    }

    #[instrument(skip(self), fields(target_dir = %self.target_dir.display(), batch_size = self.batch_size))]
    pub async fn run(&mut self) -> Result<ImportReport> {
        let metastore = self.metastore;
        self.state = ImportState::Accumulating;

        for record in pending_files(metastore) {
            let record = record?;
            if self.process_file(&record).await?.is_none() {
                self.report.missing += 1;
                continue;
            }

            self.batch.push(record.content_hash);
            if self.batch.len() >= self.batch_size {
                self.flush().await?;
            }
        }

        if !self.batch.is_empty() {
            self.flush().await?;
        }

        self.state = ImportState::Done;
        info!(
            batches = self.report.batches,
            imported = self.report.imported,
            missing = self.report.missing,
            "Import finished"
        );
        Ok(self.report.clone())
    }

    async fn flush(&mut self) -> Result<()> {
        self.state = ImportState::Flushing;

        if !has_staged_files(&self.target_dir).await? {
            debug!(dir = %self.target_dir.display(), "Nothing staged, skipping import command");
            self.batch.clear();
            self.state = ImportState::Accumulating;
            return Ok(());
        }

        match self.command.run(&self.target_dir).await? {
            CommandStatus::Success => {},
            CommandStatus::Failed(code) => {
                return Err(ImportError::CommandFailed {
                    command: self.command.describe(),
                    code,
                });
            },
        }

        reset_dir(&self.target_dir).await?;
        let changed = self.metastore.mark_imported(&self.batch)?;
        info!(files = self.batch.len(), changed, "Marked batch imported");

        self.report.batches += 1;
        self.report.imported += self.batch.len();
        self.batch.clear();
        self.state = ImportState::Accumulating;
        Ok(())
    }
}

async fn has_staged_files(dir: &Path) -> Result<bool> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(ImportError::io(dir, e)),
    };
    Ok(entries
        .next_entry()
        .await
        .map_err(|e| ImportError::io(dir, e))?
        .is_some())
}

/// Delete and recreate the staging directory.
async fn reset_dir(dir: &Path) -> Result<()> {
    tokio::fs::remove_dir_all(dir)
        .await
        .map_err(|e| ImportError::io(dir, e))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ImportError::io(dir, e))?;
    Ok(())
}
