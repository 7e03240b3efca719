//! Payload download into the staging directory

use crate::error::{ImportError, Result};
use crate::storage::{ObjectStore, StorageError};
use docimport_common::types::FileRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Row field holding an explicit object key for the payload.
pub const KEY_FIELD: &str = "key";

pub struct FileFetcher<'a> {
    store: &'a dyn ObjectStore,
    remote_dir: String,
}

impl<'a> FileFetcher<'a> {
    pub fn new(store: &'a dyn ObjectStore, remote_dir: impl Into<String>) -> Self {
        Self {
            store,
            remote_dir: remote_dir.into().trim_end_matches('/').to_string(),
        }
    }

    /// Explicit `key` field when present, else `{remote_dir}/{hash}.data.pdf`.
    pub fn remote_key(&self, record: &FileRecord) -> String {
        match record.get_str(KEY_FIELD).map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => format!("{}/{}.data.pdf", self.remote_dir, record.content_hash),
        }
    }

    pub fn local_path(record: &FileRecord, target_dir: &Path) -> PathBuf {
        target_dir.join(record.content_hash.pdf_file_name())
    }

    /// Stage the payload for `record`.
    ///
    /// Returns the local path, or `None` when the object does not exist in
    /// the bucket. An already staged file is returned without touching the
    /// network.
    #[instrument(skip(self, record, target_dir), fields(content_hash = %record.content_hash))]
    pub async fn fetch(&self, record: &FileRecord, target_dir: &Path) -> Result<Option<PathBuf>> {
        let path = Self::local_path(record, target_dir);
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|e| ImportError::io(target_dir, e))?;

        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| ImportError::io(&path, e))?
        {
            debug!(path = %path.display(), "File already staged");
            return Ok(Some(path));
        }

        let key = self.remote_key(record);
        info!(key = %key, "Downloading key");

        match self.store.download_to(&key, &path).await {
            Ok(bytes) => {
                debug!(bytes, path = %path.display(), "Staged payload");
                Ok(Some(path))
            },
            Err(err) => {
                remove_partial(&path).await?;
                match err {
                    StorageError::NotFound(_) => {
                        warn!(key = %key, "404 for key, skipping file");
                        Ok(None)
                    },
                    other => Err(other.into()),
                }
            },
        }
    }
}

async fn remove_partial(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ImportError::io(path, e)),
    }
}
