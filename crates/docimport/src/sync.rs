//! Metadata snapshot sync
//!
//! Mirrors `<remote-dir>/_mmmeta/**` from the bucket into
//! `<data-dir>/<remote-dir>/_mmmeta`, then opens and refreshes the local
//! metadata store on top of the mirror. Every object is re-downloaded on each
//! run; the mirror is authoritative only for snapshot content, never for the
//! local bookkeeping state.

use crate::error::{ImportError, Result};
use crate::metastore::{MetadataStore, SqliteMetadataStore};
use crate::storage::ObjectStore;
use docimport_common::types::{DELETED_COLUMN, IMPORTED_COLUMN};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, instrument};

pub const MMMETA_DIR: &str = "_mmmeta";

/// `<remote-dir>/_mmmeta`
pub fn snapshot_prefix(remote_dir: &str) -> String {
    format!("{}/{}", remote_dir.trim_end_matches('/'), MMMETA_DIR)
}

/// Map a bucket key to its mirror path, refusing keys that would land
/// outside `data_dir`.
fn mirror_path(data_dir: &Path, key: &str) -> Result<PathBuf> {
    let relative = Path::new(key);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(ImportError::config(format!(
            "refusing to mirror key outside the data directory: {}",
            key
        )));
    }
    Ok(data_dir.join(relative))
}

pub struct MetadataSync<'a> {
    store: &'a dyn ObjectStore,
    data_dir: PathBuf,
}

impl<'a> MetadataSync<'a> {
    pub fn new(store: &'a dyn ObjectStore, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            data_dir: data_dir.into(),
        }
    }

    /// Local `_mmmeta` directory for a remote directory.
    pub fn local_mmmeta_dir(&self, remote_dir: &str) -> PathBuf {
        self.data_dir
            .join(remote_dir.trim_matches('/'))
            .join(MMMETA_DIR)
    }

    /// Download every snapshot object. Returns the number of files mirrored.
    #[instrument(skip(self))]
    pub async fn mirror(&self, remote_dir: &str) -> Result<usize> {
        let prefix = snapshot_prefix(remote_dir);
        let keys = self.store.list(&prefix).await?;
        let mut mirrored = 0;

        for key in keys.iter().filter(|k| !k.ends_with('/')) {
            info!(key = %key, "Syncing");
            let path = mirror_path(&self.data_dir, key)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ImportError::io(parent, e))?;
            }
            let bytes = self.store.download_to(key, &path).await?;
            debug!(key = %key, bytes, "Mirrored snapshot object");
            mirrored += 1;
        }

        Ok(mirrored)
    }

    /// Mirror the snapshot, refresh local state and make sure both
    /// bookkeeping columns exist.
    pub async fn run(&self, remote_dir: &str) -> Result<SqliteMetadataStore> {
        info!(remote_dir, "Syncing...");
        let mirrored = self.mirror(remote_dir).await?;
        let mmmeta_dir = self.local_mmmeta_dir(remote_dir);
        info!(files = mirrored, path = %mmmeta_dir.display(), "Snapshot mirrored");

        let metastore = SqliteMetadataStore::open(&mmmeta_dir)?;
        info!("Updating local state");
        metastore.refresh()?;
        metastore.ensure_flag_column(IMPORTED_COLUMN)?;
        metastore.ensure_flag_column(DELETED_COLUMN)?;

        Ok(metastore)
    }
}
