//! Mirrored metadata snapshot
//!
//! The remote `_mmmeta/db/` directory holds one or more CSV files. Each has a
//! header of flattened source keys (`content_hash`, `title`,
//! `publisher:name`, ...) and one row per file. Files are read in name order
//! so the resulting row order is stable across runs.

use super::{MetastoreError, Result};
use docimport_common::types::{ContentHash, RawRow};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory inside the mirror that holds the snapshot tables.
pub const SNAPSHOT_DIR: &str = "db";

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub content_hash: ContentHash,
    pub row: RawRow,
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(MetastoreError::MissingSnapshot(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_file(path: &Path, out: &mut Vec<SnapshotRow>) -> Result<()> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let mut row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| {
                let value = if value.is_empty() {
                    Value::Null
                } else {
                    Value::String(value.to_string())
                };
                (key.to_string(), value)
            })
            .collect();

        let hash = row
            .get("content_hash")
            .and_then(Value::as_str)
            .ok_or_else(|| MetastoreError::InvalidRow {
                file: path.display().to_string(),
                line,
                reason: "missing content_hash".to_string(),
            })?;

        let content_hash = ContentHash::new(hash).map_err(|e| MetastoreError::InvalidRow {
            file: path.display().to_string(),
            line,
            reason: e.to_string(),
        })?;

        // Keep the row consistent with the staged file names.
        row.insert(
            "content_hash".to_string(),
            Value::String(content_hash.as_str().to_string()),
        );
        out.push(SnapshotRow { content_hash, row });
    }

    Ok(())
}

/// Read every snapshot row below `mmmeta_dir/db`.
pub fn read_snapshot(mmmeta_dir: &Path) -> Result<Vec<SnapshotRow>> {
    let dir = mmmeta_dir.join(SNAPSHOT_DIR);
    let mut rows = Vec::new();

    for file in csv_files(&dir)? {
        let before = rows.len();
        read_file(&file, &mut rows)?;
        debug!(file = %file.display(), rows = rows.len() - before, "Read snapshot table");
    }

    Ok(rows)
}
