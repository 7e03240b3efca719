//! Test helpers for docimport integration tests
//!
//! In-memory stand-ins for the three external collaborators:
//! - [`MemoryObjectStore`]: bucket contents keyed by object key
//! - [`MemoryMetadataStore`]: file records plus a log of mark-imported calls
//! - [`RecordingCommand`]: records what was staged at every invocation

#![allow(dead_code)]

use async_trait::async_trait;
use docimport::command::{CommandStatus, ImportCommand};
use docimport::metastore::{self, MetadataStore, RecordFilter, RefreshStats};
use docimport::storage::{ObjectStore, StorageError, StorageResult};
use docimport_common::types::{ContentHash, FileRecord, Flag, RawRow};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const REMOTE_DIR: &str = "landtag-by";

/// Row with every required source field populated.
pub fn source_row(hash: &str) -> RawRow {
    let value = json!({
        "content_hash": hash,
        "title": format!("Drucksache {}", hash),
        "keywords": "Haushalt",
        "published_at": "2021-03-04T00:00:00",
        "url": format!("https://example.org/{}.pdf", hash),
        "foreign_id": format!("by-{}", hash),
        "reference": format!("18/{}", hash),
        "document_type": "interpellation",
        "publisher:name": "Bayerischer Landtag",
        "publisher:url": "https://www.bayern.landtag.de",
        "publisher:jurisdiction:id": "by",
        "legislative_term": "18"
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!("json! object literal"),
    }
}

pub fn hash_for(i: usize) -> String {
    format!("h{:04}", i)
}

pub fn payload_key(hash: &str) -> String {
    format!("{}/{}.data.pdf", REMOTE_DIR, hash)
}

pub fn hashes(values: &[ContentHash]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

// ============================================================================
// Object store
// ============================================================================

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Keys that write some bytes and then report not-found.
    truncated_missing: Mutex<Vec<String>>,
    downloads: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.objects.lock().unwrap().insert(key.into(), body.into());
    }

    pub fn put_payload(&self, hash: &str) {
        self.put(payload_key(hash), format!("%PDF-1.4 {}", hash).into_bytes());
    }

    pub fn fail_midway_as_missing(&self, key: impl Into<String>) {
        self.truncated_missing.lock().unwrap().push(key.into());
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn download_to(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);

        if self.truncated_missing.lock().unwrap().iter().any(|k| k == key) {
            std::fs::write(dest, b"%PDF-partial").map_err(|e| StorageError::io(dest, e))?;
            return Err(StorageError::NotFound(key.to_string()));
        }

        let body = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        std::fs::write(dest, &body).map_err(|e| StorageError::io(dest, e))?;
        Ok(body.len() as u64)
    }
}

// ============================================================================
// Metadata store
// ============================================================================

#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Mutex<Vec<FileRecord>>,
    mark_calls: Mutex<Vec<Vec<ContentHash>>>,
}

impl MemoryMetadataStore {
    pub fn with_rows(rows: impl IntoIterator<Item = RawRow>) -> Self {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let hash = row["content_hash"].as_str().unwrap().to_string();
                FileRecord {
                    position: i as u64 + 1,
                    content_hash: ContentHash::new(hash).unwrap(),
                    row,
                    imported: Flag::Unset,
                    deleted: Flag::Unset,
                }
            })
            .collect();
        Self {
            records: Mutex::new(records),
            mark_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_files(count: usize) -> Self {
        Self::with_rows((0..count).map(|i| source_row(&hash_for(i))))
    }

    pub fn set_deleted(&self, hash: &str) {
        for record in self.records.lock().unwrap().iter_mut() {
            if record.content_hash.as_str() == hash {
                record.deleted = Flag::True;
            }
        }
    }

    pub fn mark_calls(&self) -> Vec<Vec<String>> {
        self.mark_calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| hashes(call))
            .collect()
    }

    pub fn imported(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.imported.is_true())
            .map(|r| r.content_hash.to_string())
            .collect()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn refresh(&self) -> metastore::Result<RefreshStats> {
        Ok(RefreshStats {
            rows: self.records.lock().unwrap().len(),
            ..RefreshStats::default()
        })
    }

    fn ensure_flag_column(&self, _column: &str) -> metastore::Result<()> {
        Ok(())
    }

    fn find(
        &self,
        filter: &RecordFilter,
        after: Option<u64>,
        limit: usize,
    ) -> metastore::Result<Vec<FileRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| after.map_or(true, |p| r.position > p))
            .filter(|r| filter.matches(r))
            .take(limit)
            .cloned()
            .collect())
    }

    fn mark_imported(&self, batch: &[ContentHash]) -> metastore::Result<usize> {
        self.mark_calls.lock().unwrap().push(batch.to_vec());
        let mut changed = 0;
        for record in self.records.lock().unwrap().iter_mut() {
            if batch.contains(&record.content_hash) {
                record.imported = Flag::True;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

// ============================================================================
// Import command
// ============================================================================

/// Snapshot of the staging directory taken at one invocation.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub files: Vec<String>,
}

impl Invocation {
    /// Content hashes of staged payloads, sorted.
    pub fn payloads(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|f| f.strip_suffix(".pdf"))
            .map(str::to_string)
            .collect()
    }

    pub fn sidecars(&self) -> usize {
        self.files.iter().filter(|f| f.ends_with(".json")).count()
    }
}

#[derive(Default)]
pub struct RecordingCommand {
    invocations: Mutex<Vec<Invocation>>,
    /// 1-based invocation number that exits nonzero.
    fail_on: Option<usize>,
}

impl RecordingCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(invocation: usize) -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            fail_on: Some(invocation),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImportCommand for RecordingCommand {
    async fn run(&self, target_dir: &Path) -> docimport::Result<CommandStatus> {
        let mut files: Vec<String> = std::fs::read_dir(target_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();

        let mut invocations = self.invocations.lock().unwrap();
        invocations.push(Invocation { files });

        if self.fail_on == Some(invocations.len()) {
            Ok(CommandStatus::Failed(Some(2)))
        } else {
            Ok(CommandStatus::Success)
        }
    }

    fn describe(&self) -> String {
        "recording-import".to_string()
    }
}

/// Sidecar JSON files currently staged, keyed by content hash.
pub fn staged_sidecars(dir: &Path) -> HashMap<String, Value> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| {
            let path = e.unwrap().path();
            let stem = path.file_stem()?.to_string_lossy().into_owned();
            (path.extension()? == "json").then(|| {
                let body = std::fs::read(&path).unwrap();
                (stem, serde_json::from_slice(&body).unwrap())
            })
        })
        .collect()
}
