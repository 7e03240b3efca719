//! SQLite-backed metadata store
//!
//! Rows are never removed. A row missing from the latest snapshot is flagged
//! `__deleted`; the flag is cleared again if the row comes back.

use super::snapshot::read_snapshot;
use super::{validate_column, MetadataStore, MetastoreError, RecordFilter, RefreshStats, Result};
use docimport_common::types::{
    ContentHash, FileRecord, Flag, RawRow, DELETED_COLUMN, IMPORTED_COLUMN,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// State database location inside the `_mmmeta` directory.
pub const STATE_DB: &str = "_state/files.db";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    position INTEGER PRIMARY KEY AUTOINCREMENT,
    content_hash TEXT NOT NULL UNIQUE,
    data TEXT NOT NULL
);
"#;

pub struct SqliteMetadataStore {
    db: Mutex<Connection>,
    mmmeta_dir: PathBuf,
}

impl SqliteMetadataStore {
    /// Open (or create) the state database for a mirrored `_mmmeta` directory.
    pub fn open(mmmeta_dir: impl Into<PathBuf>) -> Result<Self> {
        let mmmeta_dir = mmmeta_dir.into();
        let db_path = mmmeta_dir.join(STATE_DB);
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %db_path.display(), "Opened metadata state database");

        Ok(Self {
            db: Mutex::new(conn),
            mmmeta_dir,
        })
    }

    pub fn mmmeta_dir(&self) -> &Path {
        &self.mmmeta_dir
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| MetastoreError::Lock)
    }
}

fn has_column(conn: &Connection, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM pragma_table_info('files') WHERE name = ?1")?;
    Ok(stmt.query_row([column], |_| Ok(())).optional()?.is_some())
}

/// Select expression for a bookkeeping column that may not exist yet.
fn flag_expr(conn: &Connection, column: &str) -> Result<String> {
    Ok(if has_column(conn, column)? {
        format!("\"{}\"", column)
    } else {
        "NULL".to_string()
    })
}

fn condition_sql(column: &str, value: Flag) -> String {
    match value.to_sql() {
        None => format!("\"{}\" IS NULL", column),
        Some(v) => format!("\"{}\" = {}", column, v),
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn refresh(&self) -> Result<RefreshStats> {
        let rows = read_snapshot(&self.mmmeta_dir)?;
        let mut conn = self.conn()?;
        let track_deleted = has_column(&conn, DELETED_COLUMN)?;
        let tx = conn.transaction()?;

        let mut stats = RefreshStats {
            rows: rows.len(),
            ..RefreshStats::default()
        };
        let mut seen = HashSet::with_capacity(rows.len());

        {
            let mut exists = tx.prepare("SELECT 1 FROM files WHERE content_hash = ?1")?;
            let mut upsert = tx.prepare(
                "INSERT INTO files (content_hash, data) VALUES (?1, ?2)
                 ON CONFLICT(content_hash) DO UPDATE SET data = excluded.data",
            )?;

            for row in &rows {
                let hash = row.content_hash.as_str();
                if exists.query_row([hash], |_| Ok(())).optional()?.is_none() {
                    stats.inserted += 1;
                }
                upsert.execute(params![hash, serde_json::to_string(&row.row)?])?;
                seen.insert(hash.to_string());
            }
        }

        if track_deleted {
            let local: Vec<String> = {
                let mut stmt = tx.prepare("SELECT content_hash FROM files")?;
                let hashes = stmt
                    .query_map([], |r| r.get::<_, String>(0))?
                    .collect::<std::result::Result<_, _>>()?;
                hashes
            };

            let mut mark = tx.prepare(&format!(
                "UPDATE files SET \"{col}\" = 1 WHERE content_hash = ?1 AND \"{col}\" IS NULL",
                col = DELETED_COLUMN
            ))?;
            for hash in local.iter().filter(|h| !seen.contains(h.as_str())) {
                stats.marked_deleted += mark.execute([hash])?;
            }

            let mut restore = tx.prepare(&format!(
                "UPDATE files SET \"{col}\" = NULL WHERE content_hash = ?1 AND \"{col}\" IS NOT NULL",
                col = DELETED_COLUMN
            ))?;
            for hash in &seen {
                stats.restored += restore.execute([hash])?;
            }
        }

        tx.commit()?;

        info!(
            rows = stats.rows,
            inserted = stats.inserted,
            marked_deleted = stats.marked_deleted,
            restored = stats.restored,
            "Refreshed local metadata state"
        );
        Ok(stats)
    }

    fn ensure_flag_column(&self, column: &str) -> Result<()> {
        validate_column(column)?;
        let conn = self.conn()?;
        if has_column(&conn, column)? {
            return Ok(());
        }

        conn.execute(&format!("ALTER TABLE files ADD COLUMN \"{}\" INTEGER", column), [])?;
        info!(column, "Created bookkeeping column");
        Ok(())
    }

    fn find(
        &self,
        filter: &RecordFilter,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<FileRecord>> {
        let conn = self.conn()?;

        let mut clauses = vec!["position > ?1".to_string()];
        for (column, value) in filter.conditions() {
            validate_column(column)?;
            if !has_column(&conn, column)? {
                return Err(MetastoreError::UnknownColumn(column.clone()));
            }
            clauses.push(condition_sql(column, *value));
        }

        let sql = format!(
            "SELECT position, content_hash, data, {imported}, {deleted} FROM files
             WHERE {where_clause} ORDER BY position LIMIT ?2",
            imported = flag_expr(&conn, IMPORTED_COLUMN)?,
            deleted = flag_expr(&conn, DELETED_COLUMN)?,
            where_clause = clauses.join(" AND "),
        );

        let after = after.map_or(0, |p| p as i64);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params![after, limit], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<i64>>(3)?,
                    r.get::<_, Option<i64>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(position, hash, data, imported, deleted)| -> Result<FileRecord> {
                Ok(FileRecord {
                    position: position as u64,
                    content_hash: ContentHash::new(hash)?,
                    row: serde_json::from_str::<RawRow>(&data)?,
                    imported: Flag::from_sql(imported)?,
                    deleted: Flag::from_sql(deleted)?,
                })
            })
            .collect()
    }

    fn mark_imported(&self, hashes: &[ContentHash]) -> Result<usize> {
        let mut conn = self.conn()?;
        if !has_column(&conn, IMPORTED_COLUMN)? {
            return Err(MetastoreError::UnknownColumn(IMPORTED_COLUMN.to_string()));
        }

        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "UPDATE files SET \"{}\" = 1 WHERE content_hash = ?1",
                IMPORTED_COLUMN
            ))?;
            for hash in hashes {
                changed += stmt.execute([hash.as_str()])?;
            }
        }
        tx.commit()?;

        debug!(requested = hashes.len(), changed, "Marked files imported");
        Ok(changed)
    }
}
