//! Source metadata to ingestion sidecar
//!
//! Maps a flattened source row onto the document schema expected by the
//! import command and writes it as `{content_hash}.json` next to the staged
//! payload. The mapping is fixed:
//!
//! | sidecar field                | source key                  | required |
//! |------------------------------|-----------------------------|----------|
//! | `content_hash`               | `content_hash`              | yes      |
//! | `title` (max 500 chars)      | `title`                     | yes      |
//! | `description`                | `keywords`                  | no       |
//! | `published_at`               | `published_at`              | yes      |
//! | `properties.title`           | `title`                     | yes      |
//! | `properties.foreign_id`      | `foreign_id`                | yes      |
//! | `properties.url`             | `url`                       | yes      |
//! | `properties.publisher`       | `publisher:name`            | yes      |
//! | `properties.publisher_url`   | `publisher:url`             | yes      |
//! | `properties.reference`       | `reference`                 | yes      |
//! | `data.category`              | `category`                  | no       |
//! | `data.publisher`             | `publisher:jurisdiction:id` | yes      |
//! | `data.document_type`         | `document_type`             | yes      |
//! | `data.legislative_term`      | `legislative_term`          | no       |
//!
//! A required key that is missing from the row aborts the run. A required
//! key that is present but null is carried through as null. A
//! `published_at` value in an unrecognised format is written unchanged.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use docimport_common::types::RawRow;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const TITLE_LIMIT: usize = 500;
pub const ELLIPSIS: char = '…';
pub const DEFAULT_LANGUAGE: &str = "de";

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Required metadata field '{0}' is missing")]
    MissingField(&'static str),

    #[error("Failed to encode sidecar: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write sidecar {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// Publication time: normalised when the format is known, verbatim otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PublishedAt {
    Parsed(DateTime<FixedOffset>),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionRecord {
    pub content_hash: Option<String>,
    pub title: String,
    pub description: String,
    pub published_at: Option<PublishedAt>,
    pub language: String,
    pub allow_annotation: bool,
    pub tags: Vec<String>,
    pub properties: Properties,
    pub data: DocumentData,
    pub portal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Properties {
    pub title: Option<String>,
    pub foreign_id: Option<String>,
    pub url: Option<String>,
    pub publisher: Option<String>,
    pub publisher_url: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentData {
    pub category: Option<String>,
    pub publisher: Option<String>,
    pub document_type: Option<String>,
    pub legislative_term: Option<String>,
}

/// Truncate to at most `n` characters, ending in [`ELLIPSIS`] when cut.
pub fn ellipse(s: &str, n: usize) -> String {
    if s.chars().count() <= n {
        return s.to_string();
    }
    let mut out: String = s.chars().take(n.saturating_sub(1)).collect();
    out.push(ELLIPSIS);
    out
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn required(row: &RawRow, key: &'static str) -> Result<Option<String>> {
    row.get(key)
        .map(value_text)
        .ok_or(TransformError::MissingField(key))
}

fn optional(row: &RawRow, key: &str) -> Option<String> {
    row.get(key)
        .and_then(value_text)
        .filter(|s| !s.is_empty())
}

/// Accepts RFC 3339, naive date-times (read as UTC) and plain dates.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
}

#[derive(Debug, Clone)]
pub struct Transformer {
    collection: String,
    language: String,
    tag: Option<String>,
}

impl Transformer {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            tag: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag.filter(|t| !t.is_empty());
        self
    }

    pub fn transform(&self, row: &RawRow) -> Result<IngestionRecord> {
        let title = required(row, "title")?;
        let published_at = required(row, "published_at")?.map(|raw| match parse_timestamp(&raw) {
            Some(dt) => PublishedAt::Parsed(dt),
            None => {
                warn!(value = %raw, "Unrecognised published_at format, passing through");
                PublishedAt::Raw(raw)
            },
        });

        Ok(IngestionRecord {
            content_hash: required(row, "content_hash")?,
            title: title
                .as_deref()
                .map(|t| ellipse(t, TITLE_LIMIT))
                .unwrap_or_default(),
            description: optional(row, "keywords").unwrap_or_default(),
            published_at,
            language: self.language.clone(),
            allow_annotation: true,
            tags: self.tag.iter().cloned().collect(),
            properties: Properties {
                title,
                foreign_id: required(row, "foreign_id")?,
                url: required(row, "url")?,
                publisher: required(row, "publisher:name")?,
                publisher_url: required(row, "publisher:url")?,
                reference: required(row, "reference")?,
            },
            data: DocumentData {
                category: optional(row, "category"),
                publisher: required(row, "publisher:jurisdiction:id")?,
                document_type: required(row, "document_type")?,
                legislative_term: optional(row, "legislative_term"),
            },
            portal: self.collection.clone(),
        })
    }

    /// Transform `row` and write it next to the staged payload.
    pub async fn write_sidecar(&self, row: &RawRow, pdf_path: &Path) -> Result<PathBuf> {
        let record = self.transform(row)?;
        let path = pdf_path.with_extension("json");
        let body = serde_json::to_vec(&record)?;

        tokio::fs::write(&path, body)
            .await
            .map_err(|source| TransformError::Io {
                path: path.display().to_string(),
                source,
            })?;

        debug!(path = %path.display(), "Wrote metadata sidecar");
        Ok(path)
    }
}
