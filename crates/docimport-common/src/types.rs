//! Domain types shared across the import pipeline

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bookkeeping column set once a record's batch has been imported.
pub const IMPORTED_COLUMN: &str = "imported";

/// Bookkeeping column set when a record disappears from the remote snapshot.
pub const DELETED_COLUMN: &str = "__deleted";

/// Raw source-schema row: flattened keys (e.g. `publisher:name`) to values.
///
/// A key that is present with a `null` value is distinct from a key that is
/// missing entirely; the transformer treats only the latter as an error for
/// required fields.
pub type RawRow = serde_json::Map<String, Value>;

/// Tri-state bookkeeping flag.
///
/// The store never writes `False` itself; it exists so that rows written by
/// other tools with an explicit `0` are still distinguishable from rows that
/// were never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    #[default]
    Unset,
    False,
    True,
}

impl Flag {
    /// Map a nullable integer column value to a flag.
    pub fn from_sql(value: Option<i64>) -> Result<Self> {
        match value {
            None => Ok(Flag::Unset),
            Some(0) => Ok(Flag::False),
            Some(1) => Ok(Flag::True),
            Some(other) => Err(CommonError::InvalidFlag(other)),
        }
    }

    pub fn to_sql(self) -> Option<i64> {
        match self {
            Flag::Unset => None,
            Flag::False => Some(0),
            Flag::True => Some(1),
        }
    }

    pub fn is_true(self) -> bool {
        self == Flag::True
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flag::Unset => write!(f, "unset"),
            Flag::False => write!(f, "false"),
            Flag::True => write!(f, "true"),
        }
    }
}

/// Stable content-derived identifier of a source document.
///
/// The hash doubles as a file name stem for the staged payload and sidecar,
/// so it must not be able to escape the staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty()
            || trimmed.contains('/')
            || trimmed.contains('\\')
            || trimmed == "."
            || trimmed == ".."
        {
            return Err(CommonError::InvalidContentHash(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{content_hash}.pdf`
    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.0)
    }

    /// `{content_hash}.json`
    pub fn sidecar_file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the local metadata store.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Native row order of the store; strictly increasing, never reused.
    pub position: u64,
    pub content_hash: ContentHash,
    pub row: RawRow,
    pub imported: Flag,
    pub deleted: Flag,
}

impl FileRecord {
    /// String value of a row field; `None` when missing, null or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.row.get(key).and_then(Value::as_str)
    }

    /// Value of a bookkeeping column by name.
    pub fn flag(&self, column: &str) -> Option<Flag> {
        match column {
            IMPORTED_COLUMN => Some(self.imported),
            DELETED_COLUMN => Some(self.deleted),
            _ => None,
        }
    }
}
