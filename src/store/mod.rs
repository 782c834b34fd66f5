//! Partitioned key-value store: the persistence contract every other layer
//! is written against.
//!
//! Rows are addressed by a partition key (`pk`) and a sort key (`sk`) and
//! carry a flat, string-keyed attribute map.  Backends implement four
//! operations: point `get`, prefix `query` within one partition, blind `put`,
//! and `put_versioned`, an atomic compare-and-put on the row's `version`
//! attribute used for optimistic concurrency.
//!
//! ```text
//! USER#{user}  ENTITY#{entity_id}   entity aggregate (one per user × entity)
//! USER#{user}  DOC#{doc_id}         document metadata
//! USER#{user}  ANALYTICS#TEMPORAL   cached temporal analytics snapshot
//! USER#{user}  WIKI#{page_id}       wiki page
//! DOC#{doc_id} ENTITY#{entity_id}   document entity edge (per-upload snapshot)
//! ```

pub mod memory;
#[cfg(feature = "isqlite")]
pub mod sqlite;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{StoreBackend, StoreConfig};
use crate::error::AppError;

/// Attribute holding the optimistic-concurrency counter.
pub const VERSION_ATTR: &str = "version";

/// Key builders for the layout above.
pub mod keys {
    pub const ENTITY_PREFIX: &str = "ENTITY#";
    pub const DOC_PREFIX: &str = "DOC#";
    pub const WIKI_PREFIX: &str = "WIKI#";
    pub const ANALYTICS_SK: &str = "ANALYTICS#TEMPORAL";

    pub fn user_pk(user_id: &str) -> String {
        format!("USER#{user_id}")
    }

    pub fn doc_pk(doc_id: &str) -> String {
        format!("{DOC_PREFIX}{doc_id}")
    }

    pub fn entity_sk(entity_id: &str) -> String {
        format!("{ENTITY_PREFIX}{entity_id}")
    }

    pub fn doc_sk(doc_id: &str) -> String {
        format!("{DOC_PREFIX}{doc_id}")
    }

    pub fn wiki_sk(page_id: &str) -> String {
        format!("{WIKI_PREFIX}{page_id}")
    }
}

/// A single stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub pk: String,
    pub sk: String,
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

impl Row {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self { pk: pk.into(), sk: sk.into(), attrs: Map::new() }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }

    /// Numeric attribute; numeric strings are accepted too.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.attrs.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.attrs.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String-list attribute.  Non-string elements are skipped; a missing or
    /// non-array attribute yields an empty list.
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        match self.attrs.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Optimistic-concurrency counter; `None` if the row never carried one.
    pub fn version(&self) -> Option<i64> {
        self.get_i64(VERSION_ATTR)
    }

    /// Key string used in logs and conflict errors.
    pub fn key(&self) -> String {
        format!("{}/{}", self.pk, self.sk)
    }
}

/// Pluggable partitioned store.
///
/// Implementations are `Send + Sync` and perform blocking I/O; there are no
/// transactions beyond a single row.
pub trait PartitionStore: Send + Sync {
    /// Backend name (e.g. `"memory"`, `"sqlite"`).
    fn store_type(&self) -> &str;

    fn get(&self, pk: &str, sk: &str) -> Result<Option<Row>, AppError>;

    /// All rows of partition `pk` whose sort key starts with `sk_prefix`,
    /// ordered by sort key.
    fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Row>, AppError>;

    /// Unconditional write (insert or overwrite).
    fn put(&self, row: Row) -> Result<(), AppError>;

    /// Write `row` only if the stored row's version equals `expected`.
    ///
    /// `expected = None` means the row must not exist yet.  A stored row with
    /// no version attribute counts as version `0`.  On mismatch nothing is
    /// written and [`AppError::VersionConflict`] is returned.
    fn put_versioned(&self, row: Row, expected: Option<i64>) -> Result<(), AppError>;
}

/// Shared handle used by every component.
pub type SharedStore = Arc<dyn PartitionStore>;

/// Version of `existing` as seen by [`PartitionStore::put_versioned`].
pub(crate) fn stored_version(existing: Option<&Row>) -> Option<i64> {
    existing.map(|r| r.version().unwrap_or(0))
}

pub(crate) fn check_version(
    key: String,
    existing: Option<&Row>,
    expected: Option<i64>,
) -> Result<(), AppError> {
    let found = stored_version(existing);
    if found != expected {
        return Err(AppError::VersionConflict { key, expected, found });
    }
    Ok(())
}

/// Open the configured backend.
pub fn open(config: &StoreConfig) -> Result<SharedStore, AppError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(memory::MemoryStore::new())),
        #[cfg(feature = "isqlite")]
        StoreBackend::Sqlite => Ok(Arc::new(sqlite::SqliteStore::open(&config.path)?)),
        #[cfg(not(feature = "isqlite"))]
        StoreBackend::Sqlite => Err(AppError::Config(
            "sqlite backend requires the `isqlite` feature".into(),
        )),
    }
}
