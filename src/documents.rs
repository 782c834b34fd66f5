//! Document metadata records.
//!
//! One row per uploaded document under the owner's partition
//! (`USER#{user}` / `DOC#{doc_id}`).  The graph, analytics and wiki layers
//! only read these; the upload pipeline writes them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::AppError;
use crate::graph::entity::Entity;
use crate::store::{Row, SharedStore, keys};
use crate::time::parse_timestamp;

use chrono::{DateTime, Utc};

/// A highlighted sentence inside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Highlight {
    pub id: String,
    pub text: String,
    /// `"key"`, `"action"` or `"important"`.
    pub kind: String,
    pub offset: usize,
    pub length: usize,
    pub score: f64,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub user_id: String,
    /// Display title; falls back to `doc_id` where shown.
    pub filename: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub media_type: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub highlights: Vec<Highlight>,
    pub questions: Vec<String>,
    /// Entities extracted from this document, written back after extraction.
    pub entities: Vec<Entity>,
}

impl DocumentRecord {
    pub fn new(user_id: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), doc_id: doc_id.into(), ..Self::default() }
    }

    /// `filename`, or the document id when there is none.
    pub fn title(&self) -> &str {
        non_empty(&self.filename).unwrap_or(&self.doc_id)
    }

    /// Body text used for analytics: `content`, else `summary`.
    pub fn text(&self) -> &str {
        non_empty(&self.content).or_else(|| non_empty(&self.summary)).unwrap_or("")
    }

    /// Creation time, falling back to the update time.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        non_empty(&self.created_at)
            .or_else(|| non_empty(&self.updated_at))
            .and_then(parse_timestamp)
    }

    /// Sort key for "most recently updated first" listings.
    pub fn recency_key(&self) -> &str {
        non_empty(&self.updated_at).or_else(|| non_empty(&self.created_at)).unwrap_or("")
    }

    pub fn to_row(&self) -> Result<Row, AppError> {
        let attrs = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(AppError::Store(format!("document {} is not an object", self.doc_id))),
            Err(e) => return Err(AppError::Store(format!("serialize document {}: {e}", self.doc_id))),
        };
        Ok(Row {
            pk: keys::user_pk(&self.user_id),
            sk: keys::doc_sk(&self.doc_id),
            attrs,
        })
    }

    /// Decode a stored row.  `doc_id` falls back to the sort key.
    pub fn from_row(row: &Row) -> Result<Self, AppError> {
        let mut record: DocumentRecord = serde_json::from_value(Value::Object(row.attrs.clone()))
            .map_err(|e| AppError::Store(format!("malformed document row {}: {e}", row.key())))?;
        if record.doc_id.is_empty() {
            record.doc_id = row.sk.trim_start_matches(keys::DOC_PREFIX).to_string();
        }
        Ok(record)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Document metadata access over the shared partition store.
#[derive(Clone)]
pub struct DocumentStore {
    store: SharedStore,
}

impl DocumentStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn put(&self, record: &DocumentRecord) -> Result<(), AppError> {
        self.store.put(record.to_row()?)
    }

    pub fn get(&self, user_id: &str, doc_id: &str) -> Result<Option<DocumentRecord>, AppError> {
        self.store
            .get(&keys::user_pk(user_id), &keys::doc_sk(doc_id))?
            .map(|row| DocumentRecord::from_row(&row))
            .transpose()
    }

    /// Every document of `user_id`.  Undecodable rows are skipped with a
    /// warning rather than failing the whole listing.
    pub fn list(&self, user_id: &str) -> Result<Vec<DocumentRecord>, AppError> {
        let rows = self.store.query(&keys::user_pk(user_id), keys::DOC_PREFIX)?;
        Ok(rows.iter().filter_map(decode_or_warn).collect())
    }

    /// The documents named by `doc_ids` that exist, in the given order.
    pub fn fetch_many(&self, user_id: &str, doc_ids: &[String]) -> Result<Vec<DocumentRecord>, AppError> {
        let pk = keys::user_pk(user_id);
        let mut docs = Vec::with_capacity(doc_ids.len());
        for doc_id in doc_ids {
            if let Some(row) = self.store.get(&pk, &keys::doc_sk(doc_id))? {
                if let Some(doc) = decode_or_warn(&row) {
                    docs.push(doc);
                }
            }
        }
        Ok(docs)
    }
}

fn decode_or_warn(row: &Row) -> Option<DocumentRecord> {
    match DocumentRecord::from_row(row) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!(key = %row.key(), error = %e, "skipping undecodable document row");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    fn make_store() -> DocumentStore {
        DocumentStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn put_get_list_fetch() {
        let docs = make_store();
        let mut a = DocumentRecord::new("u", "a");
        a.filename = Some("a.md".into());
        a.created_at = Some("2025-01-02T00:00:00Z".into());
        docs.put(&a).unwrap();
        docs.put(&DocumentRecord::new("u", "b")).unwrap();
        docs.put(&DocumentRecord::new("other", "c")).unwrap();

        assert_eq!(docs.get("u", "a").unwrap().unwrap(), a);
        assert!(docs.get("u", "zzz").unwrap().is_none());
        assert_eq!(docs.list("u").unwrap().len(), 2);

        let ids = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let fetched: Vec<String> =
            docs.fetch_many("u", &ids).unwrap().into_iter().map(|d| d.doc_id).collect();
        assert_eq!(fetched, vec!["b", "a"]);
    }

    #[test]
    fn fallbacks() {
        let mut d = DocumentRecord::new("u", "doc-1");
        assert_eq!(d.title(), "doc-1");
        assert_eq!(d.text(), "");
        assert!(d.timestamp().is_none());

        d.summary = Some("short".into());
        d.updated_at = Some("2025-03-01".into());
        assert_eq!(d.text(), "short");
        assert!(d.timestamp().is_some());
        assert_eq!(d.recency_key(), "2025-03-01");

        d.content = Some("long body".into());
        assert_eq!(d.text(), "long body");
    }

    #[test]
    fn decodes_sparse_rows() {
        let row = Row::new("USER#u", "DOC#legacy").with("summary", "old");
        let doc = DocumentRecord::from_row(&row).unwrap();
        assert_eq!(doc.doc_id, "legacy");
        assert_eq!(doc.summary.as_deref(), Some("old"));
        assert!(doc.entities.is_empty());
    }
}
