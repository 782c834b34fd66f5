//! Knowledge-graph persistence: per-user entity aggregates and per-document
//! entity edges.
//!
//! ```text
//! USER#{user}  ENTITY#{entity_id}   UserEntityAggregate (merged across docs)
//! DOC#{doc_id} ENTITY#{entity_id}   DocumentEntityEdge  (overwritten per upload)
//! ```
//!
//! Aggregate writes are version-checked: read, merge, compare-and-put, and
//! on conflict re-read and merge again.  Concurrent uploads touching the
//! same entity therefore never drop each other's `doc_ids` or mentions.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::documents::{DocumentRecord, DocumentStore, Highlight};
use crate::error::AppError;
use crate::store::{Row, SharedStore, VERSION_ATTR, keys, stored_version};
use crate::time::now_iso8601;
use super::entity::{Entity, EntityType};

/// Mentions kept on an aggregate row.
pub const AGGREGATE_MAX_MENTIONS: usize = 10;

// ── Value types ───────────────────────────────────────────────────────────────

/// One row per user × entity, accumulated across documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserEntityAggregate {
    pub entity_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Sorted, unique.
    pub doc_ids: Vec<String>,
    /// Always `doc_ids.len()`.
    pub doc_count: usize,
    pub mentions: Vec<String>,
    /// Highest salience seen for this entity.
    pub salience: f64,
    pub created_at: String,
    pub updated_at: String,
    pub last_seen_doc_id: Option<String>,
    #[serde(skip)]
    pub version: i64,
}

impl UserEntityAggregate {
    /// Fold `entity`, seen in `doc_id`, into `existing` (or start a new
    /// aggregate).  Pure; the caller persists the result.
    pub fn merge(existing: Option<&Self>, entity: &Entity, doc_id: &str, now: &str) -> Self {
        let Some(prev) = existing else {
            let mut mentions = Vec::new();
            push_mentions(&mut mentions, &entity.mentions);
            return Self {
                entity_id: entity.entity_id.clone(),
                name: entity.name.clone(),
                entity_type: entity.entity_type,
                doc_ids: vec![doc_id.to_string()],
                doc_count: 1,
                mentions,
                salience: entity.salience,
                created_at: now.to_string(),
                updated_at: now.to_string(),
                last_seen_doc_id: Some(doc_id.to_string()),
                version: 1,
            };
        };

        let doc_ids: BTreeSet<String> = prev
            .doc_ids
            .iter()
            .cloned()
            .chain(std::iter::once(doc_id.to_string()))
            .collect();
        let mut mentions = prev.mentions.clone();
        push_mentions(&mut mentions, &entity.mentions);

        Self {
            entity_id: prev.entity_id.clone(),
            name: entity.name.clone(),
            entity_type: entity.entity_type,
            doc_count: doc_ids.len(),
            doc_ids: doc_ids.into_iter().collect(),
            mentions,
            salience: prev.salience.max(entity.salience),
            created_at: prev.created_at.clone(),
            updated_at: now.to_string(),
            last_seen_doc_id: Some(doc_id.to_string()),
            version: prev.version + 1,
        }
    }

    pub fn to_row(&self, user_id: &str) -> Row {
        Row::new(keys::user_pk(user_id), keys::entity_sk(&self.entity_id))
            .with("entity_id", self.entity_id.as_str())
            .with("entity_name", self.name.as_str())
            .with("entity_type", self.entity_type.as_str())
            .with("doc_ids", self.doc_ids.clone())
            .with("doc_count", self.doc_count as u64)
            .with("mentions", self.mentions.clone())
            .with("salience", self.salience)
            .with("created_at", self.created_at.as_str())
            .with("updated_at", self.updated_at.as_str())
            .with("last_seen_doc_id", self.last_seen_doc_id.clone())
            .with(VERSION_ATTR, self.version)
    }

    /// Decode a stored aggregate.  Rows with an unrecognised type are
    /// rejected; a row without a version reads as version 0.
    pub fn from_row(row: &Row) -> Option<Self> {
        let entity_id = entity_id_of(row)?;
        let entity_type = row.get_str("entity_type").and_then(EntityType::normalize)?;
        let doc_ids: BTreeSet<String> = row.get_str_list("doc_ids").into_iter().collect();
        let name = row
            .get_str("entity_name")
            .or_else(|| row.get_str("name"))
            .unwrap_or(&entity_id)
            .to_string();
        Some(Self {
            name,
            entity_type,
            doc_count: doc_ids.len(),
            doc_ids: doc_ids.into_iter().collect(),
            mentions: row.get_str_list("mentions"),
            salience: row.get_f64("salience").unwrap_or(0.0),
            created_at: row.get_str("created_at").unwrap_or_default().to_string(),
            updated_at: row.get_str("updated_at").unwrap_or_default().to_string(),
            last_seen_doc_id: row.get_str("last_seen_doc_id").map(str::to_string),
            version: row.version().unwrap_or(0),
            entity_id,
        })
    }
}

fn push_mentions(into: &mut Vec<String>, new: &[String]) {
    for mention in new {
        if into.len() >= AGGREGATE_MAX_MENTIONS {
            break;
        }
        if !mention.is_empty() && !into.contains(mention) {
            into.push(mention.clone());
        }
    }
}

fn entity_id_of(row: &Row) -> Option<String> {
    row.get_str("entity_id")
        .map(str::to_string)
        .or_else(|| row.sk.strip_prefix(keys::ENTITY_PREFIX).map(str::to_string))
        .filter(|id| !id.is_empty())
}

/// Snapshot of one entity as extracted from one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentEntityEdge {
    pub doc_id: String,
    pub entity_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub salience: f64,
    pub mentions: Vec<String>,
    pub user_id: String,
    pub updated_at: String,
}

impl DocumentEntityEdge {
    pub fn new(user_id: &str, doc_id: &str, entity: &Entity, now: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            entity_id: entity.entity_id.clone(),
            name: entity.name.clone(),
            entity_type: entity.entity_type,
            salience: entity.salience,
            mentions: entity.mentions.clone(),
            user_id: user_id.to_string(),
            updated_at: now.to_string(),
        }
    }

    pub fn to_row(&self) -> Row {
        Row::new(keys::doc_pk(&self.doc_id), keys::entity_sk(&self.entity_id))
            .with("doc_id", self.doc_id.as_str())
            .with("entity_id", self.entity_id.as_str())
            .with("entity_name", self.name.as_str())
            .with("entity_type", self.entity_type.as_str())
            .with("salience", self.salience)
            .with("mentions", self.mentions.clone())
            .with("user_id", self.user_id.as_str())
            .with("updated_at", self.updated_at.as_str())
    }

    pub fn from_row(row: &Row) -> Option<Self> {
        let entity_id = entity_id_of(row)?;
        Some(Self {
            doc_id: row
                .get_str("doc_id")
                .map(str::to_string)
                .unwrap_or_else(|| row.pk.trim_start_matches(keys::DOC_PREFIX).to_string()),
            name: row.get_str("entity_name").unwrap_or(&entity_id).to_string(),
            entity_type: row.get_str("entity_type").and_then(EntityType::normalize)?,
            salience: row.get_f64("salience").unwrap_or(0.0),
            mentions: row.get_str_list("mentions"),
            user_id: row.get_str("user_id").unwrap_or_default().to_string(),
            updated_at: row.get_str("updated_at").unwrap_or_default().to_string(),
            entity_id,
        })
    }
}

/// A document linked from an entity, as shown in the entity detail view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedDocument {
    pub doc_id: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub questions: Vec<String>,
    pub media_type: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub highlights: Vec<Highlight>,
}

impl From<DocumentRecord> for LinkedDocument {
    fn from(doc: DocumentRecord) -> Self {
        Self {
            doc_id: doc.doc_id,
            title: doc.filename,
            summary: doc.summary,
            questions: doc.questions,
            media_type: doc.media_type,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            highlights: doc.highlights,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDetail {
    pub entity: UserEntityAggregate,
    pub documents: Vec<LinkedDocument>,
}

// ── Adapter ───────────────────────────────────────────────────────────────────

/// Knowledge-graph adapter over the shared partition store.
#[derive(Clone)]
pub struct KnowledgeGraph {
    store: SharedStore,
    docs: DocumentStore,
    upsert_retries: usize,
}

impl KnowledgeGraph {
    pub fn new(store: SharedStore, upsert_retries: usize) -> Self {
        Self {
            docs: DocumentStore::new(store.clone()),
            store,
            upsert_retries: upsert_retries.max(1),
        }
    }

    pub(crate) fn documents(&self) -> &DocumentStore {
        &self.docs
    }

    /// Merge every entity of a freshly processed document into the user's
    /// aggregates and overwrite the document's entity edges.
    ///
    /// Returns the number of entities written.  Fails with
    /// [`AppError::VersionConflict`] if an aggregate keeps changing under us
    /// for `upsert_retries` attempts.
    pub fn upsert_knowledge_graph(
        &self,
        user_id: &str,
        doc_id: &str,
        entities: &[Entity],
    ) -> Result<usize, AppError> {
        if entities.is_empty() {
            return Ok(0);
        }
        let now = now_iso8601();
        for entity in entities {
            self.upsert_aggregate(user_id, doc_id, entity, &now)?;
            self.store
                .put(DocumentEntityEdge::new(user_id, doc_id, entity, &now).to_row())?;
        }
        info!(user_id, doc_id, entities = entities.len(), "knowledge graph updated");
        Ok(entities.len())
    }

    fn upsert_aggregate(
        &self,
        user_id: &str,
        doc_id: &str,
        entity: &Entity,
        now: &str,
    ) -> Result<(), AppError> {
        let pk = keys::user_pk(user_id);
        let sk = keys::entity_sk(&entity.entity_id);
        let mut last_conflict = None;

        for attempt in 1..=self.upsert_retries {
            let row = self.store.get(&pk, &sk)?;
            let expected = stored_version(row.as_ref());
            let existing = row.as_ref().and_then(UserEntityAggregate::from_row);
            if row.is_some() && existing.is_none() {
                warn!(key = %format!("{pk}/{sk}"), "replacing undecodable entity aggregate");
            }

            let mut merged = UserEntityAggregate::merge(existing.as_ref(), entity, doc_id, now);
            merged.version = expected.unwrap_or(0) + 1;

            match self.store.put_versioned(merged.to_row(user_id), expected) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_version_conflict() => {
                    debug!(entity_id = %entity.entity_id, attempt, "aggregate changed concurrently, retrying");
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(entity_id = %entity.entity_id, retries = self.upsert_retries, "aggregate upsert gave up");
        Err(last_conflict.unwrap_or_else(|| AppError::VersionConflict {
            key: format!("{pk}/{sk}"),
            expected: None,
            found: None,
        }))
    }

    /// All aggregates of a user, most-linked first, then by name.
    pub fn list_user_entities(&self, user_id: &str) -> Result<Vec<UserEntityAggregate>, AppError> {
        let rows = self.store.query(&keys::user_pk(user_id), keys::ENTITY_PREFIX)?;
        let mut entities: Vec<UserEntityAggregate> =
            rows.iter().filter_map(UserEntityAggregate::from_row).collect();
        entities.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then_with(|| a.name.cmp(&b.name)));
        Ok(entities)
    }

    /// Entity edges of one document, most salient first, then by name.
    pub fn get_document_entities(&self, doc_id: &str) -> Result<Vec<DocumentEntityEdge>, AppError> {
        let rows = self.store.query(&keys::doc_pk(doc_id), keys::ENTITY_PREFIX)?;
        let mut edges: Vec<DocumentEntityEdge> =
            rows.iter().filter_map(DocumentEntityEdge::from_row).collect();
        edges.sort_by(|a, b| {
            b.salience.total_cmp(&a.salience).then_with(|| a.name.cmp(&b.name))
        });
        Ok(edges)
    }

    /// The aggregate plus metadata of every document it links to.
    pub fn get_entity_detail(&self, user_id: &str, entity_id: &str) -> Result<EntityDetail, AppError> {
        let entity = self
            .get_entity(user_id, entity_id)?
            .ok_or_else(|| AppError::NotFound(format!("entity {entity_id}")))?;
        let documents = self
            .docs
            .fetch_many(user_id, &entity.doc_ids)?
            .into_iter()
            .map(LinkedDocument::from)
            .collect();
        Ok(EntityDetail { entity, documents })
    }

    pub fn get_entity(&self, user_id: &str, entity_id: &str) -> Result<Option<UserEntityAggregate>, AppError> {
        Ok(self
            .store
            .get(&keys::user_pk(user_id), &keys::entity_sk(entity_id))?
            .as_ref()
            .and_then(UserEntityAggregate::from_row))
    }
}

/// Entities as stored on the document record: salience rounded to 4 places.
pub fn entities_to_document_payload(entities: &[Entity]) -> Vec<Entity> {
    entities
        .iter()
        .map(|e| Entity { salience: crate::analytics::series::round_to(e.salience, 4), ..e.clone() })
        .collect()
}
