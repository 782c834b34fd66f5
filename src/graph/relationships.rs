//! Document ↔ document relationships derived from shared entities, and the
//! graph overview that enriches each linked document with metadata.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::text::{Emotion, estimate_sentiment, word_count};
use crate::documents::DocumentRecord;
use crate::error::AppError;
use crate::time::parse_timestamp;
use super::store::{KnowledgeGraph, UserEntityAggregate};

/// Documents older than this many days have zero recency.
const RECENCY_HORIZON_DAYS: f64 = 150.0;
/// Recency assigned when a document carries no timestamp.
const RECENCY_UNKNOWN: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRelationshipEdge {
    pub source: String,
    pub target: String,
    /// Number of distinct entities the two documents share.
    pub weight: usize,
    /// Display names of the shared entities, first-seen order.
    pub shared_entities: Vec<String>,
}

/// How many entity aggregates reference each document.
pub type TouchCounts = BTreeMap<String, usize>;

/// Derive co-occurrence edges from a user's aggregates.
///
/// Every unordered pair of documents sharing an entity gets one edge
/// (`source < target`).  Edges are ordered by weight descending, then by the
/// `"source->target"` key.  The touch counts include single-document
/// entities.
pub fn compute_doc_relationships(
    aggregates: &[UserEntityAggregate],
) -> (Vec<DocumentRelationshipEdge>, TouchCounts) {
    let mut edges: BTreeMap<(String, String), DocumentRelationshipEdge> = BTreeMap::new();
    let mut touches = TouchCounts::new();

    for agg in aggregates {
        let doc_ids: Vec<&String> = agg.doc_ids.iter().collect::<BTreeSet<_>>().into_iter().collect();
        for doc_id in &doc_ids {
            *touches.entry((*doc_id).clone()).or_default() += 1;
        }
        if doc_ids.len() < 2 {
            continue;
        }
        let label = if agg.name.is_empty() { &agg.entity_id } else { &agg.name };

        for (i, source) in doc_ids.iter().enumerate() {
            for target in &doc_ids[i + 1..] {
                let edge = edges
                    .entry(((*source).clone(), (*target).clone()))
                    .or_insert_with(|| DocumentRelationshipEdge {
                        source: (*source).clone(),
                        target: (*target).clone(),
                        weight: 0,
                        shared_entities: Vec::new(),
                    });
                edge.weight += 1;
                if !edge.shared_entities.contains(label) {
                    edge.shared_entities.push(label.clone());
                }
            }
        }
    }

    let mut edges: Vec<DocumentRelationshipEdge> = edges.into_values().collect();
    edges.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| format!("{}->{}", a.source, a.target).cmp(&format!("{}->{}", b.source, b.target)))
    });
    (edges, touches)
}

/// Per-document metadata attached to the graph overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentNode {
    pub title: String,
    pub summary: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// `1.0` for today, falling linearly to `0.0` at 150 days.
    pub recency_score: f64,
    pub sentiment_score: f64,
    pub emotion: Emotion,
    pub word_count: usize,
    /// Entities referencing this document.
    pub entity_count: usize,
}

/// Recency of a document last touched at `updated`.
pub fn recency_score(updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(updated) = updated else {
        return RECENCY_UNKNOWN;
    };
    let age_days = ((now - updated).num_seconds() as f64 / 86_400.0).max(0.0);
    (1.0 - age_days.min(RECENCY_HORIZON_DAYS) / RECENCY_HORIZON_DAYS).max(0.0)
}

impl DocumentNode {
    pub fn build(doc: &DocumentRecord, touches: &TouchCounts, now: DateTime<Utc>) -> Self {
        let updated = doc
            .updated_at
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(doc.created_at.as_deref())
            .and_then(parse_timestamp);
        let body = doc.text();
        let (sentiment_score, emotion) = estimate_sentiment(body);
        Self {
            title: doc.title().to_string(),
            summary: doc.summary.clone().unwrap_or_default(),
            created_at: doc.created_at.clone(),
            updated_at: doc.updated_at.clone(),
            recency_score: recency_score(updated, now),
            sentiment_score,
            emotion,
            word_count: word_count(body),
            entity_count: touches.get(&doc.doc_id).copied().unwrap_or(0),
        }
    }
}

/// Everything needed to draw a user's knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphOverview {
    pub user_id: String,
    pub entities: Vec<UserEntityAggregate>,
    pub doc_relationships: Vec<DocumentRelationshipEdge>,
    /// Keyed by document id; documents without a metadata row are absent.
    pub doc_metadata: BTreeMap<String, DocumentNode>,
}

impl KnowledgeGraph {
    pub fn overview(&self, user_id: &str) -> Result<GraphOverview, AppError> {
        self.overview_at(user_id, Utc::now())
    }

    pub fn overview_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<GraphOverview, AppError> {
        let entities = self.list_user_entities(user_id)?;
        let (doc_relationships, touches) = compute_doc_relationships(&entities);

        let doc_ids: Vec<String> = touches.keys().cloned().collect();
        let doc_metadata: BTreeMap<String, DocumentNode> = self
            .documents()
            .fetch_many(user_id, &doc_ids)?
            .iter()
            .filter(|doc| !doc.doc_id.is_empty())
            .map(|doc| (doc.doc_id.clone(), DocumentNode::build(doc, &touches, now)))
            .collect();

        Ok(GraphOverview {
            user_id: user_id.to_string(),
            entities,
            doc_relationships,
            doc_metadata,
        })
    }
}
