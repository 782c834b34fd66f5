//! Draft wiki sections from a user's documents and analytics.

use tracing::debug;

use crate::analytics::{TemporalAnalyticsEngine, TemporalAnalyticsSnapshot};
use crate::documents::{DocumentRecord, DocumentStore};
use crate::error::AppError;
use crate::graph::KnowledgeGraph;
use crate::time::now_iso8601;
use super::sections::{MAX_SECTIONS, WikiSection};

const OVERVIEW_DOCS: usize = 3;
const OVERVIEW_SNIPPET_CHARS: usize = 400;
const TOPIC_MONTHS: usize = 2;
const TIMELINE_POINTS: usize = 7;

pub const NO_DOCUMENTS: &str = "- No linked documents yet. Start by attaching key notes or uploads.";

/// Builds sections from the graph, the document store and analytics.
#[derive(Clone)]
pub struct WikiGenerator {
    graph: KnowledgeGraph,
    docs: DocumentStore,
    analytics: TemporalAnalyticsEngine,
}

impl WikiGenerator {
    pub fn new(graph: KnowledgeGraph, docs: DocumentStore, analytics: TemporalAnalyticsEngine) -> Self {
        Self { graph, docs, analytics }
    }

    /// Sections for an entity page, or for the whole corpus when
    /// `entity_id` is `None`.  An entity with no resolvable documents falls
    /// back to all of the user's documents.
    pub fn generate_sections(
        &self,
        user_id: &str,
        entity_id: Option<&str>,
    ) -> Result<Vec<WikiSection>, AppError> {
        let mut documents = Vec::new();
        if let Some(entity_id) = entity_id.filter(|id| !id.is_empty()) {
            if let Some(aggregate) = self.graph.get_entity(user_id, entity_id)? {
                documents = self.docs.fetch_many(user_id, &aggregate.doc_ids)?;
            }
        }
        if documents.is_empty() {
            documents = self.docs.list(user_id)?;
        }
        documents.sort_by(|a, b| b.recency_key().cmp(a.recency_key()));

        let analytics = self.analytics.snapshot(user_id, false)?;
        let sections = build_sections(&documents, &analytics, &now_iso8601());
        debug!(user_id, entity_id, documents = documents.len(), sections = sections.len(), "wiki sections generated");
        Ok(sections)
    }
}

/// Pure section builder.  `documents` must already be newest first.
pub fn build_sections(
    documents: &[DocumentRecord],
    analytics: &TemporalAnalyticsSnapshot,
    now: &str,
) -> Vec<WikiSection> {
    let section = |id: &str, title: &str, content: String| WikiSection {
        id: id.to_string(),
        title: title.to_string(),
        content,
        last_modified: now.to_string(),
    };
    let mut sections = Vec::new();

    let overview: Vec<String> = documents
        .iter()
        .take(OVERVIEW_DOCS)
        .map(|doc| {
            let blurb = doc
                .summary
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    doc.content.as_deref().unwrap_or("").chars().take(OVERVIEW_SNIPPET_CHARS).collect()
                });
            format!("- **{}**: {}", doc.title(), blurb)
        })
        .collect();
    let overview = if overview.is_empty() { NO_DOCUMENTS.to_string() } else { overview.join("\n") };
    sections.push(section("overview", "Overview", overview));

    let months = &analytics.monthly_topics;
    if !months.is_empty() {
        let lines: Vec<String> = months[months.len().saturating_sub(TOPIC_MONTHS)..]
            .iter()
            .map(|m| {
                let topics = if m.topics.is_empty() {
                    "No topics yet".to_string()
                } else {
                    m.topics
                        .iter()
                        .map(|t| format!("{} ({})", t.topic, t.count))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                format!("- **{}**: {}", m.month, topics)
            })
            .collect();
        sections.push(section("topics", "Trending Topics", lines.join("\n")));
    }

    if !analytics.insights.is_empty() {
        let lines: Vec<String> = analytics.insights.iter().map(|i| format!("- {i}")).collect();
        sections.push(section("insights", "Insights & Next Steps", lines.join("\n")));
    }

    let timeline = &analytics.sentiment_timeline;
    if !timeline.is_empty() {
        let lines: Vec<String> = timeline[timeline.len().saturating_sub(TIMELINE_POINTS)..]
            .iter()
            .map(|p| format!("- {}: sentiment {:+.2}, emotion {}, {} words", p.date, p.sentiment, p.emotion, p.words))
            .collect();
        sections.push(section("timeline", "Recent Sentiment Timeline", lines.join("\n")));
    }

    sections.truncate(MAX_SECTIONS);
    sections
}
