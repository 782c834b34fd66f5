//! Upload pipeline: persist the document, extract entities, fold them into
//! the knowledge graph.
//!
//! Only the first step is allowed to fail the upload.  Extraction and graph
//! persistence are best-effort and log a warning on failure.

use serde::Serialize;
use tracing::{info, warn};

use crate::documents::{DocumentRecord, DocumentStore};
use crate::error::AppError;
use crate::graph::extraction::run_entity_extraction;
use crate::graph::store::entities_to_document_payload;
use crate::graph::KnowledgeGraph;
use crate::llm::LlmProvider;
use crate::time::now_iso8601;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    /// Entities extracted from the document.
    pub entities: usize,
    /// Whether the entity graph was written.
    pub graph_updated: bool,
}

#[derive(Clone)]
pub struct Ingestor {
    docs: DocumentStore,
    graph: KnowledgeGraph,
    llm: LlmProvider,
    max_chars: usize,
}

impl Ingestor {
    pub fn new(docs: DocumentStore, graph: KnowledgeGraph, llm: LlmProvider, max_chars: usize) -> Self {
        Self { docs, graph, llm, max_chars }
    }

    /// Store `document` for `user_id` and process it.
    ///
    /// Store calls run on the blocking pool.
    pub async fn ingest(&self, user_id: &str, mut document: DocumentRecord) -> Result<IngestReport, AppError> {
        document.user_id = user_id.to_string();
        let now = now_iso8601();
        for ts in [&mut document.created_at, &mut document.updated_at] {
            if ts.as_deref().is_none_or(str::is_empty) {
                *ts = Some(now.clone());
            }
        }
        self.put_document(&document).await?;

        let entities = run_entity_extraction(document.text(), &self.llm, self.max_chars).await;
        if entities.is_empty() {
            info!(user_id, doc_id = %document.doc_id, "document stored without entities");
            return Ok(IngestReport { doc_id: document.doc_id, entities: 0, graph_updated: false });
        }

        document.entities = entities_to_document_payload(&entities);
        if let Err(e) = self.put_document(&document).await {
            warn!(user_id, doc_id = %document.doc_id, error = %e, "failed to attach entities to document");
        }

        let graph = self.graph.clone();
        let (owner, doc_id, batch) = (user_id.to_string(), document.doc_id.clone(), entities.clone());
        let upsert = blocking("graph upsert", move || graph.upsert_knowledge_graph(&owner, &doc_id, &batch)).await;
        let graph_updated = match upsert {
            Ok(_) => true,
            Err(e) => {
                warn!(user_id, doc_id = %document.doc_id, error = %e, "knowledge graph update failed");
                false
            }
        };

        info!(user_id, doc_id = %document.doc_id, entities = entities.len(), graph_updated, "document ingested");
        Ok(IngestReport { doc_id: document.doc_id, entities: entities.len(), graph_updated })
    }

    async fn put_document(&self, document: &DocumentRecord) -> Result<(), AppError> {
        let docs = self.docs.clone();
        let record = document.clone();
        blocking("document put", move || docs.put(&record)).await
    }
}

async fn blocking<T, F>(what: &'static str, f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Store(format!("{what} join: {e}")))?
}
