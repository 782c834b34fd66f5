//! Operation surface: one entry point per caller-visible operation.
//!
//! Every operation checks its identifiers before touching the store, so a
//! missing user, entity, document or page id is always
//! [`ErrorKind::InvalidRequest`](crate::error::ErrorKind::InvalidRequest)
//! and never a partial read or write.

use tracing::info;

use crate::analytics::{TemporalAnalyticsEngine, TemporalAnalyticsSnapshot};
use crate::config::Config;
use crate::documents::{DocumentRecord, DocumentStore};
use crate::error::{AppError, require_id};
use crate::graph::relationships::GraphOverview;
use crate::graph::store::{DocumentEntityEdge, EntityDetail, UserEntityAggregate};
use crate::graph::KnowledgeGraph;
use crate::ingest::{IngestReport, Ingestor};
use crate::llm::{LlmProvider, providers};
use crate::store::{self, SharedStore};
use crate::wiki::{SavedPage, WikiGenerator, WikiPage, WikiPageSummary, WikiSaveRequest, WikiSection, WikiStore};

#[derive(Clone)]
pub struct DocGraph {
    store: SharedStore,
    llm: LlmProvider,
    docs: DocumentStore,
    graph: KnowledgeGraph,
    analytics: TemporalAnalyticsEngine,
    wiki: WikiStore,
    ingestor: Ingestor,
}

impl DocGraph {
    /// Wire every component over `store`.
    pub fn new(store: SharedStore, llm: LlmProvider, config: &Config) -> Self {
        let docs = DocumentStore::new(store.clone());
        let graph = KnowledgeGraph::new(store.clone(), config.graph.upsert_retries);
        let analytics = TemporalAnalyticsEngine::new(store.clone(), &config.analytics);
        let generator = WikiGenerator::new(graph.clone(), docs.clone(), analytics.clone());
        let wiki = WikiStore::new(store.clone(), generator);
        let ingestor = Ingestor::new(docs.clone(), graph.clone(), llm.clone(), config.extraction.max_chars);
        Self { store, llm, docs, graph, analytics, wiki, ingestor }
    }

    /// Open the configured store and model provider.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let store = store::open(&config.store)?;
        let llm = providers::build(&config.llm, config.llm_api_key.clone())
            .map_err(|e| AppError::Config(e.to_string()))?;
        info!(store = store.store_type(), provider = llm.name(), "docgraph ready");
        Ok(Self::new(store, llm, config))
    }

    pub fn store_type(&self) -> &str {
        self.store.store_type()
    }

    pub fn provider_name(&self) -> &'static str {
        self.llm.name()
    }

    // ── Documents ─────────────────────────────────────────────────────────────

    /// Store and process an uploaded document.
    pub async fn ingest_document(&self, user_id: &str, mut document: DocumentRecord) -> Result<IngestReport, AppError> {
        let user_id = require_id(user_id, "user_id")?;
        document.doc_id = require_id(&document.doc_id, "doc_id")?.to_string();
        self.ingestor.ingest(user_id, document).await
    }

    pub fn get_document(&self, user_id: &str, doc_id: &str) -> Result<DocumentRecord, AppError> {
        let user_id = require_id(user_id, "user_id")?;
        let doc_id = require_id(doc_id, "doc_id")?;
        self.docs
            .get(user_id, doc_id)?
            .ok_or_else(|| AppError::NotFound(format!("document {doc_id}")))
    }

    // ── Knowledge graph ───────────────────────────────────────────────────────

    pub fn list_entities(&self, user_id: &str) -> Result<Vec<UserEntityAggregate>, AppError> {
        self.graph.list_user_entities(require_id(user_id, "user_id")?)
    }

    pub fn get_entity_detail(&self, user_id: &str, entity_id: &str) -> Result<EntityDetail, AppError> {
        let user_id = require_id(user_id, "user_id")?;
        let entity_id = require_id(entity_id, "entity_id")?;
        self.graph.get_entity_detail(user_id, entity_id)
    }

    pub fn get_document_entities(&self, doc_id: &str) -> Result<Vec<DocumentEntityEdge>, AppError> {
        self.graph.get_document_entities(require_id(doc_id, "doc_id")?)
    }

    /// Entities, document relationships and per-document metadata.
    pub fn graph_overview(&self, user_id: &str) -> Result<GraphOverview, AppError> {
        self.graph.overview(require_id(user_id, "user_id")?)
    }

    // ── Analytics ─────────────────────────────────────────────────────────────

    pub fn temporal_analytics(&self, user_id: &str, force: bool) -> Result<TemporalAnalyticsSnapshot, AppError> {
        self.analytics.snapshot(require_id(user_id, "user_id")?, force)
    }

    pub fn rebuild_analytics(&self, user_id: &str) -> Result<TemporalAnalyticsSnapshot, AppError> {
        self.temporal_analytics(user_id, true)
    }

    // ── Wiki ──────────────────────────────────────────────────────────────────

    pub fn list_wiki_pages(&self, user_id: &str) -> Result<Vec<WikiPageSummary>, AppError> {
        self.wiki.list_pages(require_id(user_id, "user_id")?)
    }

    pub fn get_wiki_page(
        &self,
        user_id: &str,
        page_id: &str,
        entity_id: Option<&str>,
        auto_create: bool,
    ) -> Result<WikiPage, AppError> {
        let user_id = require_id(user_id, "user_id")?;
        let page_id = require_id(page_id, "page_id")?;
        self.wiki.get_or_create(user_id, page_id, entity_id, auto_create)
    }

    /// Create or update a page.  A stale `version` fails with
    /// [`AppError::VersionConflict`]; re-read with [`get_wiki_page`](Self::get_wiki_page)
    /// and retry.
    pub fn save_wiki_page(&self, user_id: &str, request: WikiSaveRequest) -> Result<SavedPage, AppError> {
        self.wiki.save(require_id(user_id, "user_id")?, request)
    }

    pub fn export_wiki_markdown(&self, user_id: &str, page_id: &str) -> Result<String, AppError> {
        let user_id = require_id(user_id, "user_id")?;
        let page_id = require_id(page_id, "page_id")?;
        self.wiki.export_markdown(user_id, page_id)
    }

    /// Draft sections without saving them.
    pub fn generate_wiki_sections(&self, user_id: &str, entity_id: Option<&str>) -> Result<Vec<WikiSection>, AppError> {
        self.wiki.generator().generate_sections(require_id(user_id, "user_id")?, entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::PartitionStore;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    fn make_service() -> (Arc<MemoryStore>, DocGraph) {
        let store = Arc::new(MemoryStore::new());
        let config = Config::test_default(std::path::Path::new("/tmp"));
        let llm = LlmProvider::Dummy(Default::default());
        (store.clone(), DocGraph::new(store, llm, &config))
    }

    #[test]
    fn blank_ids_rejected_before_store_access() {
        let (store, svc) = make_service();
        let checks = [
            svc.list_entities(" ").unwrap_err().kind(),
            svc.get_entity_detail("u", "").unwrap_err().kind(),
            svc.get_document_entities("").unwrap_err().kind(),
            svc.graph_overview("").unwrap_err().kind(),
            svc.temporal_analytics("", false).unwrap_err().kind(),
            svc.list_wiki_pages("").unwrap_err().kind(),
            svc.get_wiki_page("u", " ", None, true).unwrap_err().kind(),
            svc.save_wiki_page("", WikiSaveRequest::default()).unwrap_err().kind(),
            svc.export_wiki_markdown("", "p").unwrap_err().kind(),
            svc.generate_wiki_sections("", None).unwrap_err().kind(),
        ];
        assert!(checks.iter().all(|k| *k == ErrorKind::InvalidRequest));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn ingest_requires_ids() {
        let (store, svc) = make_service();
        let err = svc.ingest_document("", DocumentRecord::new("", "d1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        let err = svc.ingest_document("u", DocumentRecord::new("", "")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn ingest_trims_padded_ids() {
        let (_, svc) = make_service();
        let report = svc.ingest_document(" u ", DocumentRecord::new("", " d1 ")).await.unwrap();
        assert_eq!(report.doc_id, "d1");
        let doc = svc.get_document("u", " d1 ").unwrap();
        assert_eq!(doc.doc_id, "d1");
        assert_eq!(doc.user_id, "u");
    }

    #[test]
    fn missing_entity_and_document_are_not_found() {
        let (_, svc) = make_service();
        assert_eq!(svc.get_entity_detail("u", "person-nobody").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(svc.get_document("u", "d1").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn rebuild_writes_analytics_cache() {
        let (store, svc) = make_service();
        let snap = svc.rebuild_analytics("u").unwrap();
        assert_eq!(snap.user_id, "u");
        assert!(store.get("USER#u", "ANALYTICS#TEMPORAL").unwrap().is_some());
        assert_eq!(svc.store_type(), "memory");
        assert_eq!(svc.provider_name(), "dummy");
    }
}
