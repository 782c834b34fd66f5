//! Versioned wiki pages under `USER#{user}` / `WIKI#{page_id}`.
//!
//! Every successful save bumps `version` by exactly one.  A save against an
//! existing page must carry the version it last read; anything else is a
//! [`AppError::VersionConflict`] and nothing is written.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analytics::text::title_case;
use crate::error::AppError;
use crate::store::{Row, SharedStore, keys, stored_version};
use crate::time::now_iso8601;
use super::generator::WikiGenerator;
use super::sections::{SectionInput, UNTITLED_PAGE, WikiSection, export_markdown, sanitize_sections};

fn first_version() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiPage {
    #[serde(default)]
    pub page_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub sections: Vec<WikiSection>,
    /// Pages written before versioning read as version 1.
    #[serde(default = "first_version")]
    pub version: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub section_count: Option<usize>,
}

impl WikiPage {
    pub fn to_row(&self, user_id: &str) -> Result<Row, AppError> {
        let attrs = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(AppError::Store(format!("wiki page {} is not an object", self.page_id))),
            Err(e) => return Err(AppError::Store(format!("serialize wiki page {}: {e}", self.page_id))),
        };
        Ok(Row {
            pk: keys::user_pk(user_id),
            sk: keys::wiki_sk(&self.page_id),
            attrs,
        })
    }

    pub fn from_row(row: &Row) -> Result<Self, AppError> {
        let mut page: WikiPage = serde_json::from_value(Value::Object(row.attrs.clone()))
            .map_err(|e| AppError::Store(format!("malformed wiki row {}: {e}", row.key())))?;
        if page.page_id.is_empty() {
            page.page_id = row.sk.trim_start_matches(keys::WIKI_PREFIX).to_string();
        }
        Ok(page)
    }

    pub fn to_markdown(&self) -> String {
        export_markdown(&self.title, &self.sections)
    }
}

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WikiPageSummary {
    pub page_id: String,
    pub title: String,
    pub entity_id: Option<String>,
    pub version: i64,
    pub section_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&WikiPage> for WikiPageSummary {
    fn from(page: &WikiPage) -> Self {
        Self {
            page_id: page.page_id.clone(),
            title: page.title.clone(),
            entity_id: page.entity_id.clone(),
            version: page.version,
            section_count: page.section_count.unwrap_or(page.sections.len()),
            created_at: page.created_at.clone(),
            updated_at: page.updated_at.clone(),
        }
    }
}

/// A create/update request as a caller sends it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WikiSaveRequest {
    pub page_id: Option<String>,
    pub title: Option<String>,
    pub entity_id: Option<String>,
    pub sections: Vec<SectionInput>,
    /// Version last read; `None` when creating.
    pub version: Option<i64>,
    /// Replace `sections` with freshly generated ones.
    pub auto_generate: bool,
}

impl WikiSaveRequest {
    /// Explicit page id, else the entity anchor, else a fresh `wiki-xxxxxxxx`.
    pub fn resolve_page_id(&self) -> String {
        non_empty(&self.page_id)
            .or_else(|| non_empty(&self.entity_id))
            .map(str::to_string)
            .unwrap_or_else(new_page_id)
    }

    /// Explicit title, else the entity anchor de-hyphenated and title-cased.
    pub fn resolve_title(&self) -> String {
        if let Some(title) = non_empty(&self.title) {
            return title.to_string();
        }
        match non_empty(&self.entity_id) {
            Some(entity_id) => title_case(&entity_id.replace('-', " ")),
            None => UNTITLED_PAGE.to_string(),
        }
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedPage {
    pub page: WikiPage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

pub fn new_page_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("wiki-{}", &hex[..8])
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct WikiStore {
    store: SharedStore,
    generator: WikiGenerator,
}

impl WikiStore {
    pub fn new(store: SharedStore, generator: WikiGenerator) -> Self {
        Self { store, generator }
    }

    pub fn generator(&self) -> &WikiGenerator {
        &self.generator
    }

    pub fn list_pages(&self, user_id: &str) -> Result<Vec<WikiPageSummary>, AppError> {
        let rows = self.store.query(&keys::user_pk(user_id), keys::WIKI_PREFIX)?;
        rows.iter()
            .map(|row| WikiPage::from_row(row).map(|p| WikiPageSummary::from(&p)))
            .collect()
    }

    pub fn get_page(&self, user_id: &str, page_id: &str) -> Result<Option<WikiPage>, AppError> {
        self.store
            .get(&keys::user_pk(user_id), &keys::wiki_sk(page_id))?
            .map(|row| WikiPage::from_row(&row))
            .transpose()
    }

    /// Fetch a page; when absent and `auto_create` is set, generate and save
    /// it first.  Absent without `auto_create` is [`AppError::NotFound`].
    pub fn get_or_create(
        &self,
        user_id: &str,
        page_id: &str,
        entity_id: Option<&str>,
        auto_create: bool,
    ) -> Result<WikiPage, AppError> {
        if let Some(page) = self.get_page(user_id, page_id)? {
            return Ok(page);
        }
        if !auto_create {
            return Err(AppError::NotFound(format!("wiki page {page_id}")));
        }
        let entity_id = entity_id.filter(|id| !id.is_empty());
        let title = match entity_id {
            Some(id) => id.to_string(),
            None => title_case(&page_id.replace('-', " ")),
        };
        let generated = self.generator.generate_sections(user_id, entity_id)?;
        let saved = self.save_page(
            user_id,
            page_id,
            &title,
            entity_id,
            generated.into_iter().map(SectionInput::from).collect(),
            None,
        )?;
        info!(user_id, page_id, sections = saved.page.sections.len(), "wiki page auto-created");
        Ok(saved.page)
    }

    /// Create or update from a caller request.
    pub fn save(&self, user_id: &str, request: WikiSaveRequest) -> Result<SavedPage, AppError> {
        let page_id = request.resolve_page_id();
        let title = request.resolve_title();
        let entity_id = non_empty(&request.entity_id);
        let sections = if request.auto_generate {
            self.generator
                .generate_sections(user_id, entity_id)?
                .into_iter()
                .map(SectionInput::from)
                .collect()
        } else {
            request.sections.clone()
        };
        self.save_page(user_id, &page_id, &title, entity_id, sections, request.version)
    }

    /// Sanitize and write one page, version-checked against the stored row.
    pub fn save_page(
        &self,
        user_id: &str,
        page_id: &str,
        title: &str,
        entity_id: Option<&str>,
        sections: Vec<SectionInput>,
        version: Option<i64>,
    ) -> Result<SavedPage, AppError> {
        let now = now_iso8601();
        let cleaned = sanitize_sections(sections, &now);
        let pk = keys::user_pk(user_id);
        let sk = keys::wiki_sk(page_id);

        let existing = self.store.get(&pk, &sk)?;
        let (new_version, created_at) = match &existing {
            Some(row) => {
                let current = WikiPage::from_row(row)?;
                if version != Some(current.version) {
                    debug!(user_id, page_id, supplied = ?version, stored = current.version, "stale wiki save");
                    return Err(AppError::VersionConflict {
                        key: row.key(),
                        expected: version,
                        found: Some(current.version),
                    });
                }
                (current.version + 1, current.created_at)
            }
            None => (1, now.clone()),
        };

        let page = WikiPage {
            page_id: page_id.to_string(),
            title: if title.is_empty() { UNTITLED_PAGE.to_string() } else { title.to_string() },
            entity_id: entity_id.map(str::to_string),
            section_count: Some(cleaned.sections.len()),
            sections: cleaned.sections,
            version: new_version,
            created_at,
            updated_at: now,
        };
        self.store
            .put_versioned(page.to_row(user_id)?, stored_version(existing.as_ref()))?;
        info!(user_id, page_id, version = page.version, "wiki page saved");
        Ok(SavedPage { page, warnings: cleaned.warnings })
    }

    pub fn export_markdown(&self, user_id: &str, page_id: &str) -> Result<String, AppError> {
        self.get_page(user_id, page_id)?
            .map(|page| page.to_markdown())
            .ok_or_else(|| AppError::NotFound(format!("wiki page {page_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::TemporalAnalyticsEngine;
    use crate::config::AnalyticsConfig;
    use crate::documents::{DocumentRecord, DocumentStore};
    use crate::graph::KnowledgeGraph;
    use crate::store::PartitionStore;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    fn make_wiki() -> (Arc<MemoryStore>, WikiStore) {
        let store = Arc::new(MemoryStore::new());
        let shared: SharedStore = store.clone();
        let generator = WikiGenerator::new(
            KnowledgeGraph::new(shared.clone(), 3),
            DocumentStore::new(shared.clone()),
            TemporalAnalyticsEngine::new(shared.clone(), &AnalyticsConfig::default()),
        );
        (store, WikiStore::new(shared, generator))
    }

    fn request(page_id: &str, version: Option<i64>) -> WikiSaveRequest {
        WikiSaveRequest {
            page_id: Some(page_id.into()),
            title: Some("Atlas".into()),
            sections: vec![SectionInput::new("Overview", "text")],
            version,
            ..WikiSaveRequest::default()
        }
    }

    #[test]
    fn version_round_trip() {
        let (_, wiki) = make_wiki();
        let v1 = wiki.save("u", request("atlas", None)).unwrap().page;
        assert_eq!(v1.version, 1);

        let v2 = wiki.save("u", request("atlas", Some(1))).unwrap().page;
        assert_eq!(v2.version, 2);
        assert_eq!(v2.created_at, v1.created_at);

        let err = wiki.save("u", request("atlas", Some(1))).unwrap_err();
        assert!(err.is_version_conflict());
        assert_eq!(wiki.get_page("u", "atlas").unwrap().unwrap().version, 2);
    }

    #[test]
    fn missing_version_on_existing_page_conflicts() {
        let (_, wiki) = make_wiki();
        wiki.save("u", request("atlas", None)).unwrap();
        assert!(wiki.save("u", request("atlas", None)).unwrap_err().is_version_conflict());
    }

    #[test]
    fn legacy_page_counts_as_version_one() {
        let (store, wiki) = make_wiki();
        store
            .put(Row::new("USER#u", "WIKI#old").with("page_id", "old").with("title", "Old"))
            .unwrap();
        let saved = wiki.save("u", request("old", Some(1))).unwrap().page;
        assert_eq!(saved.version, 2);
        assert_eq!(store.get("USER#u", "WIKI#old").unwrap().unwrap().version(), Some(2));
    }

    #[test]
    fn request_defaults() {
        let req = WikiSaveRequest { entity_id: Some("project-atlas".into()), ..WikiSaveRequest::default() };
        assert_eq!(req.resolve_page_id(), "project-atlas");
        assert_eq!(req.resolve_title(), "Project Atlas");

        let anon = WikiSaveRequest::default();
        let id = anon.resolve_page_id();
        assert!(id.starts_with("wiki-"));
        assert_eq!(id.len(), 13);
        assert_eq!(anon.resolve_title(), "Untitled Wiki");
    }

    #[test]
    fn warnings_and_summaries() {
        let (_, wiki) = make_wiki();
        let mut req = request("atlas", None);
        req.sections.push(SectionInput::new("t".repeat(300), "body"));
        req.sections.push(SectionInput::new("", ""));
        let saved = wiki.save("u", req).unwrap();
        assert_eq!(saved.warnings, vec!["Section section-2 title truncated"]);
        assert_eq!(saved.page.section_count, Some(2));

        let pages = wiki.list_pages("u").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_id, "atlas");
        assert_eq!(pages[0].section_count, 2);
        assert_eq!(pages[0].version, 1);
    }

    #[test]
    fn get_without_auto_create_is_not_found() {
        let (_, wiki) = make_wiki();
        let err = wiki.get_or_create("u", "missing", None, false).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn auto_create_generates_and_persists() {
        let (store, wiki) = make_wiki();
        let docs = DocumentStore::new(store.clone());
        let mut d = DocumentRecord::new("u", "d1");
        d.summary = Some("Kickoff notes".into());
        d.created_at = Some("2025-04-01T00:00:00Z".into());
        docs.put(&d).unwrap();

        let page = wiki.get_or_create("u", "team-notes", None, true).unwrap();
        assert_eq!(page.title, "Team Notes");
        assert_eq!(page.version, 1);
        assert_eq!(page.sections[0].id, "overview");
        assert_eq!(page.sections[0].content, "- **d1**: Kickoff notes");

        let again = wiki.get_or_create("u", "team-notes", None, true).unwrap();
        assert_eq!(again.version, 1);
    }

    #[test]
    fn export_renders_stored_page() {
        let (_, wiki) = make_wiki();
        wiki.save("u", request("atlas", None)).unwrap();
        assert_eq!(wiki.export_markdown("u", "atlas").unwrap(), "# Atlas\n\n## Overview\n\ntext\n");
        assert!(wiki.export_markdown("u", "nope").is_err());
    }
}
