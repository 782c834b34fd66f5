//! End-to-end checks of the graph, analytics and wiki invariants through
//! the public API, against the in-memory store.

use std::sync::Arc;

use serde_json::{Value, json};

use docgraph::analytics::insights::{SENTIMENT_DOWN, generate_insights};
use docgraph::analytics::series::moving_average;
use docgraph::analytics::text::{Emotion, estimate_sentiment};
use docgraph::graph::{KnowledgeGraph, compute_doc_relationships, consolidate_entities, normalize_entity};
use docgraph::store::SharedStore;
use docgraph::store::memory::MemoryStore;
use docgraph::wiki::{SectionInput, WikiSaveRequest, export_markdown, sanitize_sections};
use docgraph::{DocGraph, config::Config, llm::LlmProvider};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn make_service() -> DocGraph {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let config = Config::test_default(std::path::Path::new("/tmp/docgraph-test"));
    DocGraph::new(store, LlmProvider::Dummy(Default::default()), &config)
}

fn raw(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

fn page(version: Option<i64>) -> WikiSaveRequest {
    WikiSaveRequest {
        page_id: Some("atlas".into()),
        title: Some("Project Atlas".into()),
        sections: vec![SectionInput::new("Overview", "Summary")],
        version,
        ..WikiSaveRequest::default()
    }
}

// ── Entities ──────────────────────────────────────────────────────────────────

#[test]
fn normalization_is_deterministic() {
    let a = normalize_entity(&raw(json!({"name": "Ada Lovelace", "type": "person"}))).unwrap();
    let b = normalize_entity(&raw(json!({"name": "Ada Lovelace", "type": " PERSON "}))).unwrap();
    let c = normalize_entity(&raw(json!({"name": "Acme", "type": "company"}))).unwrap();
    let d = normalize_entity(&raw(json!({"name": "Acme", "type": "Organization"}))).unwrap();
    assert_eq!(a.entity_id, b.entity_id);
    assert_eq!(c.entity_id, d.entity_id);
    assert_eq!(c.entity_id, "org-acme");
}

#[test]
fn consolidation_is_idempotent() {
    let batch = vec![
        json!({"name": "Ada", "type": "PERSON", "salience": 0.3, "mentions": ["Ada said"]}),
        json!({"name": "Ada", "type": "person", "salience": 0.8, "mentions": ["Ada said", "again"]}),
        json!({"name": "Paris", "type": "CITY", "salience": "0.5"}),
        json!("not an object"),
    ];
    let first = consolidate_entities(&batch);
    let second = consolidate_entities(&batch);
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].salience, 0.8);
    assert_eq!(first[0].mentions, vec!["Ada said", "again"]);
}

#[test]
fn aggregate_is_monotonic_across_documents() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let graph = KnowledgeGraph::new(store, 3);
    let saliences = [0.4, 0.9, 0.2, 0.6, 0.1];
    let mut last_salience = 0.0;

    for (n, salience) in saliences.iter().enumerate() {
        let entities = consolidate_entities(&[json!({"name": "Ada", "type": "PERSON", "salience": salience})]);
        graph.upsert_knowledge_graph("u", &format!("doc-{n}"), &entities).unwrap();

        let agg = graph.get_entity("u", "person-ada").unwrap().unwrap();
        assert_eq!(agg.doc_count, n + 1);
        assert_eq!(agg.doc_ids.len(), n + 1);
        assert!(agg.salience >= last_salience);
        last_salience = agg.salience;
    }
    assert_eq!(last_salience, 0.9);
}

#[test]
fn relationships_are_symmetric() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let graph = KnowledgeGraph::new(store, 3);
    let ada = consolidate_entities(&[json!({"name": "Ada", "type": "PERSON"})]);
    let both = consolidate_entities(&[
        json!({"name": "Ada", "type": "PERSON"}),
        json!({"name": "Paris", "type": "LOCATION"}),
    ]);
    graph.upsert_knowledge_graph("u", "b", &both).unwrap();
    graph.upsert_knowledge_graph("u", "a", &both).unwrap();
    graph.upsert_knowledge_graph("u", "c", &ada).unwrap();

    let (edges, _) = compute_doc_relationships(&graph.list_user_entities("u").unwrap());
    let pairs: Vec<(&str, &str, usize)> =
        edges.iter().map(|e| (e.source.as_str(), e.target.as_str(), e.weight)).collect();
    assert_eq!(pairs, vec![("a", "b", 2), ("a", "c", 1), ("b", "c", 1)]);
}

// ── Analytics ─────────────────────────────────────────────────────────────────

#[test]
fn moving_average_boundary() {
    assert_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3), vec![1.0, 1.5, 2.0, 3.0, 4.0]);
}

#[test]
fn lexicon_free_text_is_neutral() {
    assert_eq!(estimate_sentiment("The committee reviewed quarterly figures"), (0.0, Emotion::Neutral));
}

#[test]
fn downward_trend_produces_insight() {
    let ma = [0.6, 0.6, 0.55, 0.5, 0.5, 0.45, 0.45, 0.4, 0.4];
    let insights = generate_insights(&ma, &[], &[]);
    assert!(insights.iter().any(|i| i == SENTIMENT_DOWN));
    assert!(insights[0].contains("downward"));
}

// ── Wiki ──────────────────────────────────────────────────────────────────────

#[test]
fn wiki_version_round_trip() {
    let svc = make_service();
    assert_eq!(svc.save_wiki_page("u", page(None)).unwrap().page.version, 1);
    assert_eq!(svc.save_wiki_page("u", page(Some(1))).unwrap().page.version, 2);

    let err = svc.save_wiki_page("u", page(Some(1))).unwrap_err();
    assert!(err.is_version_conflict());
    let latest = svc.get_wiki_page("u", "atlas", None, false).unwrap();
    assert_eq!(latest.version, 2);
}

#[test]
fn section_sanitation_caps() {
    let long = sanitize_sections(vec![SectionInput::new("x".repeat(500), "body")], "2025-01-01T00:00:00Z");
    assert_eq!(long.sections[0].title.chars().count(), 200);
    assert_eq!(long.warnings.len(), 1);

    let many: Vec<SectionInput> = (0..20).map(|i| SectionInput::new(format!("S{i}"), "c")).collect();
    assert_eq!(sanitize_sections(many, "2025-01-01T00:00:00Z").sections.len(), 12);
}

#[test]
fn markdown_export_scenario() {
    let sections = sanitize_sections(
        vec![SectionInput::new("Overview", "Summary"), SectionInput::new("Next Steps", "Plan")],
        "2025-01-01T00:00:00Z",
    )
    .sections;
    let md = export_markdown("Project Atlas", &sections);
    let lines: Vec<&str> = md.lines().collect();
    assert!(lines.contains(&"# Project Atlas"));
    assert!(lines.contains(&"## Next Steps"));
    assert!(md.ends_with("Plan\n"));
}
