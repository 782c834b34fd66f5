//! Personal knowledge graph: entity normalisation, extraction, persistence
//! and document relationships.

pub mod entity;
pub mod extraction;
pub mod relationships;
pub mod store;

pub use entity::{Entity, EntityType, consolidate_entities, normalize_entity, slugify};
pub use extraction::{parse_entity_payload, run_entity_extraction};
pub use relationships::{DocumentRelationshipEdge, GraphOverview, compute_doc_relationships};
pub use store::{DocumentEntityEdge, EntityDetail, KnowledgeGraph, UserEntityAggregate};
