//! Derived wiki pages: generated sections, sanitation, versioned storage
//! and markdown export.

pub mod generator;
pub mod sections;
pub mod store;

pub use generator::{WikiGenerator, build_sections};
pub use sections::{SectionInput, WikiSection, export_markdown, sanitize_sections};
pub use store::{SavedPage, WikiPage, WikiPageSummary, WikiSaveRequest, WikiStore};
