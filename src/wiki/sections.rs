//! Wiki sections: sanitation of caller input and markdown rendering.

use serde::{Deserialize, Serialize};

pub const MAX_SECTIONS: usize = 12;
pub const TITLE_MAX_CHARS: usize = 200;
pub const CONTENT_MAX_CHARS: usize = 15_000;

pub const UNTITLED_SECTION: &str = "Untitled";
pub const UNTITLED_PAGE: &str = "Untitled Wiki";

/// A stored section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiSection {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub last_modified: String,
}

/// A section as supplied by a caller; every field is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionInput {
    pub id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub last_modified: Option<String>,
}

impl SectionInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { title: Some(title.into()), content: Some(content.into()), ..Self::default() }
    }
}

impl From<WikiSection> for SectionInput {
    fn from(s: WikiSection) -> Self {
        Self {
            id: Some(s.id),
            title: Some(s.title),
            content: Some(s.content),
            last_modified: Some(s.last_modified).filter(|t| !t.is_empty()),
        }
    }
}

/// Cleaned sections plus human-readable notes about what was changed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sanitized {
    pub sections: Vec<WikiSection>,
    pub warnings: Vec<String>,
}

fn truncate_chars(value: &str, max: usize) -> Option<String> {
    value
        .char_indices()
        .nth(max)
        .map(|(byte_idx, _)| value[..byte_idx].to_string())
}

/// Clean caller-supplied sections.
///
/// Titles and content are trimmed; a section with neither is dropped.  Ids
/// default to `section-{n}` (1-based input position).  Overlong titles and
/// content are cut with a warning.  At most [`MAX_SECTIONS`] are kept and
/// the rest are dropped silently.
pub fn sanitize_sections<I>(input: I, now: &str) -> Sanitized
where
    I: IntoIterator<Item = SectionInput>,
{
    let mut out = Sanitized::default();
    for (idx, section) in input.into_iter().enumerate() {
        if out.sections.len() >= MAX_SECTIONS {
            break;
        }
        let id = section
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("section-{}", idx + 1));
        let mut title = section.title.as_deref().unwrap_or("").trim().to_string();
        let mut content = section.content.as_deref().unwrap_or("").trim().to_string();
        if title.is_empty() && content.is_empty() {
            continue;
        }
        if let Some(cut) = truncate_chars(&title, TITLE_MAX_CHARS) {
            title = cut;
            out.warnings.push(format!("Section {id} title truncated"));
        }
        if let Some(cut) = truncate_chars(&content, CONTENT_MAX_CHARS) {
            content = cut;
            out.warnings.push(format!("Section {id} content truncated"));
        }
        if title.is_empty() {
            title = UNTITLED_SECTION.to_string();
        }
        let last_modified = section
            .last_modified
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| now.to_string());
        out.sections.push(WikiSection { id, title, content, last_modified });
    }
    out
}

/// Render a page as markdown: `# title`, then `## section` blocks separated
/// by blank lines.  Always ends with exactly one newline.
pub fn export_markdown(title: &str, sections: &[WikiSection]) -> String {
    let title = match title.trim() {
        "" => UNTITLED_PAGE,
        t => t,
    };
    let mut parts = vec![format!("# {title}")];
    for section in sections {
        let heading = match section.title.trim() {
            "" => UNTITLED_SECTION,
            t => t,
        };
        parts.push(format!("\n## {heading}\n\n{}", section.content));
    }
    let mut markdown = parts.join("\n").trim().to_string();
    markdown.push('\n');
    markdown
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2025-05-01T00:00:00Z";

    #[test]
    fn defaults_and_trimming() {
        let out = sanitize_sections(
            vec![
                SectionInput { id: Some("intro".into()), ..SectionInput::new("  Intro ", " Hello ") },
                SectionInput::new("", "body only"),
                SectionInput::new("   ", "  "),
                SectionInput { last_modified: Some("2020-01-01".into()), ..SectionInput::new("T", "") },
            ],
            NOW,
        );
        assert!(out.warnings.is_empty());
        let ids: Vec<&str> = out.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["intro", "section-2", "section-4"]);
        assert_eq!(out.sections[0].title, "Intro");
        assert_eq!(out.sections[0].content, "Hello");
        assert_eq!(out.sections[1].title, "Untitled");
        assert_eq!(out.sections[1].last_modified, NOW);
        assert_eq!(out.sections[2].last_modified, "2020-01-01");
    }

    #[test]
    fn long_title_truncated_with_warning() {
        let out = sanitize_sections(vec![SectionInput::new("t".repeat(500), "x")], NOW);
        assert_eq!(out.sections[0].title.chars().count(), TITLE_MAX_CHARS);
        assert_eq!(out.warnings, vec!["Section section-1 title truncated"]);
    }

    #[test]
    fn long_content_truncated_with_warning() {
        let out = sanitize_sections(vec![SectionInput::new("T", "é".repeat(15_001))], NOW);
        assert_eq!(out.sections[0].content.chars().count(), CONTENT_MAX_CHARS);
        assert_eq!(out.warnings, vec!["Section section-1 content truncated"]);
    }

    #[test]
    fn capped_at_twelve_without_warning() {
        let input: Vec<SectionInput> =
            (0..20).map(|i| SectionInput::new(format!("S{i}"), "c")).collect();
        let out = sanitize_sections(input, NOW);
        assert_eq!(out.sections.len(), MAX_SECTIONS);
        assert_eq!(out.sections[11].title, "S11");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn markdown_layout() {
        let sections = sanitize_sections(
            vec![SectionInput::new("Overview", "Summary"), SectionInput::new("Next Steps", "Plan")],
            NOW,
        )
        .sections;
        let md = export_markdown("Project Atlas", &sections);
        assert_eq!(md, "# Project Atlas\n\n## Overview\n\nSummary\n\n## Next Steps\n\nPlan\n");
        assert!(md.lines().any(|l| l == "# Project Atlas"));
        assert!(md.lines().any(|l| l == "## Next Steps"));
    }

    #[test]
    fn markdown_empty_page() {
        assert_eq!(export_markdown("  ", &[]), "# Untitled Wiki\n");
    }
}
