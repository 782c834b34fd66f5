//! Entity extraction through the configured language model.
//!
//! The model is a black box: text in, free-form text out.  Its reply is
//! parsed defensively; any failure along the way yields zero entities.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::llm::LlmProvider;
use super::entity::{Entity, consolidate_entities};

pub const ENTITY_EXTRACTION_PROMPT: &str = r#"Extract the most relevant named entities mentioned in the user's journal entry or document.

Return a JSON object with this shape:
{
  "entities": [
    {
      "name": "Canonical entity name",
      "type": "PERSON | ORG | PROJECT | EVENT | LOCATION | DATE | PRODUCT | WORK",
      "salience": 0.85,
      "mentions": [
        "Short quote (<=200 chars) showing how the entity was referenced",
        "Second mention if relevant"
      ]
    }
  ]
}

Rules:
- Include no more than 12 entities; prioritise the most important ones.
- Use salience between 0 and 1 (1 = very important to the entry).
- Mentions should be short, trimmed of newlines, and unique.
- If no entities are found, respond with {"entities": []}.
- Respond with JSON only; do not include any commentary.
"#;

/// Slice between the first `{` and the last `}` inclusive.
fn outer_json_block(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Pull the raw entity records out of a model reply.
///
/// Prose around the JSON is tolerated.  Reads `entities` (or `Entities`) and
/// keeps only object elements.  Never fails: anything unparseable is an
/// empty list.
pub fn parse_entity_payload(raw: &str) -> Vec<Map<String, Value>> {
    let Some(block) = outer_json_block(raw) else {
        return Vec::new();
    };
    let parsed: Value = match serde_json::from_str(block) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "extraction reply is not valid JSON");
            return Vec::new();
        }
    };
    let list = ["entities", "Entities"]
        .iter()
        .filter_map(|k| parsed.get(*k))
        .find_map(Value::as_array);
    match list {
        Some(items) => items.iter().filter_map(|v| v.as_object().cloned()).collect(),
        None => Vec::new(),
    }
}

/// The user message sent alongside [`ENTITY_EXTRACTION_PROMPT`].
pub fn build_user_message(snippet: &str) -> String {
    format!("Document excerpt:\n---\n{snippet}\n---\nReturn JSON as specified.")
}

/// Run the extraction prompt over the first `max_chars` characters of
/// `text`.  Blank text makes no model call.  Provider errors are logged and
/// treated as "no entities".
pub async fn run_entity_extraction(text: &str, llm: &LlmProvider, max_chars: usize) -> Vec<Entity> {
    let snippet: String = text.chars().take(max_chars).collect();
    if snippet.trim().is_empty() {
        return Vec::new();
    }

    let reply = match llm
        .complete(Some(ENTITY_EXTRACTION_PROMPT), &build_user_message(&snippet))
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(provider = llm.name(), error = %e, "entity extraction failed");
            return Vec::new();
        }
    };

    let raw: Vec<Value> = parse_entity_payload(&reply).into_iter().map(Value::Object).collect();
    let entities = consolidate_entities(&raw);
    debug!(raw = raw.len(), kept = entities.len(), "entities extracted");
    entities
}
