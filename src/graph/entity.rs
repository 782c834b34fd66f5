//! Entity normalisation and per-document consolidation.
//!
//! Raw records come from model output and are loosely shaped JSON objects:
//! `name|label`, `type|category`, `salience`, `mentions|contexts`.  Anything
//! malformed is filtered or clamped here and never raised.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum length of an `entity_id`, in bytes (ids are ASCII).
pub const ENTITY_ID_MAX: usize = 80;
/// Mentions kept per document-level entity.
pub const MAX_MENTIONS: usize = 5;
/// Characters kept per mention.
pub const MENTION_MAX_CHARS: usize = 200;

/// Canonical entity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Person,
    Org,
    Project,
    Event,
    Location,
    Date,
    Work,
    Product,
}

impl EntityType {
    /// Map a raw type label onto the canonical set.  Case and surrounding
    /// whitespace are ignored; unknown labels yield `None`.
    pub fn normalize(raw: &str) -> Option<Self> {
        let t = match raw.trim().to_ascii_uppercase().as_str() {
            "PERSON" => Self::Person,
            "ORG" | "ORGANIZATION" | "COMPANY" => Self::Org,
            "PROJECT" | "INITIATIVE" => Self::Project,
            "EVENT" | "MEETING" => Self::Event,
            "LOCATION" | "PLACE" | "CITY" | "COUNTRY" => Self::Location,
            "DATE" | "TIME" => Self::Date,
            "WORK" | "WORK_OF_ART" | "BOOK" => Self::Work,
            "PRODUCT" => Self::Product,
            _ => return None,
        };
        Some(t)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Org => "ORG",
            Self::Project => "PROJECT",
            Self::Event => "EVENT",
            Self::Location => "LOCATION",
            Self::Date => "DATE",
            Self::Work => "WORK",
            Self::Product => "PRODUCT",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalised entity extracted from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Always within `[0, 1]`.
    pub salience: f64,
    /// At most [`MAX_MENTIONS`], unique, first-seen order.
    pub mentions: Vec<String>,
}

impl Entity {
    /// Deterministic id: `lower(type) + "-" + slug(name)`, cut to 80 bytes.
    ///
    /// Two distinct names sharing their first ~70 slug characters collide
    /// after truncation; that is accepted and not disambiguated.
    pub fn make_id(entity_type: EntityType, name: &str) -> String {
        let mut id = format!("{}-{}", entity_type.as_str().to_ascii_lowercase(), slugify(name));
        id.truncate(ENTITY_ID_MAX);
        id
    }
}

/// Lower-case, collapse every run of characters outside `[a-z0-9]` into one
/// hyphen, and trim hyphens from both ends.  Empty results become `"entity"`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;
    for ch in value.trim().to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        return "entity".to_string();
    }
    slug
}

/// First attribute among `keys` holding a non-empty value.
fn first_present<'a>(raw: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| raw.get(*k)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    })
}

fn coerce_salience(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        _ => 0.0,
    };
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0)
}

fn clean_mentions(value: Option<&Value>) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();
    let Some(Value::Array(items)) = value else {
        return mentions;
    };
    for item in items {
        let Some(text) = item.as_str() else { continue };
        let cleaned: String = text.trim().chars().take(MENTION_MAX_CHARS).collect();
        if cleaned.is_empty() || mentions.contains(&cleaned) {
            continue;
        }
        mentions.push(cleaned);
        if mentions.len() == MAX_MENTIONS {
            break;
        }
    }
    mentions
}

/// Normalise one raw record.  Returns `None` when the name is blank or the
/// type cannot be mapped onto [`EntityType`].
pub fn normalize_entity(raw: &Map<String, Value>) -> Option<Entity> {
    let name = first_present(raw, &["name", "label"])
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())?
        .to_string();

    let entity_type = first_present(raw, &["type", "category"])
        .and_then(Value::as_str)
        .and_then(EntityType::normalize)?;

    Some(Entity {
        entity_id: Entity::make_id(entity_type, &name),
        salience: coerce_salience(raw.get("salience")),
        mentions: clean_mentions(first_present(raw, &["mentions", "contexts"])),
        name,
        entity_type,
    })
}

/// Normalise a batch of raw records and merge duplicates by `entity_id`.
///
/// The first record seen for an id keeps its name and type; salience becomes
/// the maximum and mentions the ordered union (still capped).  Non-object
/// records are skipped.  Output order follows first appearance.
pub fn consolidate_entities(raw: &[Value]) -> Vec<Entity> {
    let mut merged: Vec<Entity> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in raw.iter().filter_map(Value::as_object) {
        let Some(entity) = normalize_entity(record) else { continue };
        match index.get(&entity.entity_id) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                existing.salience = existing.salience.max(entity.salience);
                for mention in entity.mentions {
                    if existing.mentions.len() >= MAX_MENTIONS {
                        break;
                    }
                    if !existing.mentions.contains(&mention) {
                        existing.mentions.push(mention);
                    }
                }
            }
            None => {
                index.insert(entity.entity_id.clone(), merged.len());
                merged.push(entity);
            }
        }
    }
    merged
}
