//! Lexicon-based text scoring: tokenisation, sentiment, dominant emotion and
//! per-document topics.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::documents::DocumentRecord;
use super::series::round_to;

/// Topics kept per document.
pub const TOPICS_PER_DOC: usize = 5;

pub const POSITIVE_WORDS: &[&str] = &[
    "accomplished", "amazing", "awesome", "calm", "confident", "excited", "grateful", "great", "happy",
    "hopeful", "optimistic", "proud", "relaxed", "renewed", "satisfied", "strong", "successful",
    "thrilled", "victory", "win",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "angry", "anxious", "awful", "burnout", "concerned", "depressed", "doubt", "exhausted", "frustrated",
    "lost", "nervous", "overwhelmed", "sad", "stressed", "tired", "uncertain", "upset", "worried",
];

pub const STOPWORDS: &[&str] = &[
    "the", "and", "or", "with", "about", "your", "from", "into", "that", "this", "have", "been", "will",
    "for", "are", "was", "were", "being", "after", "before", "when", "while", "over", "under", "again",
    "today", "yesterday", "tomorrow", "project", "tasks", "task", "note", "notes",
];

/// Emotion categories, checked in this order; the first category with the
/// highest hit count wins.
const EMOTION_KEYWORDS: &[(Emotion, &[&str])] = &[
    (Emotion::Joy, &["grateful", "happy", "joy", "excited", "delighted", "pleased"]),
    (Emotion::Anger, &["angry", "frustrated", "mad", "irritated"]),
    (Emotion::Sadness, &["sad", "down", "depressed", "unhappy"]),
    (Emotion::Fear, &["scared", "afraid", "worried", "anxious"]),
    (Emotion::Surprise, &["surprised", "shocked", "amazed"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Anger,
    Sadness,
    Fear,
    Surprise,
    #[default]
    Neutral,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Anger => "anger",
            Emotion::Sadness => "sadness",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cased word tokens: an ASCII letter followed by one or more letters,
/// hyphens or apostrophes.  Stopwords and tokens of two characters or fewer
/// are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered: Vec<char> = text.to_lowercase().chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < lowered.len() {
        if !lowered[i].is_ascii_lowercase() {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < lowered.len() && is_word_tail(lowered[j]) {
            j += 1;
        }
        if j - i >= 2 {
            let token: String = lowered[i..j].iter().collect();
            if token.len() > 2 && !STOPWORDS.contains(&token.as_str()) {
                tokens.push(token);
            }
        }
        i = j;
    }
    tokens
}

fn is_word_tail(c: char) -> bool {
    c.is_ascii_lowercase() || c == '-' || c == '\''
}

/// Token count used as the document's word count.
pub fn word_count(text: &str) -> usize {
    tokenize(text).len()
}

/// Sentiment in `[-1, 1]` (4 decimals) and dominant emotion of `text`.
///
/// Text with no lexicon hits scores exactly `0.0`.  When no emotion keyword
/// matches, the emotion follows the score: above `0.4` joy, below `-0.4`
/// sadness, otherwise neutral.
pub fn estimate_sentiment(text: &str) -> (f64, Emotion) {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return (0.0, Emotion::Neutral);
    }

    let hits = |lexicon: &[&str]| tokens.iter().filter(|t| lexicon.contains(&t.as_str())).count();
    let pos = hits(POSITIVE_WORDS);
    let neg = hits(NEGATIVE_WORDS);
    let score = if pos + neg == 0 {
        0.0
    } else {
        (pos as f64 - neg as f64) / (pos + neg) as f64
    };

    let mut dominant = Emotion::Neutral;
    let mut best = 0;
    for (emotion, keywords) in EMOTION_KEYWORDS {
        let count = hits(keywords);
        if count > best {
            best = count;
            dominant = *emotion;
        }
    }
    if best == 0 {
        dominant = if score > 0.4 {
            Emotion::Joy
        } else if score < -0.4 {
            Emotion::Sadness
        } else {
            Emotion::Neutral
        };
    }
    (round_to(score, 4), dominant)
}

/// Python-style title case: the first letter of every alphabetic run is
/// upper-cased, the rest lower-cased.
pub fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut prev_alpha = false;
    for c in word.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Items ranked by frequency, ties kept in first-seen order.
pub fn most_common<I>(items: I, limit: usize) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = String>,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for item in items {
        match index.get(&item) {
            Some(&pos) => counts[pos].1 += 1,
            None => {
                index.insert(item.clone(), counts.len());
                counts.push((item, 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);
    counts
}

/// Topics of one document: its entity names when it has any, else the most
/// frequent tokens of its summary (or content), title-cased.
pub fn extract_topics(doc: &DocumentRecord) -> Vec<String> {
    let mut topics: Vec<String> = doc
        .entities
        .iter()
        .map(|e| e.name.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    if topics.is_empty() {
        let source = doc
            .summary
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(doc.content.as_deref())
            .unwrap_or("");
        topics = most_common(tokenize(source), TOPICS_PER_DOC)
            .into_iter()
            .map(|(word, _)| title_case(&word))
            .collect();
    }
    topics.truncate(TOPICS_PER_DOC);
    topics
}
