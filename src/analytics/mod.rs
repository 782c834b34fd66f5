//! Temporal analytics over a user's document corpus.
//!
//! A snapshot covers monthly topics, a daily sentiment timeline with a
//! trailing moving average, writing velocity, and a handful of insights.
//! Snapshots are cached under `USER#{user}` / `ANALYTICS#TEMPORAL` and reused
//! while younger than the configured TTL unless the caller forces a rebuild.

pub mod insights;
pub mod series;
pub mod text;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AnalyticsConfig;
use crate::documents::{DocumentRecord, DocumentStore};
use crate::error::AppError;
use crate::store::{Row, SharedStore, keys};
use crate::time::{parse_timestamp, to_iso8601};
use text::Emotion;

/// Topics kept per month.
pub const TOPICS_PER_MONTH: usize = 5;

// ── Snapshot types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTopics {
    /// `YYYY-MM`.
    pub month: String,
    pub topics: Vec<TopicCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Mean sentiment of the day's entries.
    pub sentiment: f64,
    /// Most frequent emotion of the day's entries.
    pub emotion: Emotion,
    pub words: usize,
    pub moving_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTotal {
    /// ISO week, `YYYY-Www`.
    pub week: String,
    pub words: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Velocity {
    pub daily_average_words: f64,
    pub weekly_totals: Vec<WeeklyTotal>,
    /// Best run of consecutive writing days.
    pub streak_days: usize,
    pub words_last_7_days: usize,
    pub words_prev_7_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalAnalyticsSnapshot {
    pub user_id: String,
    pub generated_at: String,
    pub monthly_topics: Vec<MonthlyTopics>,
    pub sentiment_timeline: Vec<TimelinePoint>,
    pub velocity: Velocity,
    pub insights: Vec<String>,
}

// ── Computation ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct DayStats {
    sentiments: Vec<f64>,
    emotions: Vec<Emotion>,
    words: usize,
    entries: usize,
}

/// Build a snapshot from `documents`.  Documents without a usable timestamp
/// are ignored.  Pure: no store access.
pub fn compute_snapshot(
    user_id: &str,
    documents: &[DocumentRecord],
    window: usize,
    now: DateTime<Utc>,
) -> TemporalAnalyticsSnapshot {
    let mut monthly: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut daily: BTreeMap<NaiveDate, DayStats> = BTreeMap::new();

    for doc in documents {
        let Some(ts) = doc.timestamp() else { continue };
        monthly
            .entry(ts.format("%Y-%m").to_string())
            .or_default()
            .extend(text::extract_topics(doc));

        let body = doc.text();
        let (sentiment, emotion) = text::estimate_sentiment(body);
        let stats = daily.entry(ts.date_naive()).or_default();
        stats.sentiments.push(sentiment);
        stats.emotions.push(emotion);
        stats.words += text::word_count(body);
        stats.entries += 1;
    }

    let monthly_topics: Vec<MonthlyTopics> = monthly
        .into_iter()
        .map(|(month, topics)| MonthlyTopics {
            month,
            topics: text::most_common(topics, TOPICS_PER_MONTH)
                .into_iter()
                .map(|(topic, count)| TopicCount { topic, count })
                .collect(),
        })
        .collect();

    let day_sentiments: Vec<f64> = daily
        .values()
        .map(|s| series::round_to(series::mean(&s.sentiments).unwrap_or(0.0), 4))
        .collect();
    let averages = series::moving_average(&day_sentiments, window);

    let sentiment_timeline: Vec<TimelinePoint> = daily
        .iter()
        .zip(day_sentiments.iter().zip(&averages))
        .map(|((day, stats), (&sentiment, &moving_average))| TimelinePoint {
            date: day.format("%Y-%m-%d").to_string(),
            sentiment,
            emotion: dominant_emotion(&stats.emotions),
            words: stats.words,
            moving_average,
        })
        .collect();

    let day_words: Vec<(NaiveDate, usize)> = daily.iter().map(|(d, s)| (*d, s.words)).collect();
    let velocity = velocity(&day_words);

    let words: Vec<usize> = day_words.iter().map(|(_, w)| *w).collect();
    let insights = insights::generate_insights(&averages, &words, &monthly_topics);

    debug!(
        user_id,
        documents = documents.len(),
        days = sentiment_timeline.len(),
        entries = daily.values().map(|s| s.entries).sum::<usize>(),
        "temporal analytics computed"
    );

    TemporalAnalyticsSnapshot {
        user_id: user_id.to_string(),
        generated_at: to_iso8601(now),
        monthly_topics,
        sentiment_timeline,
        velocity,
        insights,
    }
}

fn dominant_emotion(emotions: &[Emotion]) -> Emotion {
    let mut counts: Vec<(Emotion, usize)> = Vec::new();
    let mut index: HashMap<Emotion, usize> = HashMap::new();
    for e in emotions {
        match index.get(e) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(*e, counts.len());
                counts.push((*e, 1));
            }
        }
    }
    // First maximum wins.
    let mut best: Option<(Emotion, usize)> = None;
    for (e, n) in counts {
        if best.is_none_or(|(_, b)| n > b) {
            best = Some((e, n));
        }
    }
    best.map(|(e, _)| e).unwrap_or_default()
}

fn velocity(days: &[(NaiveDate, usize)]) -> Velocity {
    let mut weekly: BTreeMap<String, usize> = BTreeMap::new();
    for (day, words) in days {
        *weekly.entry(series::week_key(*day)).or_default() += words;
    }
    let (words_last_7_days, words_prev_7_days) = series::word_windows(days);
    let per_day: Vec<f64> = days.iter().map(|(_, w)| *w as f64).collect();

    Velocity {
        daily_average_words: series::round_to(series::mean(&per_day).unwrap_or(0.0), 2),
        weekly_totals: weekly.into_iter().map(|(week, words)| WeeklyTotal { week, words }).collect(),
        streak_days: series::best_streak(days),
        words_last_7_days,
        words_prev_7_days,
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Cached analytics over the shared store.
#[derive(Clone)]
pub struct TemporalAnalyticsEngine {
    store: SharedStore,
    docs: DocumentStore,
    ttl: Duration,
    window: usize,
}

impl TemporalAnalyticsEngine {
    pub fn new(store: SharedStore, config: &AnalyticsConfig) -> Self {
        Self {
            docs: DocumentStore::new(store.clone()),
            store,
            ttl: Duration::hours(config.ttl_hours),
            window: config.moving_average_window,
        }
    }

    /// Cached snapshot if fresh and not `force`d, otherwise a rebuild.
    pub fn snapshot(&self, user_id: &str, force: bool) -> Result<TemporalAnalyticsSnapshot, AppError> {
        self.snapshot_at(user_id, force, Utc::now())
    }

    /// [`snapshot`](Self::snapshot) with an explicit clock.
    pub fn snapshot_at(
        &self,
        user_id: &str,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<TemporalAnalyticsSnapshot, AppError> {
        let pk = keys::user_pk(user_id);
        if !force {
            if let Some(cached) = self.store.get(&pk, keys::ANALYTICS_SK)? {
                if let Some(snapshot) = self.fresh_snapshot(&cached, now) {
                    debug!(user_id, generated_at = %snapshot.generated_at, "analytics cache hit");
                    return Ok(snapshot);
                }
            }
        }

        let documents = self.docs.list(user_id)?;
        let snapshot = compute_snapshot(user_id, &documents, self.window, now);
        let payload = serde_json::to_string(&snapshot)
            .map_err(|e| AppError::Store(format!("serialize analytics for {user_id}: {e}")))?;
        self.store.put(
            Row::new(pk, keys::ANALYTICS_SK)
                .with("user_id", user_id)
                .with("generated_at", snapshot.generated_at.as_str())
                .with("payload", payload),
        )?;
        info!(user_id, documents = documents.len(), force, "analytics snapshot rebuilt");
        Ok(snapshot)
    }

    fn fresh_snapshot(&self, row: &Row, now: DateTime<Utc>) -> Option<TemporalAnalyticsSnapshot> {
        let generated_at = row.get_str("generated_at")?;
        let ts = parse_timestamp(generated_at)?;
        let age = now - ts;
        // A timestamp from the future (clock skew) is never trusted.
        if age < Duration::zero() || age >= self.ttl {
            return None;
        }
        let mut snapshot: TemporalAnalyticsSnapshot =
            match serde_json::from_str(row.get_str("payload")?) {
                Ok(s) => s,
                Err(e) => {
                    debug!(error = %e, "discarding undecodable analytics cache");
                    return None;
                }
            };
        snapshot.generated_at = generated_at.to_string();
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PartitionStore;
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn doc(id: &str, created: &str, content: &str) -> DocumentRecord {
        let mut d = DocumentRecord::new("u", id);
        d.created_at = Some(created.to_string());
        d.content = Some(content.to_string());
        d
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_corpus() {
        let snap = compute_snapshot("u", &[], 7, now());
        assert!(snap.monthly_topics.is_empty());
        assert!(snap.sentiment_timeline.is_empty());
        assert_eq!(snap.velocity, Velocity::default());
        assert_eq!(snap.insights, vec![insights::KEEP_GOING]);
        assert_eq!(snap.generated_at, "2025-03-01T12:00:00Z");
    }

    #[test]
    fn daily_aggregation() {
        let docs = vec![
            doc("a", "2025-01-01T08:00:00Z", "happy grateful morning"),
            doc("b", "2025-01-01T20:00:00Z", "tired evening walk"),
            doc("c", "2025-01-02T09:00:00Z", "garden roses garden"),
            doc("undated", "", "happy"),
        ];
        let snap = compute_snapshot("u", &docs, 7, now());
        let tl = &snap.sentiment_timeline;
        assert_eq!(tl.len(), 2);
        assert_eq!(tl[0].date, "2025-01-01");
        assert_eq!(tl[0].sentiment, 0.0);
        assert_eq!(tl[0].emotion, Emotion::Joy);
        assert_eq!(tl[0].words, 6);
        assert_eq!(tl[1].words, 3);
        assert_eq!(tl[1].moving_average, 0.0);

        assert_eq!(snap.monthly_topics.len(), 1);
        assert_eq!(snap.monthly_topics[0].month, "2025-01");
        assert_eq!(snap.monthly_topics[0].topics[0], TopicCount { topic: "Happy".into(), count: 1 });

        assert_eq!(snap.velocity.streak_days, 2);
        assert_eq!(snap.velocity.words_last_7_days, 9);
        assert_eq!(snap.velocity.words_prev_7_days, 0);
        assert_eq!(snap.velocity.daily_average_words, 4.5);
        assert_eq!(snap.velocity.weekly_totals, vec![WeeklyTotal { week: "2025-W01".into(), words: 9 }]);
    }

    #[test]
    fn monthly_topics_count_across_docs() {
        let docs = vec![
            doc("a", "2025-01-03", "garden"),
            doc("b", "2025-01-04", "garden"),
            doc("c", "2025-02-04", "travel"),
        ];
        let snap = compute_snapshot("u", &docs, 7, now());
        let months: Vec<&str> = snap.monthly_topics.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2025-01", "2025-02"]);
        assert_eq!(snap.monthly_topics[0].topics, vec![TopicCount { topic: "Garden".into(), count: 2 }]);
        assert!(snap.insights[0].contains("Travel"));
    }

    #[test]
    fn dominant_emotion_prefers_first_on_tie() {
        assert_eq!(dominant_emotion(&[Emotion::Fear, Emotion::Joy]), Emotion::Fear);
        assert_eq!(dominant_emotion(&[Emotion::Fear, Emotion::Joy, Emotion::Joy]), Emotion::Joy);
        assert_eq!(dominant_emotion(&[]), Emotion::Neutral);
    }

    fn make_engine() -> (Arc<MemoryStore>, TemporalAnalyticsEngine) {
        let store = Arc::new(MemoryStore::new());
        let engine = TemporalAnalyticsEngine::new(store.clone(), &AnalyticsConfig::default());
        (store, engine)
    }

    #[test]
    fn cache_reused_until_stale_or_forced() {
        let (store, engine) = make_engine();
        let docs = DocumentStore::new(store.clone());
        docs.put(&doc("a", "2025-02-01T00:00:00Z", "happy")).unwrap();

        let first = engine.snapshot_at("u", false, now()).unwrap();
        assert_eq!(first.sentiment_timeline.len(), 1);

        docs.put(&doc("b", "2025-02-02T00:00:00Z", "sad")).unwrap();
        let cached = engine.snapshot_at("u", false, now() + Duration::hours(5)).unwrap();
        assert_eq!(cached, first);

        let forced = engine.snapshot_at("u", true, now() + Duration::hours(5)).unwrap();
        assert_eq!(forced.sentiment_timeline.len(), 2);

        let stale = engine.snapshot_at("u", false, now() + Duration::hours(12)).unwrap();
        assert_eq!(stale.generated_at, "2025-03-02T00:00:00Z");
    }

    #[test]
    fn corrupt_cache_is_rebuilt() {
        let (store, engine) = make_engine();
        store
            .put(
                Row::new("USER#u", keys::ANALYTICS_SK)
                    .with("generated_at", "2025-03-01T11:00:00Z")
                    .with("payload", "{not json"),
            )
            .unwrap();
        let snap = engine.snapshot_at("u", false, now()).unwrap();
        assert_eq!(snap.generated_at, "2025-03-01T12:00:00Z");
        let row = store.get("USER#u", keys::ANALYTICS_SK).unwrap().unwrap();
        assert_eq!(row.get_str("generated_at"), Some("2025-03-01T12:00:00Z"));
    }

    #[test]
    fn future_dated_cache_is_rebuilt() {
        let (store, engine) = make_engine();
        let docs = DocumentStore::new(store.clone());
        docs.put(&doc("a", "2025-02-01T00:00:00Z", "happy")).unwrap();

        let ahead = engine.snapshot_at("u", false, now() + Duration::days(30)).unwrap();
        assert_eq!(ahead.sentiment_timeline.len(), 1);

        docs.put(&doc("b", "2025-02-02T00:00:00Z", "sad")).unwrap();
        let snap = engine.snapshot_at("u", false, now()).unwrap();
        assert_eq!(snap.generated_at, "2025-03-01T12:00:00Z");
        assert_eq!(snap.sentiment_timeline.len(), 2);
    }
}
