//! Short natural-language nudges derived from the daily series.

use std::collections::BTreeSet;

use super::MonthlyTopics;

pub const MAX_INSIGHTS: usize = 4;

/// Moving-average change over 7 points that counts as a trend.
const TREND_DELTA: f64 = 0.15;
const VELOCITY_DROP: f64 = 0.7;
const VELOCITY_GAIN: f64 = 1.2;

pub const SENTIMENT_DOWN: &str =
    "Sentiment has trended downward over the past week. Consider reviewing recent stressors.";
pub const SENTIMENT_UP: &str =
    "Sentiment is improving week-over-week. Keep reinforcing the habits that are working.";
pub const VELOCITY_DOWN: &str =
    "Writing velocity dropped more than 30% this week. A gentle reminder to journal could help.";
pub const VELOCITY_UP: &str =
    "Writing output increased significantly this week. Capture that momentum with structured goals.";
pub const KEEP_GOING: &str = "Keep journaling consistently to uncover deeper trends.";

/// Build at most [`MAX_INSIGHTS`] messages.
///
/// * `moving_average` – daily sentiment moving average, oldest first.
/// * `daily_words` – words per day with data, oldest first.
/// * `monthly_topics` – top topics per month, oldest first.
///
/// Always returns at least one message.
pub fn generate_insights(
    moving_average: &[f64],
    daily_words: &[usize],
    monthly_topics: &[MonthlyTopics],
) -> Vec<String> {
    let mut insights = Vec::new();

    if moving_average.len() > 7 {
        let latest = moving_average[moving_average.len() - 1];
        let earlier = moving_average[moving_average.len() - 8];
        let delta = latest - earlier;
        if delta <= -TREND_DELTA {
            insights.push(SENTIMENT_DOWN.to_string());
        } else if delta >= TREND_DELTA {
            insights.push(SENTIMENT_UP.to_string());
        }
    }

    let n = daily_words.len();
    let recent: usize = daily_words[n.saturating_sub(7)..].iter().sum();
    let prior: usize = daily_words[n.saturating_sub(14)..n.saturating_sub(7)].iter().sum();
    if prior > 0 {
        let (recent, prior) = (recent as f64, prior as f64);
        if recent < prior * VELOCITY_DROP {
            insights.push(VELOCITY_DOWN.to_string());
        } else if recent > prior * VELOCITY_GAIN {
            insights.push(VELOCITY_UP.to_string());
        }
    }

    if let [.., previous, latest] = monthly_topics {
        let before: BTreeSet<&str> = previous.topics.iter().map(|t| t.topic.as_str()).collect();
        let emerging: Vec<&str> = latest
            .topics
            .iter()
            .map(|t| t.topic.as_str())
            .filter(|t| !before.contains(t))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !emerging.is_empty() {
            insights.push(format!(
                "New focus areas emerging: {}. Explore whether they align with your goals.",
                emerging.join(", ")
            ));
        }
    }

    if insights.is_empty() {
        insights.push(KEEP_GOING.to_string());
    }
    insights.truncate(MAX_INSIGHTS);
    insights
}
