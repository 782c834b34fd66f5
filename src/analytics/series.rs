//! Numeric helpers over the daily series: rounding, trailing moving
//! average, ISO week keys, streaks and 7-day word windows.

use chrono::{Datelike, NaiveDate};

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Trailing moving average (4 decimals).  Point `i` averages itself and up
/// to `window - 1` preceding points.
pub fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..series.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &series[start..=i];
            round_to(slice.iter().sum::<f64>() / slice.len() as f64, 4)
        })
        .collect()
}

/// ISO year-week key, e.g. `"2025-W03"`.
pub fn week_key(day: NaiveDate) -> String {
    let week = day.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Longest run of consecutive calendar days with nonzero words.
///
/// `days` must be sorted ascending.  A day with words extends the current
/// run only if the previous entry is exactly one day earlier.
pub fn best_streak(days: &[(NaiveDate, usize)]) -> usize {
    let mut streak = 0;
    let mut best = 0;
    let mut last: Option<NaiveDate> = None;
    for &(day, words) in days {
        if words > 0 {
            let consecutive = last.is_some_and(|prev| (day - prev).num_days() == 1);
            streak = if consecutive { streak + 1 } else { 1 };
            best = best.max(streak);
        } else {
            streak = 0;
        }
        last = Some(day);
    }
    best
}

/// Words in the 7 days ending at the latest day with data, and in the 7
/// days before that.  The second total is only reported once more than 7
/// days have data; otherwise it is 0.
pub fn word_windows(days: &[(NaiveDate, usize)]) -> (usize, usize) {
    let Some(&(latest, _)) = days.last() else {
        return (0, 0);
    };
    let age = |day: NaiveDate| (latest - day).num_days();
    let last_7 = days.iter().filter(|(d, _)| age(*d) < 7).map(|(_, w)| w).sum();
    let prev_7 = if days.len() > 7 {
        days.iter()
            .filter(|(d, _)| (7..14).contains(&age(*d)))
            .map(|(_, w)| w)
            .sum()
    } else {
        0
    };
    (last_7, prev_7)
}
