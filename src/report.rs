//! Summaries across several analyzed sessions and period-over-period trends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{Dynamics, VoiceType};
use crate::notes::Note;
use crate::record::MetricsRecord;

/// Changes smaller than this (in percent) are reported as stable
const STABLE_CHANGE_PERCENT: f64 = 1.0;

/// Aggregate of a set of sessions, e.g. one day of practice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_count: usize,
    pub mean_pitch_avg: f32,
    pub vibrato_rate_avg: f32,
    pub jitter_avg: f32,
    pub shimmer_avg: f32,
    /// Most frequent dynamics category (earliest wins a tie)
    pub dynamics_mode: Dynamics,
    /// Most frequent voice type (earliest wins a tie)
    pub voice_type_mode: VoiceType,
    pub lowest_note: Option<String>,
    pub highest_note: Option<String>,
    /// Sample standard deviation of per-session mean pitch (Hz); 0 for one session
    pub pitch_stability: f32,
    /// Hours between the first and last session
    pub practice_span_hours: f64,
    pub first_session: DateTime<Utc>,
    pub last_session: DateTime<Utc>,
}

impl SessionSummary {
    /// Summarize `records`; `None` when there are none.
    pub fn from_records(records: &[MetricsRecord]) -> Option<Self> {
        let first = records.first()?;
        let n = records.len();

        let avg = |f: fn(&MetricsRecord) -> f32| -> f32 {
            (records.iter().map(|r| f(r) as f64).sum::<f64>() / n as f64) as f32
        };
        let mean_pitch_avg = avg(|r| r.mean_pitch);

        let pitch_stability = if n > 1 {
            let mean = mean_pitch_avg as f64;
            let var = records
                .iter()
                .map(|r| (r.mean_pitch as f64 - mean).powi(2))
                .sum::<f64>()
                / (n - 1) as f64;
            var.sqrt() as f32
        } else {
            0.0
        };

        let parsed_notes = |pick: fn(&MetricsRecord) -> Option<&String>| {
            records
                .iter()
                .filter_map(move |r| pick(r))
                .filter_map(|name| name.parse::<Note>().ok())
        };
        let lowest_note = parsed_notes(|r| r.lowest_note.as_ref()).min().map(|n| n.to_string());
        let highest_note = parsed_notes(|r| r.highest_note.as_ref()).max().map(|n| n.to_string());

        let first_session = records.iter().map(|r| r.analyzed_at).min().unwrap_or(first.analyzed_at);
        let last_session = records.iter().map(|r| r.analyzed_at).max().unwrap_or(first.analyzed_at);
        let practice_span_hours = (last_session - first_session).num_milliseconds() as f64 / 3_600_000.0;

        Some(Self {
            session_count: n,
            mean_pitch_avg,
            vibrato_rate_avg: avg(|r| r.vibrato_rate),
            jitter_avg: avg(|r| r.jitter),
            shimmer_avg: avg(|r| r.shimmer),
            dynamics_mode: mode(records.iter().map(|r| r.dynamics)).unwrap_or(first.dynamics),
            voice_type_mode: mode(records.iter().map(|r| r.voice_type)).unwrap_or(first.voice_type),
            lowest_note,
            highest_note,
            pitch_stability,
            practice_span_hours,
            first_session,
            last_session,
        })
    }
}

/// Most frequent value; ties go to the value seen first.
fn mode<T: PartialEq + Copy>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    let best = counts.iter().map(|(_, c)| *c).max()?;
    counts.into_iter().find(|(_, c)| *c == best).map(|(v, _)| v)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

/// One metric compared against an earlier period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub current: f64,
    pub previous: f64,
    pub change: f64,
    /// Relative change in percent; 0 when `previous` is 0
    pub change_percent: f64,
    pub trend: Trend,
}

impl MetricComparison {
    pub fn new(current: f64, previous: f64) -> Self {
        let change = current - previous;
        let (change_percent, trend) = if previous == 0.0 {
            (0.0, Trend::Stable)
        } else {
            let pct = change / previous * 100.0;
            let trend = if pct.abs() < STABLE_CHANGE_PERCENT {
                Trend::Stable
            } else if pct > 0.0 {
                Trend::Up
            } else {
                Trend::Down
            };
            (pct, trend)
        };
        Self {
            current,
            previous,
            change,
            change_percent,
            trend,
        }
    }
}

/// Period-over-period comparison of two summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryComparison {
    pub mean_pitch: MetricComparison,
    pub vibrato_rate: MetricComparison,
    pub jitter: MetricComparison,
    pub shimmer: MetricComparison,
    pub session_count: MetricComparison,
}

pub fn compare_summaries(current: &SessionSummary, previous: &SessionSummary) -> SummaryComparison {
    SummaryComparison {
        mean_pitch: MetricComparison::new(current.mean_pitch_avg as f64, previous.mean_pitch_avg as f64),
        vibrato_rate: MetricComparison::new(current.vibrato_rate_avg as f64, previous.vibrato_rate_avg as f64),
        jitter: MetricComparison::new(current.jitter_avg as f64, previous.jitter_avg as f64),
        shimmer: MetricComparison::new(current.shimmer_avg as f64, previous.shimmer_avg as f64),
        session_count: MetricComparison::new(current.session_count as f64, previous.session_count as f64),
    }
}
