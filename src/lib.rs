//! Vocal performance metrics from short voice recordings.
//!
//! [`analyze_voice`] decodes an uploaded recording, tracks its pitch and
//! derives mean pitch, jitter, shimmer, vibrato, dynamics and a voice-type
//! estimate as one [`MetricsRecord`]. Build a [`Pipeline`] to analyze many
//! recordings with a custom [`AnalysisConfig`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod notes;
pub mod pipeline;
pub mod record;
pub mod report;

pub use analysis::{Dynamics, VoiceType};
pub use config::AnalysisConfig;
pub use error::AnalysisError;
pub use pipeline::{analyze_voice, FallbackAnalyzer, Pipeline, VoiceAnalyzer};
pub use record::MetricsRecord;
pub use report::{compare_summaries, MetricComparison, SessionSummary, Trend};
