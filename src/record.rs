use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{Dynamics, VoiceType};

/// Final metrics for one analyzed recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Mean fundamental frequency over voiced frames (Hz)
    pub mean_pitch: f32,
    /// Vibrato rate (Hz), 0 when no vibrato was detected
    pub vibrato_rate: f32,
    /// Vibrato peak-to-peak extent (cents), 0 when no vibrato was detected
    pub vibrato_extent: f32,
    /// Local jitter (%)
    pub jitter: f32,
    /// Local shimmer (%)
    pub shimmer: f32,
    pub dynamics: Dynamics,
    pub voice_type: VoiceType,
    /// Note nearest the 5th percentile of voiced pitch
    pub lowest_note: Option<String>,
    /// Note nearest the 95th percentile of voiced pitch
    pub highest_note: Option<String>,
    /// Overall confidence (0.0-1.0)
    pub confidence_score: f32,
    /// Fraction of pitch frames that were voiced (0.0-1.0)
    pub voiced_ratio: f32,
    /// Wall-clock analysis time (ms)
    pub processing_time: f64,
    pub analyzed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> MetricsRecord {
        MetricsRecord {
            mean_pitch: 220.5,
            vibrato_rate: 5.8,
            vibrato_extent: 60.0,
            jitter: 0.012,
            shimmer: 0.017,
            dynamics: Dynamics::Medium,
            voice_type: VoiceType::Tenor,
            lowest_note: Some("C3".to_string()),
            highest_note: Some("A4".to_string()),
            confidence_score: 0.9,
            voiced_ratio: 0.85,
            processing_time: 12.5,
            analyzed_at: Utc::now(),
        }
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(sample_record()).unwrap();
        for key in [
            "mean_pitch",
            "vibrato_rate",
            "jitter",
            "shimmer",
            "dynamics",
            "voice_type",
            "lowest_note",
            "highest_note",
            "confidence_score",
            "processing_time",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["dynamics"], "medium");
        assert_eq!(json["voice_type"], "tenor");
    }

    #[test]
    fn test_missing_notes_serialize_as_null() {
        let record = MetricsRecord {
            lowest_note: None,
            highest_note: None,
            ..sample_record()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["lowest_note"].is_null());

        let back: MetricsRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
