//! Error taxonomy for the analysis pipeline.
//!
//! Every variant except `InvalidConfig` is terminal for a single analysis:
//! no partial metrics record is produced. `InvalidConfig` can only be raised
//! while constructing a [`Pipeline`](crate::Pipeline).

use thiserror::Error;

/// Errors that can occur while analyzing a voice recording
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio file too large: {size} bytes (maximum {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error("Recording is too long: {seconds:.1}s (maximum {max_seconds:.1}s)")]
    DurationTooLong { seconds: f64, max_seconds: f64 },

    #[error("No voice detected: the recording is silent")]
    NoVoiceDetected,

    #[error(
        "Not enough voiced signal: {:.0}% of frames voiced, at least {:.0}% required",
        voiced_ratio * 100.0,
        required * 100.0
    )]
    InsufficientVoicedSignal { voiced_ratio: f32, required: f32 },

    #[error("Invalid analysis configuration: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    /// Stable identifier for collaborators that serialize failures.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::EmptyAudio => "empty_audio",
            Self::DurationTooLong { .. } => "duration_too_long",
            Self::NoVoiceDetected => "no_voice_detected",
            Self::InsufficientVoicedSignal { .. } => "insufficient_voiced_signal",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }

    /// Whether asking the user for a new recording could help.
    pub fn is_recording_problem(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            AnalysisError::UnsupportedFormat("x".into()),
            AnalysisError::FileTooLarge { size: 2, max: 1 },
            AnalysisError::EmptyAudio,
            AnalysisError::DurationTooLong { seconds: 2.0, max_seconds: 1.0 },
            AnalysisError::NoVoiceDetected,
            AnalysisError::InsufficientVoicedSignal { voiced_ratio: 0.0, required: 0.1 },
            AnalysisError::InvalidConfig("x".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_insufficient_voiced_message() {
        let err = AnalysisError::InsufficientVoicedSignal { voiced_ratio: 0.05, required: 0.1 };
        assert_eq!(
            err.to_string(),
            "Not enough voiced signal: 5% of frames voiced, at least 10% required"
        );
        assert!(err.is_recording_problem());
    }
}
