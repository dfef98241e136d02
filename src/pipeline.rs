//! Stage orchestration: bytes in, one [`MetricsRecord`] out.
//!
//! Decode -> preprocess -> pitch track -> {perturbation, vibrato} ->
//! {dynamics, voice type} -> record. Decoder, preprocessing and pitch
//! tracking failures end the analysis; every later stage degrades into the
//! record (zeros, `medium` dynamics, lowered confidence) instead of failing.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::analysis::{
    dynamics, perturbation, Dynamics, PerturbationReport, PitchStatistics, PitchTracker,
    VibratoAnalyzer, VoiceType,
};
use crate::audio::{AudioDecoder, Preprocessor, Waveform};
use crate::config::{AnalysisConfig, ConfidenceConfig};
use crate::error::AnalysisError;
use crate::notes::hz_to_note;
use crate::record::MetricsRecord;

/// Anything that turns recorded audio into a metrics record
pub trait VoiceAnalyzer: Send + Sync {
    /// Analyze encoded audio. `declared_media_type` is only a format hint.
    fn analyze_voice(
        &self,
        audio: &[u8],
        declared_media_type: Option<&str>,
    ) -> Result<MetricsRecord, AnalysisError>;
}

/// The signal-processing analyzer
#[derive(Debug)]
pub struct Pipeline {
    config: AnalysisConfig,
    decoder: AudioDecoder,
    preprocessor: Preprocessor,
    tracker: PitchTracker,
    vibrato: VibratoAnalyzer,
}

impl Pipeline {
    /// Validate `config` and prepare every stage.
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            decoder: AudioDecoder::new(config.decoder.clone()),
            preprocessor: Preprocessor::new(config.preprocess.clone()),
            tracker: PitchTracker::new(config.pitch.clone()),
            vibrato: VibratoAnalyzer::new(config.vibrato.clone()),
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze an already decoded waveform. The duration bound applies as
    /// for encoded input, and other sample rates are resampled to the
    /// configured target rate.
    pub fn analyze_waveform(&self, wave: Waveform) -> Result<MetricsRecord, AnalysisError> {
        let start = Instant::now();
        let wave = self.decoder.conform(wave)?;
        self.run(wave, start)
    }

    fn run(&self, wave: Waveform, start: Instant) -> Result<MetricsRecord, AnalysisError> {
        let wave = self.preprocessor.process(wave)?;
        let contour = self.tracker.track(&wave)?;

        let perturbation = perturbation::analyze(&contour);
        let vibrato = self.vibrato.analyze(&contour);
        let dynamics = dynamics::classify(&contour, &self.config.dynamics);

        let stats = PitchStatistics::from_contour(&contour);
        let (mean_pitch, voice_type, lowest_note, highest_note) = match stats {
            Some(s) => (
                s.mean_hz,
                s.voice_type(),
                hz_to_note(s.p5_hz),
                hz_to_note(s.p95_hz),
            ),
            // The tracker guarantees voiced frames; keep a neutral record regardless
            None => (0.0, VoiceType::from_pitch(0.0), None, None),
        };

        let voiced_ratio = contour.voiced_ratio();
        let confidence_score = confidence(voiced_ratio, &perturbation, &self.config.confidence);
        if perturbation.low_confidence {
            warn!(
                "Perturbation unmeasured; confidence reduced to {:.2}",
                confidence_score
            );
        }

        debug!(
            "Perturbation over {} runs: jitter {:.3}%, shimmer {:.3}%",
            perturbation.valid_runs, perturbation.jitter_percent, perturbation.shimmer_percent
        );

        let record = MetricsRecord {
            mean_pitch,
            vibrato_rate: vibrato.rate_hz,
            vibrato_extent: vibrato.extent_cents,
            jitter: perturbation.jitter_percent,
            shimmer: perturbation.shimmer_percent,
            dynamics,
            voice_type,
            lowest_note,
            highest_note,
            confidence_score,
            voiced_ratio,
            processing_time: start.elapsed().as_secs_f64() * 1000.0,
            analyzed_at: Utc::now(),
        };

        info!(
            "Analysis complete: {:.1} Hz {} ({}-{}), vibrato {:.2} Hz, dynamics {}, confidence {:.2}, {:.1} ms",
            record.mean_pitch,
            record.voice_type,
            record.lowest_note.as_deref().unwrap_or("?"),
            record.highest_note.as_deref().unwrap_or("?"),
            record.vibrato_rate,
            record.dynamics,
            record.confidence_score,
            record.processing_time
        );

        Ok(record)
    }
}

impl VoiceAnalyzer for Pipeline {
    fn analyze_voice(
        &self,
        audio: &[u8],
        declared_media_type: Option<&str>,
    ) -> Result<MetricsRecord, AnalysisError> {
        let start = Instant::now();
        info!(
            "Analyzing {} bytes (declared type: {})",
            audio.len(),
            declared_media_type.unwrap_or("none")
        );

        let wave = self.decoder.decode(audio, declared_media_type)?;
        self.run(wave, start)
    }
}

/// Weighted blend of the voiced ratio and perturbation run credit, in [0, 1].
fn confidence(voiced_ratio: f32, perturbation: &PerturbationReport, config: &ConfidenceConfig) -> f32 {
    let run_credit = if perturbation.low_confidence {
        0.0
    } else {
        perturbation.valid_runs.min(config.target_runs) as f32 / config.target_runs as f32
    };
    let score = config.voiced_weight * voiced_ratio + (1.0 - config.voiced_weight) * run_credit;
    score.clamp(0.0, 1.0)
}

/// Demo analyzer that ignores its input and returns a fixed record.
///
/// Every record it produces has a confidence score of 0 so it can never be
/// mistaken for a measurement.
#[derive(Debug, Clone)]
pub struct FallbackAnalyzer {
    template: MetricsRecord,
}

impl FallbackAnalyzer {
    pub fn new() -> Self {
        Self::with_record(MetricsRecord {
            mean_pitch: 220.5,
            vibrato_rate: 5.8,
            vibrato_extent: 0.0,
            jitter: 0.012,
            shimmer: 0.017,
            dynamics: Dynamics::Medium,
            voice_type: VoiceType::Tenor,
            lowest_note: Some("C3".to_string()),
            highest_note: Some("A4".to_string()),
            confidence_score: 0.0,
            voiced_ratio: 0.0,
            processing_time: 0.0,
            analyzed_at: Utc::now(),
        })
    }

    /// Serve `record` (with confidence forced to 0) for every call.
    pub fn with_record(record: MetricsRecord) -> Self {
        Self {
            template: MetricsRecord {
                confidence_score: 0.0,
                ..record
            },
        }
    }
}

impl Default for FallbackAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceAnalyzer for FallbackAnalyzer {
    fn analyze_voice(
        &self,
        audio: &[u8],
        _declared_media_type: Option<&str>,
    ) -> Result<MetricsRecord, AnalysisError> {
        warn!("Fallback analyzer used for {} bytes; returning demo metrics", audio.len());
        Ok(MetricsRecord {
            processing_time: 0.0,
            analyzed_at: Utc::now(),
            ..self.template.clone()
        })
    }
}

/// Analyze `audio` with the default configuration.
pub fn analyze_voice(
    audio: &[u8],
    declared_media_type: Option<&str>,
) -> Result<MetricsRecord, AnalysisError> {
    Pipeline::new(AnalysisConfig::default())?.analyze_voice(audio, declared_media_type)
}
