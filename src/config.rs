use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::AnalysisError;

/// Analysis configuration
///
/// Every heuristic threshold used by the pipeline lives here so callers and
/// tests can exercise edge behavior without touching the algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub schema_version: u32,
    pub decoder: DecoderConfig,
    pub preprocess: PreprocessConfig,
    pub pitch: PitchConfig,
    pub vibrato: VibratoConfig,
    pub dynamics: DynamicsConfig,
    pub confidence: ConfidenceConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            decoder: DecoderConfig::default(),
            preprocess: PreprocessConfig::default(),
            pitch: PitchConfig::default(),
            vibrato: VibratoConfig::default(),
            dynamics: DynamicsConfig::default(),
            confidence: ConfidenceConfig::default(),
        }
    }
}

/// Decoder limits and output format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Sample rate every decoded waveform is converted to
    pub target_sample_rate: u32,
    /// Inputs larger than this are rejected before decoding
    pub max_file_bytes: usize,
    /// Inputs longer than this are rejected
    pub max_duration_secs: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            max_file_bytes: 50 * 1024 * 1024,
            max_duration_secs: 300.0,
        }
    }
}

/// Pre-processing chain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// High-pass cutoff applied after DC removal (None disables the filter)
    pub highpass_hz: Option<u32>,
    /// Peak level after normalization (linear, 0.9 is about -1 dBFS)
    pub target_peak: f32,
    /// RMS window used for silence trimming
    pub trim_window_ms: u32,
    /// Trim threshold as a fraction of the whole signal's RMS
    pub trim_threshold_ratio: f32,
    /// Raw peak below which the recording counts as silence
    pub silence_floor: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            highpass_hz: Some(50),
            target_peak: 0.9,
            trim_window_ms: 20,
            trim_threshold_ratio: 0.1,
            silence_floor: 1e-4,
        }
    }
}

/// Pitch tracker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Lowest plausible fundamental (Hz)
    pub min_f0_hz: f32,
    /// Highest plausible fundamental (Hz)
    pub max_f0_hz: f32,
    /// Analysis window length
    pub window_ms: u32,
    /// Hop between consecutive windows
    pub hop_ms: u32,
    /// Minimum normalized autocorrelation for a voiced frame
    pub voicing_threshold: f32,
    /// Peaks within this distance of the strongest count as near-ties
    pub peak_tie_tolerance: f32,
    /// Candidates further than this ratio from the running median are octave jumps
    pub octave_jump_ratio: f32,
    /// Number of recent voiced frames in the running median
    pub median_window: usize,
    /// Frames whose RMS is below this fraction of the signal RMS are unvoiced
    pub frame_silence_ratio: f32,
    /// Fewer voiced frames than this fraction aborts the analysis
    pub min_voiced_ratio: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            min_f0_hz: 70.0,
            max_f0_hz: 1100.0,
            window_ms: 40,
            hop_ms: 10,
            voicing_threshold: 0.6,
            peak_tie_tolerance: 0.05,
            octave_jump_ratio: 1.8,
            median_window: 7,
            frame_silence_ratio: 0.1,
            min_voiced_ratio: 0.1,
        }
    }
}

impl PitchConfig {
    /// Window length in samples at `sample_rate`
    pub fn window_samples(&self, sample_rate: u32) -> usize {
        (self.window_ms as usize * sample_rate as usize) / 1000
    }

    /// Hop length in samples at `sample_rate`
    pub fn hop_samples(&self, sample_rate: u32) -> usize {
        (self.hop_ms as usize * sample_rate as usize) / 1000
    }

    /// Pitch contour rate in frames per second
    pub fn frame_rate(&self) -> f32 {
        1000.0 / self.hop_ms as f32
    }
}

/// Vibrato analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VibratoConfig {
    pub min_rate_hz: f32,
    pub max_rate_hz: f32,
    /// Unvoiced runs up to this many frames are bridged by interpolation
    pub max_bridge_frames: usize,
    /// Contour frames per spectral block
    pub block_frames: usize,
    /// FFT length (blocks are zero-padded to this size)
    pub fft_size: usize,
    /// In-band peak power must exceed the mean spectral power by this factor
    pub significance_ratio: f32,
    /// Smaller peak-to-peak extents are reported as no vibrato
    pub min_extent_cents: f32,
}

impl Default for VibratoConfig {
    fn default() -> Self {
        Self {
            min_rate_hz: 4.0,
            max_rate_hz: 8.0,
            max_bridge_frames: 3,
            block_frames: 128,
            fft_size: 256,
            significance_ratio: 4.0,
            min_extent_cents: 10.0,
        }
    }
}

/// Loudness-variability thresholds (coefficient of variation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    /// Below this the dynamics are `low`
    pub low_cv: f32,
    /// At or above this the dynamics are `high`
    pub high_cv: f32,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            low_cv: 0.15,
            high_cv: 0.35,
        }
    }
}

/// Weights for the overall confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Weight of the voiced-frame ratio (the remainder goes to perturbation runs)
    pub voiced_weight: f32,
    /// Number of valid perturbation runs that earns full run credit
    pub target_runs: usize,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            voiced_weight: 0.7,
            target_runs: 1,
        }
    }
}

impl AnalysisConfig {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .context("Failed to read config file")?;
            serde_json::from_str(&content)
                .context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(path, content)
            .context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Failed to get home directory")?;
        Ok(home.join(".vocal-metrics"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Check that the settings are internally consistent.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: String| Err(AnalysisError::InvalidConfig(msg));

        let d = &self.decoder;
        if d.target_sample_rate == 0 {
            return invalid("target_sample_rate must be positive".into());
        }
        if d.max_file_bytes == 0 || !(d.max_duration_secs > 0.0) {
            return invalid("decoder limits must be positive".into());
        }

        let pp = &self.preprocess;
        if !(pp.target_peak > 0.0 && pp.target_peak <= 1.0) {
            return invalid(format!("target_peak {} outside (0, 1]", pp.target_peak));
        }
        if pp.trim_window_ms == 0 || pp.trim_threshold_ratio < 0.0 || pp.silence_floor < 0.0 {
            return invalid("trim settings must be non-negative with a non-zero window".into());
        }
        if let Some(hz) = pp.highpass_hz {
            if hz == 0 || hz as f32 >= self.pitch.min_f0_hz {
                return invalid(format!(
                    "highpass_hz {} must be positive and below min_f0_hz {}",
                    hz, self.pitch.min_f0_hz
                ));
            }
        }

        let p = &self.pitch;
        if !(p.min_f0_hz > 0.0 && p.min_f0_hz < p.max_f0_hz) {
            return invalid(format!("pitch range {}-{} Hz is empty", p.min_f0_hz, p.max_f0_hz));
        }
        if p.max_f0_hz * 2.0 >= d.target_sample_rate as f32 {
            return invalid(format!(
                "max_f0_hz {} is above the Nyquist limit of {} Hz",
                p.max_f0_hz, d.target_sample_rate
            ));
        }
        let window = p.window_samples(d.target_sample_rate);
        let hop = p.hop_samples(d.target_sample_rate);
        if hop == 0 || window < hop {
            return invalid(format!("hop ({} samples) must be positive and <= window ({} samples)", hop, window));
        }
        let max_lag = (d.target_sample_rate as f32 / p.min_f0_hz).ceil() as usize;
        if max_lag + 2 > window / 2 {
            return invalid(format!(
                "window of {} ms is too short for a {} Hz minimum pitch",
                p.window_ms, p.min_f0_hz
            ));
        }
        if !(0.0..1.0).contains(&p.voicing_threshold) || p.peak_tie_tolerance < 0.0 {
            return invalid("voicing threshold must be in [0, 1) and tie tolerance non-negative".into());
        }
        if p.octave_jump_ratio <= 1.0 || p.median_window == 0 {
            return invalid("octave_jump_ratio must exceed 1 and median_window must be positive".into());
        }
        if !(0.0..=1.0).contains(&p.min_voiced_ratio) {
            return invalid(format!("min_voiced_ratio {} outside [0, 1]", p.min_voiced_ratio));
        }

        let v = &self.vibrato;
        if !(v.min_rate_hz > 0.0 && v.min_rate_hz < v.max_rate_hz) {
            return invalid(format!("vibrato band {}-{} Hz is empty", v.min_rate_hz, v.max_rate_hz));
        }
        if v.max_rate_hz * 2.0 >= p.frame_rate() {
            return invalid(format!(
                "vibrato band up to {} Hz needs a contour rate above {} frames/s",
                v.max_rate_hz,
                v.max_rate_hz * 2.0
            ));
        }
        if v.block_frames < 8 || v.fft_size < v.block_frames {
            return invalid(format!(
                "vibrato block of {} frames does not fit an FFT of {}",
                v.block_frames, v.fft_size
            ));
        }

        let dy = &self.dynamics;
        if !(dy.low_cv >= 0.0 && dy.low_cv < dy.high_cv) {
            return invalid(format!("dynamics thresholds {} / {} are inverted", dy.low_cv, dy.high_cv));
        }

        let c = &self.confidence;
        if !(0.0..=1.0).contains(&c.voiced_weight) || c.target_runs == 0 {
            return invalid("confidence weights must be in [0, 1] with a positive run target".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.decoder.target_sample_rate, 16000);
        assert_eq!(config.decoder.max_file_bytes, 50 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_sizes_at_16k() {
        let pitch = PitchConfig::default();
        assert_eq!(pitch.window_samples(16000), 640);
        assert_eq!(pitch.hop_samples(16000), 160);
        assert_eq!(pitch.frame_rate(), 100.0);
    }

    #[test]
    fn test_validate_rejects_empty_pitch_range() {
        let mut config = AnalysisConfig::default();
        config.pitch.min_f0_hz = 500.0;
        config.pitch.max_f0_hz = 400.0;
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_short_window() {
        let mut config = AnalysisConfig::default();
        config.pitch.window_ms = 10;
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_dynamics() {
        let mut config = AnalysisConfig::default();
        config.dynamics.low_cv = 0.5;
        config.dynamics.high_cv = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{ "pitch": { "voicing_threshold": 0.7 } }"#).unwrap();
        assert_eq!(config.pitch.voicing_threshold, 0.7);
        assert_eq!(config.pitch.min_f0_hz, 70.0);
        assert_eq!(config.vibrato, VibratoConfig::default());
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::load(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AnalysisConfig::default();
        config.decoder.max_duration_secs = 60.0;
        config.preprocess.highpass_hz = None;
        config.save(&path).unwrap();

        let loaded = AnalysisConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
