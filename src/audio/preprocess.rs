//! # Audio Pre-processing
//!
//! Cleans a decoded waveform before pitch tracking. The chain runs in order:
//!
//! 1. **DC Offset Removal** - subtracts the signal mean
//! 2. **High-Pass Filter** - optional Butterworth filter below the vocal range
//! 3. **Peak Normalization** - scales the loudest sample to a target level
//! 4. **Silence Trim** - drops leading/trailing windows whose RMS falls below
//!    a fraction of the signal's own RMS
//!
//! The trim threshold is relative so quiet and loud recordings are trimmed
//! the same way. Recordings whose raw peak is under the absolute silence
//! floor are rejected with [`AnalysisError::NoVoiceDetected`].

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};
use tracing::debug;

use super::waveform::{peak, rms, Waveform};
use crate::config::PreprocessConfig;
use crate::error::AnalysisError;

/// Applies DC removal, high-pass filtering, normalization and trimming.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Clean `wave`, consuming it.
    pub fn process(&self, wave: Waveform) -> Result<Waveform, AnalysisError> {
        let sample_rate = wave.sample_rate();
        let mut samples = wave.into_samples();

        if peak(&samples) < self.config.silence_floor {
            return Err(AnalysisError::NoVoiceDetected);
        }

        remove_dc(&mut samples);

        if let Some(cutoff) = self.config.highpass_hz {
            apply_highpass(&mut samples, sample_rate, cutoff)?;
        }

        let level = peak(&samples);
        if level < self.config.silence_floor {
            return Err(AnalysisError::NoVoiceDetected);
        }
        let gain = self.config.target_peak / level;
        for s in samples.iter_mut() {
            *s *= gain;
        }

        let window = ((self.config.trim_window_ms as usize * sample_rate as usize) / 1000).max(1);
        let threshold = rms(&samples) * self.config.trim_threshold_ratio;
        let (start, end) =
            trim_bounds(&samples, window, threshold).ok_or(AnalysisError::NoVoiceDetected)?;

        debug!(
            "Preprocessed: gain {:.2}, kept samples {}..{} of {}",
            gain,
            start,
            end,
            samples.len()
        );

        samples.truncate(end);
        samples.drain(..start);
        Ok(Waveform::new(samples, sample_rate))
    }
}

/// Subtract the mean so the signal is centred on zero.
fn remove_dc(samples: &mut [f32]) {
    if samples.is_empty() {
        return;
    }
    let mean = (samples.iter().map(|&x| x as f64).sum::<f64>() / samples.len() as f64) as f32;
    for s in samples.iter_mut() {
        *s -= mean;
    }
}

fn apply_highpass(samples: &mut [f32], sample_rate: u32, cutoff_hz: u32) -> Result<(), AnalysisError> {
    let coeffs = Coefficients::<f32>::from_params(
        Type::HighPass,
        sample_rate.hz(),
        cutoff_hz.hz(),
        Q_BUTTERWORTH_F32,
    )
    .map_err(|e| {
        AnalysisError::InvalidConfig(format!(
            "high-pass at {} Hz is not realizable at {} Hz: {:?}",
            cutoff_hz, sample_rate, e
        ))
    })?;

    let mut highpass = DirectForm2Transposed::<f32>::new(coeffs);
    for sample in samples.iter_mut() {
        *sample = highpass.run(*sample);
    }
    Ok(())
}

/// Sample bounds `[start, end)` of the first through last window whose RMS
/// reaches `threshold`, or `None` if no window does.
fn trim_bounds(samples: &[f32], window: usize, threshold: f32) -> Option<(usize, usize)> {
    let loud: Vec<bool> = samples
        .chunks(window)
        .map(|chunk| rms(chunk) >= threshold && rms(chunk) > 0.0)
        .collect();

    let first = loud.iter().position(|&l| l)?;
    let last = loud.iter().rposition(|&l| l)?;
    Some((first * window, ((last + 1) * window).min(samples.len())))
}
