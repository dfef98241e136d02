//! Pitch tracking: per-frame F0 via normalized autocorrelation
//!
//! ## Algorithm
//! 1. Partition the waveform into overlapping frames (40 ms window, 10 ms hop)
//! 2. Mark frames quieter than a fraction of the signal RMS as unvoiced
//! 3. Compute the normalized autocorrelation over the lag range of the
//!    plausible vocal range (70-1100 Hz by default)
//! 4. Collect local maxima above the voicing threshold as candidates,
//!    refining each lag with parabolic interpolation
//! 5. Pick a candidate with octave-jump suppression against the running
//!    median of recent voiced frames
//! 6. Fail with `InsufficientVoicedSignal` if too few frames are voiced

use std::collections::VecDeque;

use tracing::debug;

use super::frames::FrameGrid;
use crate::audio::waveform::{peak, rms};
use crate::audio::Waveform;
use crate::config::PitchConfig;
use crate::error::AnalysisError;

/// One frame of the pitch contour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    /// Frame start time in seconds
    pub time_secs: f32,
    /// Fundamental frequency; `None` for unvoiced frames
    pub frequency_hz: Option<f32>,
    /// Normalized autocorrelation of the chosen peak (0 when unvoiced)
    pub confidence: f32,
    /// Peak absolute sample value in the frame
    pub amplitude: f32,
}

impl PitchFrame {
    pub fn is_voiced(&self) -> bool {
        self.frequency_hz.is_some()
    }

    /// Fundamental period in seconds
    pub fn period_secs(&self) -> Option<f32> {
        self.frequency_hz.map(|f| 1.0 / f)
    }
}

/// Per-frame pitch estimates for a whole waveform
#[derive(Debug, Clone, PartialEq)]
pub struct PitchContour {
    frames: Vec<PitchFrame>,
    hop_secs: f32,
    voiced_ratio: f32,
}

impl PitchContour {
    pub fn new(frames: Vec<PitchFrame>, hop_secs: f32) -> Self {
        let voiced = frames.iter().filter(|f| f.is_voiced()).count();
        let voiced_ratio = if frames.is_empty() {
            0.0
        } else {
            voiced as f32 / frames.len() as f32
        };
        Self {
            frames,
            hop_secs,
            voiced_ratio,
        }
    }

    pub fn frames(&self) -> &[PitchFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn hop_secs(&self) -> f32 {
        self.hop_secs
    }

    /// Contour frames per second
    pub fn frame_rate(&self) -> f32 {
        1.0 / self.hop_secs
    }

    /// Fraction of frames that are voiced (0.0-1.0)
    pub fn voiced_ratio(&self) -> f32 {
        self.voiced_ratio
    }

    /// Frequencies of voiced frames, in order
    pub fn voiced_frequencies(&self) -> Vec<f32> {
        self.frames.iter().filter_map(|f| f.frequency_hz).collect()
    }

    /// Mean F0 over voiced frames
    pub fn mean_frequency(&self) -> Option<f32> {
        let voiced = self.voiced_frequencies();
        if voiced.is_empty() {
            return None;
        }
        Some(voiced.iter().sum::<f32>() / voiced.len() as f32)
    }
}

/// A local maximum of the autocorrelation function
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    /// Interpolated lag in samples
    lag: f32,
    strength: f32,
    frequency: f32,
}

/// Frame-based F0 estimator
#[derive(Debug, Clone)]
pub struct PitchTracker {
    config: PitchConfig,
}

impl PitchTracker {
    pub fn new(config: PitchConfig) -> Self {
        Self { config }
    }

    /// Track pitch across `wave`, failing if too little of it is voiced.
    pub fn track(&self, wave: &Waveform) -> Result<PitchContour, AnalysisError> {
        let contour = self.contour(wave);
        let voiced_ratio = contour.voiced_ratio();

        debug!(
            "Pitch contour: {} frames, {:.1}% voiced",
            contour.len(),
            voiced_ratio * 100.0
        );

        if contour.is_empty() || voiced_ratio < self.config.min_voiced_ratio {
            return Err(AnalysisError::InsufficientVoicedSignal {
                voiced_ratio,
                required: self.config.min_voiced_ratio,
            });
        }
        Ok(contour)
    }

    /// Per-frame estimates without the voiced-ratio check.
    pub fn contour(&self, wave: &Waveform) -> PitchContour {
        let sample_rate = wave.sample_rate();
        let window = self.config.window_samples(sample_rate);
        let hop = self.config.hop_samples(sample_rate);
        let grid = match FrameGrid::new(wave.len(), window, hop, sample_rate) {
            Some(grid) => grid,
            None => return PitchContour::new(Vec::new(), hop.max(1) as f32 / sample_rate as f32),
        };

        let min_lag = ((sample_rate as f32 / self.config.max_f0_hz).floor() as usize).max(2);
        let max_lag = ((sample_rate as f32 / self.config.min_f0_hz).ceil() as usize)
            .min(window.saturating_sub(2) / 2);

        let silence_level = wave.rms() * self.config.frame_silence_ratio;
        let mut history: VecDeque<f32> = VecDeque::with_capacity(self.config.median_window);
        let mut acf = vec![0.0f32; max_lag + 2];
        let mut prefix = vec![0.0f64; window + 1];
        let mut frames = Vec::with_capacity(grid.len());

        for (index, frame) in grid.frames(wave.samples()) {
            let mut estimate = PitchFrame {
                time_secs: grid.start_time(index),
                frequency_hz: None,
                confidence: 0.0,
                amplitude: peak(frame),
            };

            let level = rms(frame);
            if level > 0.0 && level >= silence_level && min_lag < max_lag {
                normalized_autocorrelation(frame, min_lag - 1, max_lag + 1, &mut prefix, &mut acf);
                let candidates = self.find_candidates(&acf, min_lag, max_lag, sample_rate);
                let median = running_median(&history);

                if let Some(choice) = self.choose_candidate(&candidates, median) {
                    estimate.frequency_hz = Some(choice.frequency);
                    estimate.confidence = choice.strength.clamp(0.0, 1.0);

                    if history.len() == self.config.median_window {
                        history.pop_front();
                    }
                    history.push_back(choice.frequency);
                }
            }

            frames.push(estimate);
        }

        PitchContour::new(frames, grid.hop_secs())
    }

    fn find_candidates(
        &self,
        acf: &[f32],
        min_lag: usize,
        max_lag: usize,
        sample_rate: u32,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for lag in min_lag..=max_lag {
            let (a, b, c) = (acf[lag - 1], acf[lag], acf[lag + 1]);
            if !(b > a && b >= c && b >= self.config.voicing_threshold) {
                continue;
            }

            // Parabolic interpolation around the peak
            let denom = a - 2.0 * b + c;
            let (offset, strength) = if denom.abs() > f32::EPSILON {
                let offset = (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
                (offset, b - 0.25 * (a - c) * offset)
            } else {
                (0.0, b)
            };

            // The lag bounds already cover the range; refinement may step just outside it
            let refined = lag as f32 + offset;
            let frequency =
                (sample_rate as f32 / refined).clamp(self.config.min_f0_hz, self.config.max_f0_hz);

            candidates.push(Candidate {
                lag: refined,
                strength,
                frequency,
            });
        }

        candidates
    }

    /// Pick the frame's pitch among autocorrelation peaks.
    ///
    /// Near-ties of the strongest peak compete. Without history the smallest
    /// lag wins. With a running median, the lowest-frequency near-tie within
    /// `octave_jump_ratio` of it wins; failing that, the strongest consistent
    /// peak; failing that, the history-free choice.
    fn choose_candidate(&self, candidates: &[Candidate], median: Option<f32>) -> Option<Candidate> {
        let best = candidates
            .iter()
            .map(|c| c.strength)
            .fold(f32::NEG_INFINITY, f32::max);
        let near_ties = || {
            candidates
                .iter()
                .filter(move |c| c.strength >= best - self.config.peak_tie_tolerance)
        };

        let default = near_ties().min_by(|a, b| a.lag.total_cmp(&b.lag)).copied()?;

        let median = match median {
            Some(m) => m,
            None => return Some(default),
        };
        let consistent = |c: &&Candidate| {
            let ratio = if c.frequency > median {
                c.frequency / median
            } else {
                median / c.frequency
            };
            ratio <= self.config.octave_jump_ratio
        };

        if let Some(choice) = near_ties()
            .filter(consistent)
            .max_by(|a, b| a.lag.total_cmp(&b.lag))
        {
            return Some(*choice);
        }

        if let Some(choice) = candidates
            .iter()
            .filter(consistent)
            .max_by(|a, b| a.strength.total_cmp(&b.strength))
        {
            return Some(*choice);
        }

        Some(default)
    }
}

/// Fill `out[lag]` for `lag` in `lo..=hi` with the normalized autocorrelation
/// of `frame`; `prefix` is scratch space for cumulative energy.
fn normalized_autocorrelation(frame: &[f32], lo: usize, hi: usize, prefix: &mut [f64], out: &mut [f32]) {
    let n = frame.len();
    prefix[0] = 0.0;
    for (i, &x) in frame.iter().enumerate() {
        prefix[i + 1] = prefix[i] + (x as f64) * (x as f64);
    }

    for lag in lo..=hi.min(n - 1) {
        let span = n - lag;
        let mut cross = 0.0f64;
        for i in 0..span {
            cross += frame[i] as f64 * frame[i + lag] as f64;
        }
        let head_energy = prefix[span];
        let tail_energy = prefix[n] - prefix[lag];
        let denom = (head_energy * tail_energy).sqrt();
        out[lag] = if denom > 1e-12 { (cross / denom) as f32 } else { 0.0 };
    }
}

fn running_median(history: &VecDeque<f32>) -> Option<f32> {
    if history.is_empty() {
        return None;
    }
    let mut sorted: Vec<f32> = history.iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    /// Generate a sine wave at a given frequency
    fn generate_sine(freq: f32, sample_rate: u32, duration_ms: u32) -> Vec<f32> {
        let num_samples = (sample_rate * duration_ms / 1000) as usize;
        (0..num_samples)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * PI * freq * t).sin() * 0.5
            })
            .collect()
    }

    /// Generate noise
    fn generate_noise(sample_rate: u32, duration_ms: u32) -> Vec<f32> {
        let num_samples = (sample_rate * duration_ms / 1000) as usize;
        // Simple pseudo-random noise using linear congruential generator
        let mut seed = 12345u32;
        (0..num_samples)
            .map(|_| {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                ((seed >> 16) as f32 / 32768.0 - 1.0) * 0.3
            })
            .collect()
    }

    fn tracker() -> PitchTracker {
        PitchTracker::new(PitchConfig::default())
    }

    fn candidate(frequency: f32, strength: f32) -> Candidate {
        Candidate {
            lag: 16000.0 / frequency,
            strength,
            frequency,
        }
    }

    #[test]
    fn test_sine_frequencies_within_one_percent() {
        for freq in [80.0, 110.0, 220.0, 330.0, 440.0, 660.0, 880.0, 1000.0] {
            let wave = Waveform::new(generate_sine(freq, 16000, 1000), 16000);
            let contour = tracker().track(&wave).unwrap();
            let mean = contour.mean_frequency().unwrap();
            assert!(
                (mean - freq).abs() / freq < 0.01,
                "Expected ~{} Hz, got {}",
                freq,
                mean
            );
            assert!(contour.voiced_ratio() > 0.95);
        }
    }

    #[test]
    fn test_sines_at_range_limits_stay_voiced() {
        let config = PitchConfig::default();
        for freq in [config.min_f0_hz, config.max_f0_hz] {
            let wave = Waveform::new(generate_sine(freq, 16000, 1000), 16000);
            let contour = tracker().track(&wave).unwrap();
            let mean = contour.mean_frequency().unwrap();
            assert!((mean - freq).abs() / freq < 0.01, "Expected ~{} Hz, got {}", freq, mean);
            assert!(
                contour.voiced_ratio() > 0.95,
                "{} Hz voiced ratio {}",
                freq,
                contour.voiced_ratio()
            );
            assert!(contour
                .voiced_frequencies()
                .iter()
                .all(|f| (config.min_f0_hz..=config.max_f0_hz).contains(f)));
        }
    }

    #[test]
    fn test_sine_contour_is_steady() {
        let wave = Waveform::new(generate_sine(220.0, 16000, 1000), 16000);
        let contour = tracker().track(&wave).unwrap();
        let voiced = contour.voiced_frequencies();
        let spread = voiced.iter().fold(0.0f32, |acc, f| acc.max((f - 220.0).abs()));
        assert!(spread < 1.0, "frame estimates spread by {} Hz", spread);
        assert!(contour.frames().iter().all(|f| f.confidence > 0.9));
    }

    #[test]
    fn test_contour_timing() {
        let wave = Waveform::new(generate_sine(220.0, 16000, 1000), 16000);
        let contour = tracker().contour(&wave);
        // (16000 - 640) / 160 + 1
        assert_eq!(contour.len(), 97);
        assert!((contour.hop_secs() - 0.01).abs() < 1e-6);
        assert!((contour.frames()[10].time_secs - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_silence_is_insufficient() {
        let wave = Waveform::new(vec![0.0; 16000], 16000);
        assert!(matches!(
            tracker().track(&wave),
            Err(AnalysisError::InsufficientVoicedSignal { .. })
        ));
    }

    #[test]
    fn test_noise_is_insufficient() {
        let wave = Waveform::new(generate_noise(16000, 1000), 16000);
        assert!(matches!(
            tracker().track(&wave),
            Err(AnalysisError::InsufficientVoicedSignal { .. })
        ));
    }

    #[test]
    fn test_too_short_for_one_frame() {
        let wave = Waveform::new(generate_sine(220.0, 16000, 30), 16000);
        assert!(matches!(
            tracker().track(&wave),
            Err(AnalysisError::InsufficientVoicedSignal { voiced_ratio, .. }) if voiced_ratio == 0.0
        ));
    }

    #[test]
    fn test_quiet_frames_are_unvoiced() {
        let mut samples = vec![0.0; 8000];
        samples.extend(generate_sine(220.0, 16000, 1000));
        let wave = Waveform::new(samples, 16000);
        let contour = tracker().track(&wave).unwrap();

        assert!(!contour.frames()[0].is_voiced());
        assert_eq!(contour.frames()[0].amplitude, 0.0);
        assert!(contour.frames().last().unwrap().is_voiced());
        assert!(contour.voiced_ratio() > 0.6 && contour.voiced_ratio() < 0.75);
    }

    #[test]
    fn test_min_voiced_ratio_is_configurable() {
        // 1 s of tone inside 9 s of silence: ~10% voiced
        let mut samples = generate_sine(220.0, 16000, 1000);
        samples.extend(vec![0.0; 16000 * 9]);
        let wave = Waveform::new(samples, 16000);

        let strict = PitchTracker::new(PitchConfig {
            min_voiced_ratio: 0.5,
            ..PitchConfig::default()
        });
        assert!(strict.track(&wave).is_err());

        let lenient = PitchTracker::new(PitchConfig {
            min_voiced_ratio: 0.05,
            ..PitchConfig::default()
        });
        assert!(lenient.track(&wave).is_ok());
    }

    #[test]
    fn test_harmonic_voice_tracks_fundamental() {
        let sample_rate = 16000;
        let fundamental = 150.0;
        let samples: Vec<f32> = (0..sample_rate)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * PI * fundamental * t).sin() * 0.5
                    + (2.0 * PI * fundamental * 2.0 * t).sin() * 0.25
                    + (2.0 * PI * fundamental * 3.0 * t).sin() * 0.125
            })
            .collect();
        let contour = tracker().track(&Waveform::new(samples, sample_rate)).unwrap();
        let mean = contour.mean_frequency().unwrap();
        assert!((mean - fundamental).abs() < 1.5, "Expected ~150 Hz, got {}", mean);
    }

    #[test]
    fn test_choose_prefers_smallest_lag_without_history() {
        let t = tracker();
        let candidates = [candidate(220.0, 0.95), candidate(110.0, 0.97), candidate(73.3, 0.96)];
        let choice = t.choose_candidate(&candidates, None).unwrap();
        assert_eq!(choice.frequency, 220.0);
    }

    #[test]
    fn test_choose_prefers_lowest_consistent_near_tie() {
        let t = tracker();
        let candidates = [candidate(220.0, 0.95), candidate(110.0, 0.97)];
        // History sits at 110 Hz: 220 Hz would be an octave jump
        let choice = t.choose_candidate(&candidates, Some(112.0)).unwrap();
        assert_eq!(choice.frequency, 110.0);
        // History at 215 Hz: 110 Hz is the jump
        let choice = t.choose_candidate(&candidates, Some(215.0)).unwrap();
        assert_eq!(choice.frequency, 220.0);
    }

    #[test]
    fn test_choose_falls_back_to_second_best() {
        let t = tracker();
        let candidates = [candidate(300.0, 0.99), candidate(150.0, 0.80), candidate(75.0, 0.70)];
        let choice = t.choose_candidate(&candidates, Some(140.0)).unwrap();
        assert_eq!(choice.frequency, 150.0);
    }

    #[test]
    fn test_choose_accepts_genuine_leap() {
        let t = tracker();
        let candidates = [candidate(600.0, 0.99)];
        let choice = t.choose_candidate(&candidates, Some(200.0)).unwrap();
        assert_eq!(choice.frequency, 600.0);
        assert!(t.choose_candidate(&[], Some(200.0)).is_none());
    }

    #[test]
    fn test_octave_ratio_is_configurable() {
        let strict = PitchTracker::new(PitchConfig {
            octave_jump_ratio: 1.05,
            ..PitchConfig::default()
        });
        let candidates = [candidate(230.0, 0.99), candidate(115.0, 0.98)];
        // 230 Hz is more than 5% away from a 200 Hz median; 115 Hz even more so,
        // so neither is consistent and the history-free choice stands
        let choice = strict.choose_candidate(&candidates, Some(200.0)).unwrap();
        assert_eq!(choice.frequency, 230.0);
    }

    #[test]
    fn test_running_median() {
        let history: VecDeque<f32> = [200.0, 100.0, 300.0].into_iter().collect();
        assert_eq!(running_median(&history), Some(200.0));
        let history: VecDeque<f32> = [200.0, 100.0].into_iter().collect();
        assert_eq!(running_median(&history), Some(150.0));
        assert_eq!(running_median(&VecDeque::new()), None);
    }

    #[test]
    fn test_agrees_with_mcleod_detector() {
        use pitch_detection::detector::mcleod::McLeodDetector;
        use pitch_detection::detector::PitchDetector;

        const FRAME_SIZE: usize = 1024;
        let sample_rate = 16000;
        let fundamental = 196.0;
        let samples: Vec<f32> = (0..sample_rate)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * PI * fundamental * t).sin() * 0.5 + (2.0 * PI * fundamental * 2.0 * t).sin() * 0.3
            })
            .collect();

        let mut detector = McLeodDetector::new(FRAME_SIZE, FRAME_SIZE / 2);
        let reference = detector
            .get_pitch(&samples[..FRAME_SIZE], sample_rate as usize, 0.8, 0.5)
            .expect("McLeod should find a pitch")
            .frequency;

        let ours = tracker()
            .track(&Waveform::new(samples, sample_rate))
            .unwrap()
            .mean_frequency()
            .unwrap();
        assert!(
            (ours - reference).abs() / reference < 0.02,
            "autocorrelation {} Hz vs McLeod {} Hz",
            ours,
            reference
        );
    }
}
