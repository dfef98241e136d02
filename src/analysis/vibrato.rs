//! Vibrato detection on the pitch contour.
//!
//! The longest voiced segment (short unvoiced runs bridged by linear
//! interpolation) is converted to cents about its mean and analysed with a
//! Welch power spectrum: half-overlapping blocks, each linearly detrended and
//! Hann-windowed, zero-padded to a fixed FFT length. A vibrato is reported
//! when the strongest peak in the 4-8 Hz band stands clear of the mean
//! spectral power. Slow drift below the band raises that mean, so its
//! window sidelobes do not register as vibrato.

use std::f32::consts::PI;
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use tracing::{debug, warn};

use super::pitch::PitchContour;
use crate::config::VibratoConfig;

/// Refined peaks this far outside the rate band (in FFT bins) still count
const BAND_EDGE_TOLERANCE_BINS: f32 = 0.25;

/// Vibrato rate and extent; both zero when nothing was detected
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VibratoReport {
    pub rate_hz: f32,
    /// Peak-to-peak extent in cents
    pub extent_cents: f32,
    pub detected: bool,
}

impl VibratoReport {
    pub fn none() -> Self {
        Self {
            rate_hz: 0.0,
            extent_cents: 0.0,
            detected: false,
        }
    }
}

/// Spectral vibrato detector with a pre-planned FFT and window
pub struct VibratoAnalyzer {
    config: VibratoConfig,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
}

impl std::fmt::Debug for VibratoAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VibratoAnalyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VibratoAnalyzer {
    pub fn new(config: VibratoConfig) -> Self {
        // Create Hann window
        let n = config.block_frames;
        let window: Vec<f32> = (0..n)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (n - 1).max(1) as f32).cos()))
            .collect();

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.fft_size);

        Self { config, fft, window }
    }

    /// Detect vibrato in `contour`. Absence of vibrato is not an error.
    pub fn analyze(&self, contour: &PitchContour) -> VibratoReport {
        let segment = longest_bridged_segment(contour, self.config.max_bridge_frames);
        let block = self.config.block_frames;
        if segment.len() < block {
            debug!(
                "Vibrato: longest voiced segment {} frames, need {}",
                segment.len(),
                block
            );
            return VibratoReport::none();
        }

        let mean_hz = segment.iter().map(|&f| f as f64).sum::<f64>() / segment.len() as f64;
        let cents: Vec<f32> = segment
            .iter()
            .map(|&f| (1200.0 * (f as f64 / mean_hz).log2()) as f32)
            .collect();

        let fft_size = self.config.fft_size;
        let bins = fft_size / 2 + 1;
        let mut power = vec![0.0f32; bins];
        let mut input = self.fft.make_input_vec();
        let mut output = self.fft.make_output_vec();
        let mut detrended = vec![0.0f32; block];
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;
        let mut blocks = 0usize;

        let step = (block / 2).max(1);
        let mut start = 0;
        while start + block <= cents.len() {
            detrend_into(&cents[start..start + block], &mut detrended);
            sum_sq += detrended.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>();
            count += block;

            input.fill(0.0);
            for ((slot, &x), &w) in input.iter_mut().zip(detrended.iter()).zip(self.window.iter()) {
                *slot = x * w;
            }
            if let Err(e) = self.fft.process(&mut input, &mut output) {
                warn!("Vibrato FFT failed: {}", e);
                return VibratoReport::none();
            }
            for (p, c) in power.iter_mut().zip(output.iter()) {
                *p += c.re * c.re + c.im * c.im;
            }

            blocks += 1;
            start += step;
        }
        for p in power.iter_mut() {
            *p /= blocks as f32;
        }

        let frame_rate = contour.frame_rate();
        let hz_per_bin = frame_rate / fft_size as f32;
        // Bins straddling the band edges are searched; the refined rate decides
        let lo = ((self.config.min_rate_hz / hz_per_bin).floor() as usize).max(1);
        let hi = ((self.config.max_rate_hz / hz_per_bin).ceil() as usize).min(bins - 2);
        if lo > hi {
            return VibratoReport::none();
        }

        let peak_bin = (lo..=hi)
            .max_by(|&a, &b| power[a].total_cmp(&power[b]))
            .unwrap_or(lo);
        let peak_power = power[peak_bin];
        let is_local_max = peak_power >= power[peak_bin - 1] && peak_power >= power[peak_bin + 1];

        let floor = power[1..].iter().sum::<f32>() / (bins - 1) as f32;
        let significant = is_local_max && peak_power > 0.0 && peak_power >= self.config.significance_ratio * floor;

        // Sine of amplitude A has RMS A/sqrt(2); peak-to-peak is 2A
        let extent_cents = (2.0 * std::f64::consts::SQRT_2 * (sum_sq / count.max(1) as f64).sqrt()) as f32;

        debug!(
            "Vibrato: peak bin {} ({:.2} Hz), power ratio {:.1}, extent {:.1} cents over {} blocks",
            peak_bin,
            peak_bin as f32 * hz_per_bin,
            if floor > 0.0 { peak_power / floor } else { f32::INFINITY },
            extent_cents,
            blocks
        );

        if !significant || extent_cents < self.config.min_extent_cents {
            return VibratoReport::none();
        }

        let (a, b, c) = (power[peak_bin - 1], peak_power, power[peak_bin + 1]);
        let denom = a - 2.0 * b + c;
        let offset = if denom.abs() > f32::EPSILON {
            (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };

        // Parabolic refinement is biased by a small fraction of a bin near the edges
        let rate_hz = (peak_bin as f32 + offset) * hz_per_bin;
        let tolerance = BAND_EDGE_TOLERANCE_BINS * hz_per_bin;
        if rate_hz < self.config.min_rate_hz - tolerance
            || rate_hz > self.config.max_rate_hz + tolerance
        {
            debug!("Vibrato: peak at {:.2} Hz is outside the band", rate_hz);
            return VibratoReport::none();
        }

        VibratoReport {
            rate_hz: rate_hz.clamp(self.config.min_rate_hz, self.config.max_rate_hz),
            extent_cents,
            detected: true,
        }
    }
}

/// Longest run of voiced frequencies, with unvoiced gaps of at most
/// `max_bridge` frames filled by linear interpolation.
fn longest_bridged_segment(contour: &PitchContour, max_bridge: usize) -> Vec<f32> {
    let mut best: Vec<f32> = Vec::new();
    let mut current: Vec<f32> = Vec::new();
    let mut gap = 0usize;

    for frame in contour.frames() {
        match frame.frequency_hz {
            Some(f) => {
                if let Some(&last) = current.last() {
                    if gap > max_bridge {
                        if current.len() > best.len() {
                            best = std::mem::take(&mut current);
                        } else {
                            current.clear();
                        }
                    } else {
                        for k in 1..=gap {
                            let t = k as f32 / (gap + 1) as f32;
                            current.push(last + (f - last) * t);
                        }
                    }
                }
                current.push(f);
                gap = 0;
            }
            None => gap += 1,
        }
    }

    if current.len() > best.len() {
        best = current;
    }
    best
}

/// Subtract the least-squares line from `values`.
fn detrend_into(values: &[f32], out: &mut [f32]) {
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;

    let mut num = 0.0f64;
    let mut den = 0.0f64;
    for (i, &v) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (v as f64 - y_mean);
        den += dx * dx;
    }
    let slope = if den > 0.0 { num / den } else { 0.0 };

    for (i, (o, &v)) in out.iter_mut().zip(values.iter()).enumerate() {
        *o = (v as f64 - y_mean - slope * (i as f64 - x_mean)) as f32;
    }
}
