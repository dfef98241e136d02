//! Cycle-to-cycle perturbation: jitter (period) and shimmer (amplitude).
//!
//! Both measures pool the absolute differences between adjacent voiced
//! frames inside runs of consecutive voiced frames. An unvoiced frame ends
//! the run, so no difference is ever taken across a gap.

use tracing::warn;

use super::pitch::PitchContour;

/// Jitter and shimmer over the voiced runs of a contour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbationReport {
    /// Mean |T(i) - T(i+1)| / mean T, in percent
    pub jitter_percent: f32,
    /// Mean |A(i) - A(i+1)| / mean A, in percent
    pub shimmer_percent: f32,
    /// Runs of at least two consecutive voiced frames
    pub valid_runs: usize,
    /// Set when no run was long enough to measure anything
    pub low_confidence: bool,
}

impl PerturbationReport {
    fn unmeasured() -> Self {
        Self {
            jitter_percent: 0.0,
            shimmer_percent: 0.0,
            valid_runs: 0,
            low_confidence: true,
        }
    }
}

/// Accumulates one measure (period or amplitude) across runs
#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: usize,
    diff_sum: f64,
    diff_count: usize,
}

impl Accumulator {
    fn add_run(&mut self, values: &[f32]) {
        self.sum += values.iter().map(|&v| v as f64).sum::<f64>();
        self.count += values.len();
        for pair in values.windows(2) {
            self.diff_sum += (pair[1] as f64 - pair[0] as f64).abs();
            self.diff_count += 1;
        }
    }

    fn percent(&self) -> f32 {
        if self.count == 0 || self.diff_count == 0 {
            return 0.0;
        }
        let mean = self.sum / self.count as f64;
        if mean <= 0.0 {
            return 0.0;
        }
        ((self.diff_sum / self.diff_count as f64) / mean * 100.0) as f32
    }
}

/// Compute jitter and shimmer for `contour`.
///
/// Never fails: a contour without any two adjacent voiced frames yields
/// zeros flagged as low confidence.
pub fn analyze(contour: &PitchContour) -> PerturbationReport {
    let mut periods = Accumulator::default();
    let mut amplitudes = Accumulator::default();
    let mut valid_runs = 0;

    let mut run_periods: Vec<f32> = Vec::new();
    let mut run_amplitudes: Vec<f32> = Vec::new();

    let mut close_run = |run_periods: &mut Vec<f32>, run_amplitudes: &mut Vec<f32>| {
        if run_periods.len() >= 2 {
            periods.add_run(run_periods);
            amplitudes.add_run(run_amplitudes);
            valid_runs += 1;
        }
        run_periods.clear();
        run_amplitudes.clear();
    };

    for frame in contour.frames() {
        match frame.period_secs() {
            Some(period) => {
                run_periods.push(period);
                run_amplitudes.push(frame.amplitude);
            }
            None => close_run(&mut run_periods, &mut run_amplitudes),
        }
    }
    close_run(&mut run_periods, &mut run_amplitudes);

    if valid_runs == 0 {
        warn!("No run of consecutive voiced frames; jitter and shimmer unmeasured");
        return PerturbationReport::unmeasured();
    }

    PerturbationReport {
        jitter_percent: periods.percent(),
        shimmer_percent: amplitudes.percent(),
        valid_runs,
        low_confidence: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pitch::PitchFrame;

    fn frame(i: usize, freq: Option<f32>, amplitude: f32) -> PitchFrame {
        PitchFrame {
            time_secs: i as f32 * 0.01,
            frequency_hz: freq,
            confidence: if freq.is_some() { 0.9 } else { 0.0 },
            amplitude,
        }
    }

    fn contour(frames: Vec<PitchFrame>) -> PitchContour {
        PitchContour::new(frames, 0.01)
    }

    #[test]
    fn perfect_signal_zero_perturbation() {
        let c = contour((0..50).map(|i| frame(i, Some(100.0), 0.5)).collect());
        let report = analyze(&c);
        assert!(report.jitter_percent < 0.001);
        assert!(report.shimmer_percent < 0.001);
        assert_eq!(report.valid_runs, 1);
        assert!(!report.low_confidence);
    }

    #[test]
    fn known_jitter() {
        // Periods alternate 10 ms / 9.09 ms: |diff| 0.909 ms over mean 9.545 ms
        let c = contour(
            (0..20)
                .map(|i| frame(i, Some(if i % 2 == 0 { 100.0 } else { 110.0 }), 0.5))
                .collect(),
        );
        let report = analyze(&c);
        assert!(
            (report.jitter_percent - 9.52).abs() < 0.1,
            "Expected ~9.5% jitter, got {:.2}%",
            report.jitter_percent
        );
    }

    #[test]
    fn known_shimmer() {
        // Amplitudes alternate 0.4 / 0.6: |diff| 0.2 over mean 0.5
        let c = contour(
            (0..20)
                .map(|i| frame(i, Some(200.0), if i % 2 == 0 { 0.4 } else { 0.6 }))
                .collect(),
        );
        let report = analyze(&c);
        assert!((report.shimmer_percent - 40.0).abs() < 0.01);
        assert!(report.jitter_percent < 0.001);
    }

    #[test]
    fn gap_breaks_chain() {
        // The jump from 100 Hz to 200 Hz happens across a gap, so it is not measured
        let c = contour(vec![
            frame(0, Some(100.0), 0.5),
            frame(1, Some(100.0), 0.5),
            frame(2, None, 0.0),
            frame(3, Some(200.0), 0.9),
            frame(4, Some(200.0), 0.9),
        ]);
        let report = analyze(&c);
        assert_eq!(report.valid_runs, 2);
        assert!(report.jitter_percent < 0.001);
        assert!(report.shimmer_percent < 0.001);
    }

    #[test]
    fn isolated_frames_are_low_confidence() {
        let c = contour(vec![
            frame(0, Some(100.0), 0.5),
            frame(1, None, 0.0),
            frame(2, Some(150.0), 0.5),
            frame(3, None, 0.0),
            frame(4, Some(300.0), 0.2),
        ]);
        let report = analyze(&c);
        assert_eq!(report, PerturbationReport::unmeasured());
        assert!(report.low_confidence);
    }

    #[test]
    fn single_frame_runs_do_not_contribute() {
        // The isolated 300 Hz frame would inflate the mean period if it counted
        let c = contour(vec![
            frame(0, Some(300.0), 0.1),
            frame(1, None, 0.0),
            frame(2, Some(100.0), 0.5),
            frame(3, Some(100.0), 0.5),
            frame(4, Some(100.0), 0.5),
        ]);
        let report = analyze(&c);
        assert_eq!(report.valid_runs, 1);
        assert!(report.jitter_percent < 0.001);
        assert!(report.shimmer_percent < 0.001);
    }

    #[test]
    fn empty_contour_is_low_confidence() {
        assert!(analyze(&contour(Vec::new())).low_confidence);
    }
}
