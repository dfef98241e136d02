use serde::{Deserialize, Serialize};

use super::pitch::PitchContour;
use crate::config::DynamicsConfig;

/// Coarse loudness-variability category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dynamics {
    Low,
    Medium,
    High,
}

impl Dynamics {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dynamics::Low => "low",
            Dynamics::Medium => "medium",
            Dynamics::High => "high",
        }
    }
}

impl std::fmt::Display for Dynamics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coefficient of variation (stdev / mean) of voiced-frame peak amplitudes.
pub fn amplitude_variation(contour: &PitchContour) -> Option<f32> {
    let amplitudes: Vec<f64> = contour
        .frames()
        .iter()
        .filter(|f| f.is_voiced())
        .map(|f| f.amplitude as f64)
        .collect();
    if amplitudes.is_empty() {
        return None;
    }

    let n = amplitudes.len() as f64;
    let mean = amplitudes.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = amplitudes.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
    Some((variance.sqrt() / mean) as f32)
}

/// Classify loudness variability; `Medium` when there is nothing to measure.
pub fn classify(contour: &PitchContour, config: &DynamicsConfig) -> Dynamics {
    match amplitude_variation(contour) {
        None => Dynamics::Medium,
        Some(cv) if cv < config.low_cv => Dynamics::Low,
        Some(cv) if cv >= config.high_cv => Dynamics::High,
        Some(_) => Dynamics::Medium,
    }
}
