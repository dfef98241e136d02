//! Voice classification from the voiced pitch distribution.
//!
//! | Voice type    | Classification pitch (Hz) |
//! |---------------|---------------------------|
//! | bass          | up to 190.5               |
//! | baritone      | above 190.5, up to 240    |
//! | tenor         | above 240, up to 302      |
//! | alto          | above 302, up to 392      |
//! | mezzo-soprano | above 392, up to 480      |
//! | soprano       | above 480                 |
//!
//! The classification pitch is the geometric mean of the mean voiced pitch
//! and the centre of the 5th-95th percentile range, so a few stray frames at
//! either extreme do not move the label.

use serde::{Deserialize, Serialize};

use super::pitch::PitchContour;

/// Vocal classification, ordered from lowest to highest range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoiceType {
    Bass,
    Baritone,
    Tenor,
    Alto,
    MezzoSoprano,
    Soprano,
}

/// Inclusive upper bound of each band; the last band is open-ended.
const BANDS: [(f32, VoiceType); 5] = [
    (190.5, VoiceType::Bass),
    (240.0, VoiceType::Baritone),
    (302.0, VoiceType::Tenor),
    (392.0, VoiceType::Alto),
    (480.0, VoiceType::MezzoSoprano),
];

impl VoiceType {
    pub const ALL: [VoiceType; 6] = [
        VoiceType::Bass,
        VoiceType::Baritone,
        VoiceType::Tenor,
        VoiceType::Alto,
        VoiceType::MezzoSoprano,
        VoiceType::Soprano,
    ];

    /// Label for a classification pitch; band edges belong to the lower band.
    pub fn from_pitch(hz: f32) -> Self {
        BANDS
            .iter()
            .find(|(upper, _)| hz <= *upper)
            .map(|(_, voice)| *voice)
            .unwrap_or(VoiceType::Soprano)
    }

    /// `(exclusive lower, inclusive upper)` bounds in Hz
    pub fn band(&self) -> (f32, f32) {
        let index = Self::ALL.iter().position(|v| v == self).unwrap_or(0);
        let lower = if index == 0 { f32::NEG_INFINITY } else { BANDS[index - 1].0 };
        let upper = BANDS.get(index).map(|(u, _)| *u).unwrap_or(f32::INFINITY);
        (lower, upper)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceType::Bass => "bass",
            VoiceType::Baritone => "baritone",
            VoiceType::Tenor => "tenor",
            VoiceType::Alto => "alto",
            VoiceType::MezzoSoprano => "mezzo-soprano",
            VoiceType::Soprano => "soprano",
        }
    }
}

impl std::fmt::Display for VoiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of the voiced pitch distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchStatistics {
    pub mean_hz: f32,
    pub p5_hz: f32,
    pub p95_hz: f32,
}

impl PitchStatistics {
    /// Statistics over voiced frames; `None` if no frame is voiced.
    pub fn from_contour(contour: &PitchContour) -> Option<Self> {
        let mut voiced = contour.voiced_frequencies();
        if voiced.is_empty() {
            return None;
        }
        let mean_hz = (voiced.iter().map(|&f| f as f64).sum::<f64>() / voiced.len() as f64) as f32;
        voiced.sort_by(|a, b| a.total_cmp(b));
        Some(Self {
            mean_hz,
            p5_hz: percentile(&voiced, 0.05),
            p95_hz: percentile(&voiced, 0.95),
        })
    }

    /// Pitch used for voice classification
    pub fn classification_pitch(&self) -> f32 {
        let range_centre = (self.p5_hz * self.p95_hz).sqrt();
        (self.mean_hz * range_centre).sqrt()
    }

    pub fn voice_type(&self) -> VoiceType {
        VoiceType::from_pitch(self.classification_pitch())
    }
}

/// Linearly interpolated percentile of ascending `sorted`, `q` in [0, 1].
fn percentile(sorted: &[f32], q: f32) -> f32 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f32;
            let below = rank.floor() as usize;
            let above = (below + 1).min(n - 1);
            let frac = rank - below as f32;
            sorted[below] + (sorted[above] - sorted[below]) * frac
        }
    }
}
