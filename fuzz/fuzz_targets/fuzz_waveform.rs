//! Fuzz testing for the analysis stages after decoding
//!
//! Treats the input as raw little-endian f32 samples at 16 kHz.
//!
//! Run with: cargo +nightly fuzz run fuzz_waveform

#![no_main]

use libfuzzer_sys::fuzz_target;
use vocal_metrics::audio::Waveform;
use vocal_metrics::{AnalysisConfig, Pipeline};

fuzz_target!(|data: &[u8]| {
    // Each f32 is 4 bytes
    let samples: Vec<f32> = data
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if samples.is_empty() {
        return;
    }

    // Non-finite samples are zeroed by Waveform::new
    let pipeline = Pipeline::new(AnalysisConfig::default()).unwrap();
    if let Ok(record) = pipeline.analyze_waveform(Waveform::new(samples, 16000)) {
        assert!(record.mean_pitch.is_finite());
        assert!((0.0..=1.0).contains(&record.confidence_score));
    }
});
