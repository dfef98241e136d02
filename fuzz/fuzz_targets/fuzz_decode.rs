//! Fuzz testing for the full analysis entry point
//!
//! Arbitrary bytes must produce a record or a typed error, never a panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use vocal_metrics::analyze_voice;

fuzz_target!(|data: &[u8]| {
    for hint in [None, Some("audio/wav"), Some("audio/mpeg"), Some("audio/ogg")] {
        let _ = analyze_voice(data, hint);
    }
});
