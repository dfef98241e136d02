//! Container/codec decoding into a mono waveform at the analysis rate.
//!
//! Any format symphonia can probe is accepted. The declared media type is
//! only a probe hint; the byte stream itself decides the format.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::resampler::AudioResampler;
use super::waveform::Waveform;
use crate::config::DecoderConfig;
use crate::error::AnalysisError;

/// Decodes uploaded audio bytes into [`Waveform`]s
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    config: DecoderConfig,
}

impl AudioDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Decode `bytes` to a mono waveform at the configured target rate.
    pub fn decode(
        &self,
        bytes: &[u8],
        declared_media_type: Option<&str>,
    ) -> Result<Waveform, AnalysisError> {
        if bytes.len() > self.config.max_file_bytes {
            return Err(AnalysisError::FileTooLarge {
                size: bytes.len(),
                max: self.config.max_file_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(AnalysisError::EmptyAudio);
        }

        let (samples, source_rate) = self.decode_to_mono(bytes, declared_media_type)?;
        if samples.is_empty() {
            return Err(AnalysisError::EmptyAudio);
        }

        debug!(
            "Decoded {} samples at {} Hz ({:.2}s)",
            samples.len(),
            source_rate,
            samples.len() as f64 / source_rate as f64
        );

        self.conform(Waveform::new(samples, source_rate))
    }

    /// Bring an already decoded waveform under the duration bound and to the
    /// configured target rate.
    pub fn conform(&self, wave: Waveform) -> Result<Waveform, AnalysisError> {
        let source_rate = wave.sample_rate();
        if source_rate == 0 {
            return Err(AnalysisError::UnsupportedFormat("missing sample rate".into()));
        }
        if wave.len() as u64 > self.max_frames(source_rate) {
            return Err(self.too_long(wave.len() as u64, source_rate));
        }

        let target_rate = self.config.target_sample_rate;
        if source_rate == target_rate {
            return Ok(wave);
        }

        let mut resampler = AudioResampler::new(source_rate, target_rate).map_err(|e| {
            AnalysisError::UnsupportedFormat(format!(
                "cannot resample from {} Hz: {:#}",
                source_rate, e
            ))
        })?;
        let samples = resampler.process_all(wave.samples()).map_err(|e| {
            AnalysisError::UnsupportedFormat(format!("resampling failed: {:#}", e))
        })?;

        Ok(Waveform::new(samples, target_rate))
    }

    /// Largest number of source frames accepted at `sample_rate`
    fn max_frames(&self, sample_rate: u32) -> u64 {
        (self.config.max_duration_secs * sample_rate as f64).round() as u64
    }

    fn too_long(&self, frames: u64, sample_rate: u32) -> AnalysisError {
        AnalysisError::DurationTooLong {
            seconds: frames as f64 / sample_rate as f64,
            max_seconds: self.config.max_duration_secs,
        }
    }

    fn decode_to_mono(
        &self,
        bytes: &[u8],
        declared_media_type: Option<&str>,
    ) -> Result<(Vec<f32>, u32), AnalysisError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

        let mut hint = Hint::new();
        if let Some(media_type) = declared_media_type {
            hint.mime_type(media_type);
            if let Some(ext) = extension_for_media_type(media_type) {
                hint.with_extension(ext);
            }
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AnalysisError::UnsupportedFormat(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AnalysisError::UnsupportedFormat("no decodable audio track".into()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .filter(|&sr| sr > 0)
            .ok_or_else(|| AnalysisError::UnsupportedFormat("missing sample rate".into()))?;

        // Reject known-long inputs before paying for the decode
        let max_frames = self.max_frames(sample_rate);
        if let Some(n_frames) = codec_params.n_frames {
            if n_frames > max_frames {
                return Err(self.too_long(n_frames, sample_rate));
            }
        }

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| AnalysisError::UnsupportedFormat(e.to_string()))?;

        let mut out = Vec::<f32>::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(e) => {
                    end_of_stream(e, out.len())?;
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // Corrupted packets are skipped
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(AnalysisError::UnsupportedFormat(e.to_string())),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);
            push_interleaved_as_mono(buf.samples(), channels, &mut out);

            if out.len() as u64 > max_frames {
                return Err(self.too_long(out.len() as u64, sample_rate));
            }
        }

        Ok((out, sample_rate))
    }
}

/// Classify a `next_packet` error after `decoded` samples. `Ok` ends the
/// stream with what has been decoded so far.
fn end_of_stream(error: SymphoniaError, decoded: usize) -> Result<(), AnalysisError> {
    match error {
        SymphoniaError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
        SymphoniaError::ResetRequired => Err(AnalysisError::UnsupportedFormat(
            "stream parameters change mid-stream".into(),
        )),
        // Nothing readable at all
        e if decoded == 0 => Err(AnalysisError::UnsupportedFormat(e.to_string())),
        e => {
            warn!("Stopping decode on container error: {}", e);
            Ok(())
        }
    }
}

/// Average interleaved channels down to mono
fn push_interleaved_as_mono(samples: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(samples);
        return;
    }
    out.extend(
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Map common upload media types to a file extension probe hint
fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
    let essence = media_type.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match essence.as_str() {
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "audio/vorbis" | "application/ogg" => "ogg",
        "audio/webm" | "video/webm" => "webm",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "video/mp4" => "m4a",
        "audio/aac" => "aac",
        "audio/aiff" | "audio/x-aiff" => "aiff",
        _ => return None,
    };
    Some(ext)
}
