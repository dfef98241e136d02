use anyhow::{Context, Result};
use rubato::{FftFixedIn, Resampler};
use tracing::debug;

/// Input chunk size fed to the FFT resampler
const CHUNK_FRAMES: usize = 1024;

/// Whole-buffer resampler for converting decoded audio to the analysis rate
pub struct AudioResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<Vec<f32>>,
    output_buffer: Vec<Vec<f32>>,
    input_frames: usize,
    source_rate: u32,
    target_rate: u32,
}

impl AudioResampler {
    /// Create a new mono resampler from `source_rate` to `target_rate`
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self> {
        let ratio = target_rate as f64 / source_rate as f64;

        debug!(
            "Creating resampler: {} Hz -> {} Hz (ratio: {:.4})",
            source_rate, target_rate, ratio
        );

        let channels = 1; // Mono

        let resampler = FftFixedIn::new(
            source_rate as usize,
            target_rate as usize,
            CHUNK_FRAMES,
            2, // sub_chunks for quality
            channels,
        )
        .context("Failed to create resampler")?;

        // Pre-allocate buffers
        let input_buffer = vec![vec![0.0f32; CHUNK_FRAMES]; channels];
        let output_buffer = resampler.output_buffer_allocate(true);

        Ok(Self {
            resampler,
            input_buffer,
            output_buffer,
            input_frames: CHUNK_FRAMES,
            source_rate,
            target_rate,
        })
    }

    /// Number of output samples `input_len` source samples map to
    pub fn expected_output_len(&self, input_len: usize) -> usize {
        (input_len as f64 * self.target_rate as f64 / self.source_rate as f64).round() as usize
    }

    /// Resample a complete signal.
    ///
    /// The tail is zero-padded and flushed, and the resampler's output delay
    /// is removed, so output sample `i` lines up with input time `i / target_rate`.
    pub fn process_all(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let expected = self.expected_output_len(input.len());
        let delay = self.resampler.output_delay();
        let wanted = delay + expected;
        let mut output = Vec::with_capacity(wanted + self.output_buffer[0].len());

        for chunk in input.chunks(self.input_frames) {
            self.input_buffer[0][..chunk.len()].copy_from_slice(chunk);
            self.input_buffer[0][chunk.len()..].fill(0.0);
            self.process_buffer(&mut output)?;
        }

        // Flush the FFT overlap with silence until the delayed tail is out
        self.input_buffer[0].fill(0.0);
        while output.len() < wanted {
            self.process_buffer(&mut output)?;
        }

        output.drain(..delay);
        output.truncate(expected);
        self.resampler.reset();
        Ok(output)
    }

    fn process_buffer(&mut self, output: &mut Vec<f32>) -> Result<()> {
        let (_, output_frames) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .context("Resampling failed")?;
        output.extend_from_slice(&self.output_buffer[0][..output_frames]);
        Ok(())
    }
}
