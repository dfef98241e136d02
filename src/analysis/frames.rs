/// Overlapping analysis windows over a sample buffer.
///
/// Windows start every `hop` samples; a trailing window that would run past
/// the end of the buffer is dropped rather than zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGrid {
    window: usize,
    hop: usize,
    sample_rate: u32,
    frame_count: usize,
}

impl FrameGrid {
    /// Build a grid for `len` samples. Returns `None` if `hop` is zero or
    /// larger than `window`.
    pub fn new(len: usize, window: usize, hop: usize, sample_rate: u32) -> Option<Self> {
        if hop == 0 || window < hop || sample_rate == 0 {
            return None;
        }
        let frame_count = if len < window { 0 } else { (len - window) / hop + 1 };
        Some(Self {
            window,
            hop,
            sample_rate,
            frame_count,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn len(&self) -> usize {
        self.frame_count
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Start time of frame `index` in seconds
    pub fn start_time(&self, index: usize) -> f32 {
        (index * self.hop) as f32 / self.sample_rate as f32
    }

    /// Hop duration in seconds
    pub fn hop_secs(&self) -> f32 {
        self.hop as f32 / self.sample_rate as f32
    }

    /// Iterate `(index, window samples)` over `samples`
    pub fn frames<'a>(&self, samples: &'a [f32]) -> impl Iterator<Item = (usize, &'a [f32])> + 'a {
        let (window, hop, count) = (self.window, self.hop, self.frame_count);
        (0..count).map(move |i| (i, &samples[i * hop..i * hop + window]))
    }
}
