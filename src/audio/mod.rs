pub mod decoder;
pub mod preprocess;
pub mod resampler;
pub mod waveform;

pub use decoder::AudioDecoder;
pub use preprocess::Preprocessor;
pub use resampler::AudioResampler;
pub use waveform::Waveform;
