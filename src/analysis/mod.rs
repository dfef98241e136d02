pub mod dynamics;
pub mod frames;
pub mod perturbation;
pub mod pitch;
pub mod vibrato;
pub mod voice_type;

pub use dynamics::Dynamics;
pub use frames::FrameGrid;
pub use perturbation::PerturbationReport;
pub use pitch::{PitchContour, PitchFrame, PitchTracker};
pub use vibrato::{VibratoAnalyzer, VibratoReport};
pub use voice_type::{PitchStatistics, VoiceType};
