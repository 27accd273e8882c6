//! Engine error types.

use canto_ir::VocoderError;

/// A syllable with no voicebank entry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("no voicebank entry for syllable {syllable:?}")]
pub struct LookupError {
    pub syllable: String,
}

/// A sample source failed to produce audio.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SourceError {
    pub message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure to obtain the analysis of a sample file.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to load sample {sample}: {error}")]
    Load { sample: String, error: SourceError },
    #[error("vocoder failed on sample {sample}: {error}")]
    Vocoder { sample: String, error: VocoderError },
    #[error("sample {sample} has no voiced frames")]
    Unvoiced { sample: String },
}

/// Why a single event could not be rendered.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RenderCause {
    #[error("voiced region of sample {sample} is empty")]
    EmptyRegion { sample: String },
    #[error("vocoder failed: {0}")]
    Vocoder(VocoderError),
    #[error("pitch {pitch} is out of range for a sample recorded at {recorded}")]
    PitchOutOfRange { pitch: i32, recorded: i32 },
    #[error("vocoder returned {actual} samples, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// A render failure located in the project.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("track {track:?}, event {index}: {cause}")]
pub struct RenderError {
    pub track: String,
    /// Index of the event within its track
    pub index: usize,
    pub cause: RenderCause,
}

/// Error type for rendering a project.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
