//! Rendering engine for the canto singing synthesizer.
//!
//! Indexes a voicebank, analyses its samples on demand and renders a
//! [`canto_ir::Project`] into one mixed waveform.

mod analysis_cache;
mod error;
mod renderer;
pub mod resampler;
mod source;
mod voicebank;

pub use analysis_cache::AnalysisCache;
pub use error::{AnalysisError, EngineError, LookupError, RenderCause, RenderError, SourceError};
pub use renderer::{crossfades, join, mix, overlay, Lead, Renderer};
pub use resampler::{
    fit_length, plan_frames, synthesis_frames, voiced_frames, Alignment, LoopMode, RenderSettings,
    Resampler,
};
pub use source::{MemorySampleSource, SampleSource};
pub use voicebank::VoicebankIndex;
