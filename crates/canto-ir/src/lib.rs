//! Core IR types for the canto singing synthesizer.
//!
//! This crate defines the intermediate representation shared by the
//! workspace. The score interpreter emits a [`Project`], the voicebank
//! reader emits [`VoicebankEntry`] records, and the engine turns both into
//! a [`Waveform`] through a [`Vocoder`].

mod analysis;
mod event;
mod pitch;
mod project;
mod voicebank;
mod vocoder;
mod waveform;

pub use analysis::{Analysis, CachedAnalysis, Fingerprint};
pub use event::Event;
pub use pitch::{
    key_offset, parse_spn, semitone, semitone_to_hz, shift_ratio, CONCERT_PITCH, REFERENCE_NOTE,
};
pub use project::{Project, Track, GLOBAL_TRACK};
pub use voicebank::{SampleKey, VoicebankEntry};
pub use vocoder::{frame_hop, SynthesisFrames, Vocoder, VocoderError};
pub use waveform::Waveform;
