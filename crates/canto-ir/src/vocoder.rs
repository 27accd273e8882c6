//! Vocoder collaborator trait.

use crate::analysis::Analysis;

/// Failure reported by a vocoder implementation.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct VocoderError {
    pub message: String,
}

impl VocoderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Frames handed to [`Vocoder::synthesize`].
///
/// `f0` is owned because the engine pitch-shifts it; the envelope and
/// aperiodicity frames are borrowed straight from the cached analysis.
#[derive(Clone, Debug)]
pub struct SynthesisFrames<'a> {
    pub f0: Vec<f64>,
    pub spectral_envelope: Vec<&'a [f64]>,
    pub aperiodicity: Vec<&'a [f64]>,
    pub frame_period: f64,
    /// Sample rate the envelope and aperiodicity were analysed at
    pub envelope_rate: u32,
}

impl SynthesisFrames<'_> {
    /// Number of frames.
    pub fn len(&self) -> usize {
        self.f0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.f0.is_empty()
    }

    /// Samples per frame at `sample_rate`.
    pub fn hop(&self, sample_rate: u32) -> usize {
        frame_hop(self.frame_period, sample_rate)
    }
}

/// Whole samples between frames of `frame_period` seconds at
/// `sample_rate`. Never zero.
pub fn frame_hop(frame_period: f64, sample_rate: u32) -> usize {
    ((frame_period * sample_rate as f64).round() as usize).max(1)
}

/// Analysis/resynthesis backend.
///
/// The engine never looks inside the envelope or aperiodicity vectors; it
/// only slices frames and scales F0.
pub trait Vocoder: Send + Sync {
    /// Analyse a mono waveform.
    fn analyze(&self, waveform: &[f32], sample_rate: u32) -> Result<Analysis, VocoderError>;

    /// Resynthesize a waveform from frame parameters.
    ///
    /// Envelope bins describe frequencies at `frames.envelope_rate`, which
    /// may differ from the output `sample_rate`.
    ///
    /// The result should hold `frames * frame_hop(frame_period, sample_rate)`
    /// samples; the engine trims the excess or pads the final frame.
    fn synthesize(
        &self,
        frames: &SynthesisFrames<'_>,
        sample_rate: u32,
    ) -> Result<Vec<f32>, VocoderError>;
}
