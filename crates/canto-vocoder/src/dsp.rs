//! FFT and window helpers.

use std::f64::consts::PI;
use std::sync::Arc;

use canto_ir::VocoderError;
use realfft::num_complex::Complex64;
use realfft::{ComplexToReal, FftError, RealFftPlanner, RealToComplex};

/// Periodic Hann window of `len` samples.
pub(crate) fn hann(len: usize) -> Vec<f64> {
    (0..len)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f64 / len as f64).cos())
        .collect()
}

/// Offset of the true peak from the middle of three samples, in [-0.5, 0.5].
pub(crate) fn parabolic_offset(prev: f64, peak: f64, next: f64) -> f64 {
    let denom = prev - 2.0 * peak + next;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (0.5 * (prev - next) / denom).clamp(-0.5, 0.5)
}

/// Forward and inverse real FFT plans of one size.
pub(crate) struct FftPair {
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
}

impl FftPair {
    pub fn new(planner: &mut RealFftPlanner<f64>, len: usize) -> Self {
        Self {
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        }
    }

    pub fn make_input(&self) -> Vec<f64> {
        self.forward.make_input_vec()
    }

    pub fn make_spectrum(&self) -> Vec<Complex64> {
        self.forward.make_output_vec()
    }

    /// Forward transform. `input` is clobbered.
    pub fn forward(&self, input: &mut [f64], output: &mut [Complex64]) -> Result<(), VocoderError> {
        self.forward.process(input, output).map_err(fft_error)
    }

    /// Unnormalized inverse transform: the output is scaled by the FFT size.
    pub fn inverse(&self, input: &mut [Complex64], output: &mut [f64]) -> Result<(), VocoderError> {
        // DC and Nyquist must be purely real.
        if let Some(first) = input.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = input.last_mut() {
            last.im = 0.0;
        }
        self.inverse.process(input, output).map_err(fft_error)
    }
}

fn fft_error(e: FftError) -> VocoderError {
    VocoderError::new(format!("FFT failed: {}", e))
}
