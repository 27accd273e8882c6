//! Mono f32 waveform buffer.

/// A mono f32 waveform with its sample rate.
///
/// Samples are nominally in [-1, 1]; mixing may exceed that range until
/// [`Waveform::hard_clip`] is applied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Wrap existing samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Create digital silence of `len` samples.
    pub fn silent(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sum `source` into this buffer sample by sample, growing this buffer
    /// with silence if `source` is longer.
    pub fn mix_from(&mut self, source: &Waveform) {
        if source.len() > self.len() {
            self.samples.resize(source.len(), 0.0);
        }
        for (dst, src) in self.samples.iter_mut().zip(&source.samples) {
            *dst += src;
        }
    }

    /// Clamp every sample to [-1, 1].
    pub fn hard_clip(&mut self) {
        for s in &mut self.samples {
            *s = s.clamp(-1.0, 1.0);
        }
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0, |peak, s| peak.max(s.abs()))
    }
}
