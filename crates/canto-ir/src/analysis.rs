//! Vocoder analysis of a sample file.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Frame-wise vocoder parameters of one sample file.
///
/// All three tracks have one entry per frame; frame `i` is centred at
/// `i * frame_period` seconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Fundamental frequency per frame in Hz (0 = unvoiced)
    pub f0: Vec<f64>,
    /// Spectral envelope per frame
    pub spectral_envelope: Vec<Vec<f64>>,
    /// Aperiodicity per frame
    pub aperiodicity: Vec<Vec<f64>>,
    /// Seconds between frames
    pub frame_period: f64,
    /// Rate of the analysed audio in Hz; envelope bins span 0 to half of it
    pub sample_rate: u32,
}

impl Analysis {
    /// Number of analysis frames.
    pub fn frames(&self) -> usize {
        self.f0.len()
    }

    /// Length of the analysed audio in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 * self.frame_period
    }

    /// Convert a time in seconds to the nearest frame index (unclamped).
    pub fn frame_at(&self, seconds: f64) -> usize {
        if self.frame_period <= 0.0 {
            return 0;
        }
        (seconds.max(0.0) / self.frame_period).round() as usize
    }

    /// True if at least one frame carries a pitch.
    pub fn is_voiced(&self) -> bool {
        self.f0.iter().any(|&f| f > 0.0)
    }

    /// True if all frame tracks have the same length and the timing is
    /// usable.
    pub fn is_consistent(&self) -> bool {
        self.spectral_envelope.len() == self.f0.len()
            && self.aperiodicity.len() == self.f0.len()
            && self.frame_period > 0.0
            && self.sample_rate > 0
    }
}

/// Identity of a sample file's contents, used to validate persisted
/// analyses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// File length in bytes
    pub len: u64,
    /// Modification time in nanoseconds since the Unix epoch
    pub modified: u128,
}

/// A persisted analysis together with the identity it was computed from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedAnalysis {
    /// Sample path, relative to the voicebank directory
    pub sample: String,
    pub fingerprint: Fingerprint,
    pub analysis: Arc<Analysis>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(f0: &[f64]) -> Analysis {
        Analysis {
            f0: f0.to_vec(),
            spectral_envelope: vec![vec![1.0; 4]; f0.len()],
            aperiodicity: vec![vec![0.0; 4]; f0.len()],
            frame_period: 0.005,
            sample_rate: 16000,
        }
    }

    #[test]
    fn frame_at_rounds_to_nearest() {
        let a = analysis(&[100.0; 10]);
        assert_eq!(a.frame_at(0.0), 0);
        assert_eq!(a.frame_at(0.012), 2);
        assert_eq!(a.frame_at(0.013), 3);
        assert_eq!(a.frame_at(-1.0), 0);
        assert!((a.duration() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn voiced_requires_nonzero_f0() {
        assert!(!analysis(&[0.0, 0.0]).is_voiced());
        assert!(analysis(&[0.0, 220.0]).is_voiced());
        assert!(analysis(&[1.0]).is_consistent());
    }

    #[test]
    fn consistency_checks_tracks_and_timing() {
        let mut a = analysis(&[100.0, 110.0]);
        a.aperiodicity.pop();
        assert!(!a.is_consistent());

        let mut a = analysis(&[100.0]);
        a.sample_rate = 0;
        assert!(!a.is_consistent());

        let mut a = analysis(&[100.0]);
        a.frame_period = 0.0;
        assert!(!a.is_consistent());
    }
}
