//! Where sample audio comes from.

use std::collections::HashMap;

use canto_ir::{Fingerprint, Waveform};

use crate::error::SourceError;

/// Provider of voicebank sample audio, addressed by the sample path from
/// the voicebank configuration.
pub trait SampleSource: Send + Sync {
    /// Load and decode a sample file.
    fn load(&self, path: &str) -> Result<Waveform, SourceError>;

    /// Identity of the sample file's current contents, `None` if it does
    /// not exist.
    fn fingerprint(&self, path: &str) -> Option<Fingerprint>;
}

/// Samples held in memory.
///
/// Every sample gets a fingerprint derived from its length and a revision
/// that [`MemorySampleSource::insert`] bumps on replacement.
#[derive(Default)]
pub struct MemorySampleSource {
    samples: HashMap<String, (Waveform, u128)>,
}

impl MemorySampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a sample.
    pub fn insert(&mut self, path: &str, waveform: Waveform) {
        let revision = self.samples.get(path).map_or(0, |(_, r)| r + 1);
        self.samples.insert(path.to_owned(), (waveform, revision));
    }

    pub fn with(mut self, path: &str, waveform: Waveform) -> Self {
        self.insert(path, waveform);
        self
    }
}

impl SampleSource for MemorySampleSource {
    fn load(&self, path: &str) -> Result<Waveform, SourceError> {
        self.samples
            .get(path)
            .map(|(w, _)| w.clone())
            .ok_or_else(|| SourceError::new(format!("no sample named {}", path)))
    }

    fn fingerprint(&self, path: &str) -> Option<Fingerprint> {
        self.samples.get(path).map(|(w, revision)| Fingerprint {
            len: w.len() as u64,
            modified: *revision,
        })
    }
}
