//! Syllable → sample index with lazy analysis.

use std::collections::HashMap;
use std::sync::Arc;

use canto_ir::{Analysis, CachedAnalysis, SampleKey, Vocoder, VoicebankEntry};
use slotmap::SlotMap;
use tracing::{info, warn};

use crate::analysis_cache::AnalysisCache;
use crate::error::{AnalysisError, EngineError, LookupError};
use crate::source::SampleSource;

/// A loaded voicebank.
///
/// Every distinct sample file gets one [`SampleKey`]; syllables that share a
/// file share its analysis. Lookups take `&self`, so one index serves all
/// render threads.
pub struct VoicebankIndex {
    /// Entries in configuration order, with their sample keys
    entries: Vec<(VoicebankEntry, SampleKey)>,
    by_syllable: HashMap<String, usize>,
    samples: SlotMap<SampleKey, String>,
    cache: AnalysisCache,
    source: Arc<dyn SampleSource>,
    vocoder: Arc<dyn Vocoder>,
}

impl VoicebankIndex {
    /// Build an index. When a syllable repeats, the first entry wins.
    pub fn new(
        entries: impl IntoIterator<Item = VoicebankEntry>,
        source: Arc<dyn SampleSource>,
        vocoder: Arc<dyn Vocoder>,
    ) -> Self {
        let mut index = Self {
            entries: Vec::new(),
            by_syllable: HashMap::new(),
            samples: SlotMap::with_key(),
            cache: AnalysisCache::new(),
            source,
            vocoder,
        };
        let mut keys: HashMap<String, SampleKey> = HashMap::new();

        for entry in entries {
            if index.by_syllable.contains_key(&entry.syllable) {
                warn!("duplicate syllable {:?} ignored", entry.syllable);
                continue;
            }
            let key = match keys.get(&entry.sample_path) {
                Some(&key) => key,
                None => {
                    let key = index.samples.insert(entry.sample_path.clone());
                    index.cache.register(key);
                    keys.insert(entry.sample_path.clone(), key);
                    key
                }
            };
            index.by_syllable.insert(entry.syllable.clone(), index.entries.len());
            index.entries.push((entry, key));
        }

        info!(
            "voicebank has {} syllables over {} samples",
            index.entries.len(),
            index.samples.len()
        );
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Syllables in configuration order.
    pub fn syllables(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(e, _)| e.syllable.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &VoicebankEntry> {
        self.entries.iter().map(|(e, _)| e)
    }

    /// Number of distinct sample files.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Exact-match lookup.
    pub fn lookup(&self, syllable: &str) -> Result<&VoicebankEntry, LookupError> {
        self.lookup_keyed(syllable).map(|(entry, _)| entry)
    }

    /// Sample key of a syllable's sample file.
    pub fn sample_key(&self, syllable: &str) -> Result<SampleKey, LookupError> {
        self.lookup_keyed(syllable).map(|(_, key)| key)
    }

    fn lookup_keyed(&self, syllable: &str) -> Result<(&VoicebankEntry, SampleKey), LookupError> {
        self.by_syllable
            .get(syllable)
            .map(|&i| {
                let (entry, key) = &self.entries[i];
                (entry, *key)
            })
            .ok_or_else(|| LookupError {
                syllable: syllable.to_owned(),
            })
    }

    /// Entry and analysis for a syllable, analysing its sample on first use.
    pub fn resolve(&self, syllable: &str) -> Result<(&VoicebankEntry, Arc<Analysis>), EngineError> {
        let (entry, key) = self.lookup_keyed(syllable)?;
        Ok((entry, self.analysis(key)?))
    }

    /// Analysis of a sample file, computed on first use.
    pub fn analysis(&self, key: SampleKey) -> Result<Arc<Analysis>, AnalysisError> {
        let sample = self.samples.get(key).map_or("", String::as_str);
        self.cache
            .get_or_analyze(key, sample, self.source.as_ref(), self.vocoder.as_ref())
    }

    /// Sample paths the source cannot find.
    pub fn missing_samples(&self) -> Vec<&str> {
        self.samples
            .values()
            .map(String::as_str)
            .filter(|path| self.source.fingerprint(path).is_none())
            .collect()
    }

    pub fn vocoder(&self) -> &dyn Vocoder {
        self.vocoder.as_ref()
    }

    /// Offer persisted analyses; see [`AnalysisCache::preload`].
    pub fn preload(&mut self, records: impl IntoIterator<Item = CachedAnalysis>) {
        self.cache.preload(records);
    }

    /// Analyses to persist; see [`AnalysisCache::snapshot`].
    pub fn snapshot(&self) -> Vec<CachedAnalysis> {
        let samples = self.samples.iter().map(|(key, path)| (key, path.as_str()));
        self.cache.snapshot(samples, self.source.as_ref())
    }

    /// Number of vocoder analyses run so far.
    pub fn analyses_run(&self) -> usize {
        self.cache.analyses_run()
    }
}
