//! Analyse-once store of vocoder analyses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use canto_ir::{Analysis, CachedAnalysis, Fingerprint, SampleKey, Vocoder, VocoderError};
use slotmap::SecondaryMap;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, SourceError};
use crate::source::SampleSource;

type Cell = Mutex<Option<Arc<Analysis>>>;

/// Per-sample analysis cells.
///
/// Each registered sample owns one mutex-guarded cell. The first caller for
/// a sample holds the lock while the vocoder runs; concurrent callers for
/// the same sample wait and then share the stored result. Cells of
/// different samples never contend.
#[derive(Default)]
pub struct AnalysisCache {
    cells: SecondaryMap<SampleKey, Cell>,
    /// Persisted analyses by sample path, valid only for a matching fingerprint
    preloaded: HashMap<String, CachedAnalysis>,
    analyses_run: AtomicUsize,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the empty cell for `key`.
    pub fn register(&mut self, key: SampleKey) {
        self.cells.insert(key, Mutex::new(None));
    }

    /// Offer persisted analyses. Each is used at most once per sample, and
    /// only if the sample's fingerprint still matches.
    pub fn preload(&mut self, records: impl IntoIterator<Item = CachedAnalysis>) {
        for record in records {
            self.preloaded.insert(record.sample.clone(), record);
        }
    }

    /// Stored analysis of `key`, without triggering one.
    pub fn get(&self, key: SampleKey) -> Option<Arc<Analysis>> {
        let cell = self.cells.get(key)?;
        let slot = cell.lock().unwrap_or_else(PoisonError::into_inner);
        slot.clone()
    }

    /// Analysis of `key`, computed on first use.
    pub fn get_or_analyze(
        &self,
        key: SampleKey,
        sample: &str,
        source: &dyn SampleSource,
        vocoder: &dyn Vocoder,
    ) -> Result<Arc<Analysis>, AnalysisError> {
        let Some(cell) = self.cells.get(key) else {
            return Err(AnalysisError::Load {
                sample: sample.to_owned(),
                error: SourceError::new("sample is not registered"),
            });
        };

        let mut slot = cell.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(analysis) = slot.as_ref() {
            return Ok(Arc::clone(analysis));
        }

        let analysis = match self.reuse(sample, source) {
            Some(analysis) => analysis,
            None => Arc::new(self.analyze(sample, source, vocoder)?),
        };
        *slot = Some(Arc::clone(&analysis));
        Ok(analysis)
    }

    fn reuse(&self, sample: &str, source: &dyn SampleSource) -> Option<Arc<Analysis>> {
        let fingerprint = source.fingerprint(sample)?;
        let analysis = self.preloaded_for(sample, fingerprint)?;
        debug!("reusing cached analysis of {}", sample);
        Some(analysis)
    }

    /// Preloaded analysis of `sample`, if it was computed from the file
    /// with `fingerprint` and passes the checks a fresh analysis must.
    fn preloaded_for(&self, sample: &str, fingerprint: Fingerprint) -> Option<Arc<Analysis>> {
        let record = self.preloaded.get(sample)?;
        if record.fingerprint != fingerprint {
            debug!("cached analysis of {} is stale", sample);
            return None;
        }
        if !record.analysis.is_consistent() || !record.analysis.is_voiced() {
            warn!("ignoring malformed cached analysis of {}", sample);
            return None;
        }
        Some(Arc::clone(&record.analysis))
    }

    fn analyze(
        &self,
        sample: &str,
        source: &dyn SampleSource,
        vocoder: &dyn Vocoder,
    ) -> Result<Analysis, AnalysisError> {
        let waveform = source.load(sample).map_err(|error| AnalysisError::Load {
            sample: sample.to_owned(),
            error,
        })?;

        self.analyses_run.fetch_add(1, Ordering::Relaxed);
        let vocoder_error = |error: VocoderError| AnalysisError::Vocoder {
            sample: sample.to_owned(),
            error,
        };
        let analysis = vocoder
            .analyze(waveform.samples(), waveform.sample_rate())
            .map_err(vocoder_error)?;

        if !analysis.is_consistent() {
            return Err(vocoder_error(VocoderError::new("frame tracks differ in length")));
        }
        if !analysis.is_voiced() {
            return Err(AnalysisError::Unvoiced {
                sample: sample.to_owned(),
            });
        }

        info!("analysed {} ({} frames)", sample, analysis.frames());
        Ok(analysis)
    }

    /// Number of vocoder analyses run so far.
    pub fn analyses_run(&self) -> usize {
        self.analyses_run.load(Ordering::Relaxed)
    }

    /// Export analyses for persistence, stamped with current fingerprints.
    ///
    /// Includes every analysed sample plus preloaded records that are still
    /// valid. Samples that no longer exist are skipped.
    pub fn snapshot<'a>(
        &self,
        samples: impl IntoIterator<Item = (SampleKey, &'a str)>,
        source: &dyn SampleSource,
    ) -> Vec<CachedAnalysis> {
        samples
            .into_iter()
            .filter_map(|(key, sample)| {
                let fingerprint = source.fingerprint(sample)?;
                let analysis = match self.get(key) {
                    Some(analysis) => analysis,
                    None => self.preloaded_for(sample, fingerprint)?,
                };
                Some(CachedAnalysis {
                    sample: sample.to_owned(),
                    fingerprint,
                    analysis,
                })
            })
            .collect()
    }
}
