//! Headless controller for the canto singing synthesizer.
//!
//! Wires voicebank, score, analysis cache and renderer together behind one
//! API that the CLI drives.

mod config;
mod fs_source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use canto_engine::{EngineError, Renderer, VoicebankIndex};
use canto_formats::{OtoError, ScoreError, OTO_FILE_NAME};
use canto_vocoder::SpectralVocoder;
use tracing::{info, warn};

// Re-export common types so callers don't need every crate directly.
pub use canto_formats::FormatError;
pub use canto_ir::{Project, Vocoder, Waveform};
pub use config::{AnalysisConfig, Config, ConfigError, RenderConfig, VoicebankConfig};
pub use fs_source::FsSampleSource;

/// Error type for controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("cannot read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Oto(#[from] OtoError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("missing sample files: {}", .0.join(", "))]
    MissingSamples(Vec<String>),
    #[error("no voicebank is open")]
    NoVoicebank,
}

struct OpenVoicebank {
    dir: PathBuf,
    index: VoicebankIndex,
}

/// Headless synthesizer controller: owns the configuration, the vocoder and
/// the open voicebank.
pub struct Controller {
    config: Config,
    vocoder: Arc<dyn Vocoder>,
    voicebank: Option<OpenVoicebank>,
}

impl Controller {
    /// Controller using the built-in spectral vocoder.
    pub fn new(config: Config) -> Self {
        let vocoder = SpectralVocoder::new(config.analysis.frame_period());
        Self {
            config,
            vocoder: Arc::new(vocoder),
            voicebank: None,
        }
    }

    /// Replace the vocoder. Takes effect for the next opened voicebank.
    pub fn with_vocoder(mut self, vocoder: Arc<dyn Vocoder>) -> Self {
        self.vocoder = vocoder;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Voicebank ---

    /// Open the voicebank in `dir`: parse its `oto.ini`, check its samples
    /// and offer its persisted analyses.
    pub fn open_voicebank(&mut self, dir: &Path) -> Result<&VoicebankIndex, ControllerError> {
        let oto = dir.join(OTO_FILE_NAME);
        let text = read_text(&oto)?;
        let entries = canto_formats::parse_oto(&text, self.config.voicebank.default_pitch()?)?;
        let source = FsSampleSource::new(dir);
        let mut index = VoicebankIndex::new(entries, Arc::new(source), Arc::clone(&self.vocoder));

        if self.config.voicebank.check_samples {
            let missing = index.missing_samples();
            if !missing.is_empty() {
                return Err(ControllerError::MissingSamples(
                    missing.into_iter().map(str::to_owned).collect(),
                ));
            }
        }
        if self.config.analysis.cache {
            index.preload(canto_formats::load_cache_file(dir));
        }

        info!("opened voicebank {} ({} syllables)", dir.display(), index.len());
        let open = self.voicebank.insert(OpenVoicebank {
            dir: dir.to_owned(),
            index,
        });
        Ok(&open.index)
    }

    pub fn voicebank(&self) -> Option<&VoicebankIndex> {
        self.voicebank.as_ref().map(|open| &open.index)
    }

    /// Persist the analyses of the open voicebank. Returns the number of
    /// records written; does nothing when caching is disabled.
    pub fn save_cache(&self) -> Result<usize, ControllerError> {
        let open = self.voicebank.as_ref().ok_or(ControllerError::NoVoicebank)?;
        if !self.config.analysis.cache {
            return Ok(0);
        }
        let records = open.index.snapshot();
        canto_formats::save_cache_file(&open.dir, &records)?;
        Ok(records.len())
    }

    // --- Score ---

    pub fn load_score(&self, path: &Path) -> Result<Project, ControllerError> {
        let text = read_text(path)?;
        let project = canto_formats::interpret(&text)?;
        info!(
            "loaded score {} ({} tracks, {} events)",
            path.display(),
            project.tracks.len(),
            project.event_count()
        );
        Ok(project)
    }

    // --- Rendering ---

    pub fn render(&self, project: &Project) -> Result<Waveform, ControllerError> {
        let index = self.voicebank().ok_or(ControllerError::NoVoicebank)?;
        let settings = self.config.render.settings();
        let waveform = Renderer::new(index, &settings).render(project)?;
        info!(
            "rendered {:.2} s ({} analyses run)",
            waveform.duration(),
            index.analyses_run()
        );
        Ok(waveform)
    }

    /// Render a score file to a WAV file, then update the analysis cache.
    pub fn render_to_file(&self, score: &Path, out: &Path) -> Result<Waveform, ControllerError> {
        let project = self.load_score(score)?;
        let waveform = self.render(&project)?;
        canto_formats::write_wav_file(out, &waveform)?;
        info!("wrote {}", out.display());

        // Cache failures never fail a finished render.
        if let Err(e) = self.save_cache() {
            warn!("could not save analysis cache: {}", e);
        }
        Ok(waveform)
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn read_text(path: &Path) -> Result<String, ControllerError> {
    std::fs::read_to_string(path).map_err(|source| ControllerError::Read {
        path: path.to_owned(),
        source,
    })
}
