//! `canto.toml` configuration.

use std::path::{Path, PathBuf};

use canto_engine::{Alignment, LoopMode, RenderSettings};
use canto_ir::parse_spn;
use serde::{Deserialize, Serialize};

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read configuration {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for one canto session. Every field has a default, so an empty
/// file is a valid configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub render: RenderConfig,
    pub voicebank: VoicebankConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub sample_rate: u32,
    pub crossfade_ms: f64,
    pub loop_mode: LoopMode,
    /// `grid` or `preutterance`
    pub alignment: Alignment,
    /// Sung for notes without lyrics
    pub default_syllable: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let settings = RenderSettings::default();
        Self {
            sample_rate: settings.sample_rate,
            crossfade_ms: settings.crossfade * 1000.0,
            loop_mode: settings.loop_mode,
            alignment: settings.alignment,
            default_syllable: settings.default_syllable,
        }
    }
}

impl RenderConfig {
    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            sample_rate: self.sample_rate,
            crossfade: self.crossfade_ms / 1000.0,
            loop_mode: self.loop_mode,
            alignment: self.alignment,
            default_syllable: self.default_syllable.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoicebankConfig {
    /// Recorded pitch of `oto.ini` lines without a pitch field
    pub default_pitch: String,
    /// Fail on opening when sample files are missing
    pub check_samples: bool,
}

impl Default for VoicebankConfig {
    fn default() -> Self {
        Self {
            default_pitch: "C4".to_owned(),
            check_samples: true,
        }
    }
}

impl VoicebankConfig {
    /// The default pitch as a MIDI note number.
    pub fn default_pitch(&self) -> Result<i32, ConfigError> {
        parse_spn(&self.default_pitch).ok_or_else(|| ConfigError::Invalid {
            field: "voicebank.default_pitch",
            reason: format!("{:?} is not a pitch", self.default_pitch),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub frame_period_ms: f64,
    /// Persist analyses in the voicebank directory
    pub cache: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_period_ms: 5.0,
            cache: true,
        }
    }
}

impl AnalysisConfig {
    /// Frame period in seconds.
    pub fn frame_period(&self) -> f64 {
        self.frame_period_ms / 1000.0
    }
}

impl Config {
    pub const FILE_NAME: &'static str = "canto.toml";

    /// Parse and validate a configuration.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_owned(),
            })
        };
        if self.render.sample_rate == 0 {
            return invalid("render.sample_rate", "must be positive");
        }
        if !(self.render.crossfade_ms >= 0.0 && self.render.crossfade_ms.is_finite()) {
            return invalid("render.crossfade_ms", "must be zero or more");
        }
        if self.render.default_syllable.is_empty() {
            return invalid("render.default_syllable", "must not be empty");
        }
        if !(self.analysis.frame_period_ms > 0.0 && self.analysis.frame_period_ms.is_finite()) {
            return invalid("analysis.frame_period_ms", "must be positive");
        }
        self.voicebank.default_pitch()?;
        Ok(())
    }
}
