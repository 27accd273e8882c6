//! Format readers and writers for canto.
//!
//! Parses MML scores into the IR, reads UTAU `oto.ini` voicebank
//! configurations, and handles WAV and analysis cache files.

mod cache_file;
mod interpreter;
mod oto;
mod tokenizer;
mod wav_format;

use std::fmt;

pub use cache_file::{load_cache_file, read_cache, save_cache_file, write_cache, CACHE_FILE_NAME};
pub use interpreter::{interpret, Interpreter, TrackState};
pub use oto::{parse_oto, OTO_FILE_NAME};
pub use tokenizer::{tokenize, Token, TokenKind, Tokenizer};
pub use wav_format::{load_wav, load_wav_file, waveform_to_wav, write_wav, write_wav_file};

/// An invalid character in a score.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid character {character:?} at line {line}, column {column} (offset {offset})")]
pub struct ParseError {
    pub character: char,
    /// Byte offset into the score
    pub offset: usize,
    /// 1-based line
    pub line: usize,
    /// 1-based column, in characters
    pub column: usize,
}

impl ParseError {
    pub(crate) fn at(text: &str, offset: usize, character: char) -> Self {
        let before = &text[..offset];
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            character,
            offset,
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
        }
    }
}

/// A property command of the score language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Property {
    Octave,
    Length,
    Tempo,
}

impl Property {
    pub(crate) fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "o" => Some(Property::Octave),
            "l" => Some(Property::Length),
            "t" => Some(Property::Tempo),
            _ => None,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Property::Octave => "octave",
            Property::Length => "length",
            Property::Tempo => "tempo",
        })
    }
}

/// A malformed value given to a property command.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid {property} value {text:?} at offset {offset}")]
pub struct PropertyError {
    pub property: Property,
    /// The offending value text
    pub text: String,
    /// Byte offset of the command in the score
    pub offset: usize,
}

/// Error type for score interpretation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// A malformed line in a voicebank configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("oto.ini line {line_number}: {reason}: {line:?}")]
pub struct OtoError {
    /// 1-based line number
    pub line_number: usize,
    pub line: String,
    pub reason: String,
}

/// Error type for binary file formats.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("cache file error: {0}")]
    Cache(#[from] bincode::Error),
    #[error("cache file version {found} (expected {expected})")]
    CacheVersion { found: u32, expected: u32 },
}
