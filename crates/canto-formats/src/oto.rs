//! UTAU `oto.ini` voicebank configuration reader.
//!
//! Each property line maps a sample file to one syllable:
//!
//! ```text
//! ka.wav=ka,20,80,-300,60,15,A4
//! ```
//!
//! Fields after the alias are offset, consonant, cutoff, preutterance and
//! overlap in milliseconds, then an optional recorded pitch.

use std::collections::HashSet;
use std::path::Path;

use canto_ir::{parse_spn, VoicebankEntry};
use tracing::warn;

use crate::OtoError;

/// Name of the configuration file inside a voicebank directory.
pub const OTO_FILE_NAME: &str = "oto.ini";

const TIMING_FIELDS: [&str; 5] = ["offset", "consonant", "cutoff", "preutterance", "overlap"];

/// Parse a whole `oto.ini`.
///
/// Entries are returned in file order. When an alias is defined more than
/// once, the first definition wins and later ones are dropped with a
/// warning.
pub fn parse_oto(text: &str, default_pitch: i32) -> Result<Vec<VoicebankEntry>, OtoError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || is_section(line) {
            continue;
        }

        let entry = parse_line(line, default_pitch).map_err(|reason| OtoError {
            line_number: index + 1,
            line: raw.to_owned(),
            reason,
        })?;

        if seen.insert(entry.syllable.clone()) {
            entries.push(entry);
        } else {
            warn!("oto.ini line {}: duplicate alias {:?} ignored", index + 1, entry.syllable);
        }
    }

    Ok(entries)
}

fn is_section(line: &str) -> bool {
    line.len() > 2 && line.starts_with('[') && line.ends_with(']')
}

fn parse_line(line: &str, default_pitch: i32) -> Result<VoicebankEntry, String> {
    let (file, params) = line
        .split_once('=')
        .ok_or_else(|| "expected file=alias,offset,consonant,cutoff,preutterance,overlap".to_owned())?;
    let file = file.trim();
    if file.is_empty() {
        return Err("missing sample file".into());
    }

    let params: Vec<&str> = params.split(',').map(str::trim).collect();
    if params.len() < 6 {
        return Err(format!("expected at least 6 fields after '=', found {}", params.len()));
    }

    let mut millis = [0.0; 5];
    for ((value, name), text) in millis.iter_mut().zip(TIMING_FIELDS).zip(&params[1..6]) {
        *value = parse_millis(text).ok_or_else(|| format!("invalid {} {:?}", name, text))?;
    }

    let recorded_pitch = match params.get(6).copied().filter(|p| !p.is_empty()) {
        Some(text) => parse_spn(text).ok_or_else(|| format!("invalid pitch {:?}", text))?,
        None => default_pitch,
    };

    let syllable = match params[0] {
        "" => file_stem(file),
        alias => alias,
    };

    let [offset, consonant, cutoff, preutterance, overlap] = millis.map(|ms| ms / 1000.0);
    Ok(VoicebankEntry {
        onset_offset: offset,
        consonant_boundary: consonant,
        cutoff_from_end: cutoff,
        preutterance,
        overlap,
        ..VoicebankEntry::new(syllable, file, recorded_pitch)
    })
}

/// Blank timing fields count as zero.
fn parse_millis(text: &str) -> Option<f64> {
    if text.is_empty() {
        return Some(0.0);
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn file_stem(file: &str) -> &str {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
}
