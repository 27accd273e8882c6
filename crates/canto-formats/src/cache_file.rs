//! Persisted vocoder analyses.
//!
//! The file is a `u32` format version followed by the bincode encoding of
//! the cached records. Analyses are keyed by sample path and carry the
//! fingerprint of the file they were computed from; validating the
//! fingerprint is up to the reader.

use std::io::{Read, Write};
use std::path::Path;

use canto_ir::CachedAnalysis;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::FormatError;

/// Name of the cache file inside a voicebank directory.
pub const CACHE_FILE_NAME: &str = ".canto-cache";

const CACHE_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    records: Vec<CachedAnalysis>,
}

/// Encode cached analyses.
pub fn write_cache<W: Write>(w: W, records: &[CachedAnalysis]) -> Result<(), FormatError> {
    let file = CacheFile {
        version: CACHE_VERSION,
        records: records.to_vec(),
    };
    bincode::serialize_into(w, &file)?;
    Ok(())
}

/// Decode cached analyses written by [`write_cache`].
pub fn read_cache<R: Read>(mut r: R) -> Result<Vec<CachedAnalysis>, FormatError> {
    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes)?;

    // The version leads the encoding so it can be checked before the body.
    let version: u32 = bincode::deserialize(&bytes)?;
    if version != CACHE_VERSION {
        return Err(FormatError::CacheVersion {
            found: version,
            expected: CACHE_VERSION,
        });
    }

    let file: CacheFile = bincode::deserialize(&bytes)?;
    Ok(file.records)
}

/// Load the cache file of a voicebank directory.
///
/// Returns an empty list when the file is missing. An unreadable or
/// outdated file is logged and ignored so the cache gets rebuilt.
pub fn load_cache_file(dir: &Path) -> Vec<CachedAnalysis> {
    let path = dir.join(CACHE_FILE_NAME);
    let file = match std::fs::File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("ignoring cache file {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match read_cache(std::io::BufReader::new(file)) {
        Ok(records) => {
            info!("loaded {} cached analyses from {}", records.len(), path.display());
            records
        }
        Err(e) => {
            warn!("ignoring cache file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Write the cache file of a voicebank directory.
pub fn save_cache_file(dir: &Path, records: &[CachedAnalysis]) -> Result<(), FormatError> {
    let path = dir.join(CACHE_FILE_NAME);
    let mut w = std::io::BufWriter::new(std::fs::File::create(&path)?);
    write_cache(&mut w, records)?;
    w.flush()?;
    info!("saved {} cached analyses to {}", records.len(), path.display());
    Ok(())
}
