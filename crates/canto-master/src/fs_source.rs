//! Voicebank samples on disk.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use canto_engine::{SampleSource, SourceError};
use canto_formats::load_wav_file;
use canto_ir::{Fingerprint, Waveform};

/// WAV samples relative to a voicebank directory.
///
/// Sample paths may use `\` separators, as `oto.ini` files written on
/// Windows do.
pub struct FsSampleSource {
    root: PathBuf,
}

impl FsSampleSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_owned(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.replace('\\', "/"))
    }
}

impl SampleSource for FsSampleSource {
    fn load(&self, path: &str) -> Result<Waveform, SourceError> {
        let file = self.resolve(path);
        load_wav_file(&file).map_err(|e| SourceError::new(format!("{}: {}", file.display(), e)))
    }

    fn fingerprint(&self, path: &str) -> Option<Fingerprint> {
        let meta = std::fs::metadata(self.resolve(path)).ok()?;
        if !meta.is_file() {
            return None;
        }
        let modified = meta
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |since| since.as_nanos());
        Some(Fingerprint {
            len: meta.len(),
            modified,
        })
    }
}

#[cfg(test)]
mod tests {
    use canto_formats::write_wav_file;

    use super::*;

    #[test]
    fn loads_and_fingerprints_nested_samples() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let waveform = Waveform::new(vec![0.0, 0.5, -0.5, 0.25], 8000);
        write_wav_file(&dir.path().join("sub/ka.wav"), &waveform).unwrap();

        let source = FsSampleSource::new(dir.path());
        let loaded = source.load("sub\\ka.wav").unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.sample_rate(), 8000);

        let print = source.fingerprint("sub/ka.wav").unwrap();
        assert_eq!(print, source.fingerprint("sub\\ka.wav").unwrap());
        assert_eq!(print.len, std::fs::metadata(dir.path().join("sub/ka.wav")).unwrap().len());
    }

    #[test]
    fn missing_sample_has_no_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsSampleSource::new(dir.path());
        assert!(source.fingerprint("nope.wav").is_none());
        assert!(source.fingerprint("").is_none());
        let err = source.load("nope.wav").unwrap_err();
        assert!(err.to_string().contains("nope.wav"));
    }
}
