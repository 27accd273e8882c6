//! Voicebank entry types.

slotmap::new_key_type! {
    /// Key for referencing a sample file in the voicebank index.
    pub struct SampleKey;
}

/// Timing metadata for one syllable of a voicebank.
///
/// All times are in seconds and relative to the start of the sample file
/// unless noted otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct VoicebankEntry {
    /// Syllable (alias) this entry is looked up by
    pub syllable: String,
    /// Path of the sample file, relative to the voicebank directory
    pub sample_path: String,
    /// Unused region at the start of the sample
    pub onset_offset: f64,
    /// End of the attack region, measured from the onset. Never looped.
    pub consonant_boundary: f64,
    /// How far the note reaches into the previous note
    pub preutterance: f64,
    /// How long the previous note keeps sounding into this one
    pub overlap: f64,
    /// Unused region at the end of the sample. Negative values measure the
    /// voiced region from the onset instead (UTAU convention).
    pub cutoff_from_end: f64,
    /// Pitch the sample was recorded at (MIDI numbering)
    pub recorded_pitch: i32,
}

impl VoicebankEntry {
    /// Create an entry with zeroed timings.
    pub fn new(syllable: &str, sample_path: &str, recorded_pitch: i32) -> Self {
        Self {
            syllable: syllable.to_owned(),
            sample_path: sample_path.to_owned(),
            onset_offset: 0.0,
            consonant_boundary: 0.0,
            preutterance: 0.0,
            overlap: 0.0,
            cutoff_from_end: 0.0,
            recorded_pitch,
        }
    }

    /// Voiced region `(start, end)` in seconds for a sample of
    /// `total_length` seconds.
    pub fn voiced_region(&self, total_length: f64) -> (f64, f64) {
        let start = self.onset_offset.max(0.0);
        let end = if self.cutoff_from_end < 0.0 {
            start - self.cutoff_from_end
        } else {
            total_length - self.cutoff_from_end
        };
        (start, end.min(total_length))
    }
}
