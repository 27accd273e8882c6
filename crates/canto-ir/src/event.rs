//! Timed events emitted by the score interpreter.

/// A note or rest on a track.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Sing a syllable at a pitch
    Note {
        /// Absolute semitone (MIDI numbering, middle C = 60)
        pitch: i32,
        /// Duration in seconds
        duration: f64,
        /// Lyric attached by the interpreter, if any
        syllable: Option<String>,
    },
    /// Silence
    Rest {
        /// Duration in seconds
        duration: f64,
    },
}

impl Event {
    /// Create a note without a syllable.
    pub fn note(pitch: i32, duration: f64) -> Self {
        Self::Note {
            pitch,
            duration,
            syllable: None,
        }
    }

    /// Create a rest.
    pub fn rest(duration: f64) -> Self {
        Self::Rest { duration }
    }

    /// Attach a syllable (no-op for rests).
    pub fn with_syllable(mut self, text: &str) -> Self {
        if let Self::Note { syllable, .. } = &mut self {
            *syllable = Some(text.to_owned());
        }
        self
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        match self {
            Self::Note { duration, .. } | Self::Rest { duration } => *duration,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, Self::Rest { .. })
    }

    /// Exact number of samples this event occupies at `sample_rate`.
    pub fn sample_count(&self, sample_rate: u32) -> usize {
        (self.duration() * sample_rate as f64).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_rounds() {
        assert_eq!(Event::rest(0.5).sample_count(44100), 22050);
        assert_eq!(Event::rest(1.0 / 3.0).sample_count(1000), 333);
        assert_eq!(Event::note(60, 0.0016).sample_count(1000), 2);
    }

    #[test]
    fn syllable_only_attaches_to_notes() {
        let note = Event::note(60, 0.5).with_syllable("ka");
        assert_eq!(
            note,
            Event::Note {
                pitch: 60,
                duration: 0.5,
                syllable: Some("ka".into())
            }
        );
        assert_eq!(Event::rest(0.5).with_syllable("ka"), Event::rest(0.5));
    }
}
