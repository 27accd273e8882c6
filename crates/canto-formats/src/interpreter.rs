//! MML interpreter: tokens → per-track events.
//!
//! Every track owns a [`TrackState`] cloned from [`TrackState::DEFAULT`] the
//! first time its name is referenced. Property commands only ever touch the
//! current track's state.

use std::collections::HashMap;

use canto_ir::{key_offset, semitone, Event, Project, GLOBAL_TRACK};
use tracing::debug;

use crate::tokenizer::{Token, TokenKind, Tokenizer};
use crate::{ParseError, Property, PropertyError, ScoreError};

/// Interpretation state of one track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackState {
    /// Current octave (unbounded)
    pub octave: i32,
    /// Default length denominator (4 = quarter note)
    pub length: u32,
    /// Tempo in quarter notes per minute
    pub bpm: u32,
    /// Lyrics from the last lyric comment
    pub lyrics: Vec<String>,
    /// Index of the next syllable, clamped to the last one
    pub lyrics_cursor: usize,
}

impl TrackState {
    /// Template every new track starts from.
    pub const DEFAULT: TrackState = TrackState {
        octave: 4,
        length: 4,
        bpm: 120,
        lyrics: Vec::new(),
        lyrics_cursor: 0,
    };

    /// Duration in seconds of a note with length `denominator`.
    pub fn duration(&self, denominator: u32) -> f64 {
        (60.0 / self.bpm as f64) * (4.0 / denominator as f64)
    }

    /// Take the syllable for the next note, if lyrics are set.
    ///
    /// The cursor stops at the last syllable, which then repeats.
    pub fn next_syllable(&mut self) -> Option<&str> {
        let last = self.lyrics.len().checked_sub(1)?;
        let index = self.lyrics_cursor.min(last);
        self.lyrics_cursor = (index + 1).min(last);
        Some(&self.lyrics[index])
    }

    /// Replace the lyrics and rewind the cursor.
    pub fn set_lyrics(&mut self, text: &str) {
        self.lyrics = text.split_whitespace().map(str::to_owned).collect();
        self.lyrics_cursor = 0;
    }
}

impl Default for TrackState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Interpret a score into a fresh [`Project`].
pub fn interpret(text: &str) -> Result<Project, ScoreError> {
    Interpreter::new().run(text)
}

/// Single-use interpreter. Owns the current-track cursor and all per-track
/// state for one run.
pub struct Interpreter {
    states: HashMap<String, TrackState>,
    project: Project,
    current: String,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            project: Project::new(),
            current: GLOBAL_TRACK.to_owned(),
        }
    }

    /// Execute every token of a score, stopping at the first error.
    pub fn run(mut self, text: &str) -> Result<Project, ScoreError> {
        let mut count = 0;
        for token in Tokenizer::new(text) {
            self.execute(&token?)?;
            count += 1;
        }
        debug!("interpreted {} tokens", count);
        Ok(self.project)
    }

    /// Execute a single token against the current track.
    pub fn execute(&mut self, token: &Token<'_>) -> Result<(), ScoreError> {
        match token.kind {
            TokenKind::Note => self.note(token),
            TokenKind::Rest => self.rest(token),
            TokenKind::Prop => self.prop(token),
            TokenKind::OctaveStep => self.octave_step(token),
            TokenKind::LyricComment => {
                self.current_state().set_lyrics(token.part(0));
                Ok(())
            }
            TokenKind::TrackMarker => {
                self.select_track(token.part(0));
                Ok(())
            }
            TokenKind::Comment | TokenKind::Ignore => Ok(()),
        }
    }

    fn current_state(&mut self) -> &mut TrackState {
        self.states
            .entry(self.current.clone())
            .or_insert_with(|| TrackState::DEFAULT)
    }

    fn select_track(&mut self, name: &str) {
        if !self.states.contains_key(name) {
            debug!("new track {}", name);
            self.states.insert(name.to_owned(), TrackState::DEFAULT);
        }
        self.project.track_mut(name);
        self.current = name.to_owned();
    }

    fn note(&mut self, token: &Token<'_>) -> Result<(), ScoreError> {
        let letter = token.part(0).chars().next().unwrap_or('?');
        let accidental = match token.part(1) {
            "+" | "#" => 1,
            "-" => -1,
            _ => 0,
        };
        let explicit_octave = match token.part(3) {
            "" => None,
            text => Some(parse_int::<i32>(Property::Octave, text, token.offset)?),
        };
        let denominator = parse_length(token.part(2), token.offset)?;

        if key_offset(letter).is_none() {
            return Err(stray(token, letter).into());
        }

        let state = self.current_state();
        let octave = explicit_octave.unwrap_or(state.octave);
        let duration = state.duration(denominator.unwrap_or(state.length));
        let pitch = semitone(letter, accidental, octave).ok_or_else(|| PropertyError {
            property: Property::Octave,
            text: octave.to_string(),
            offset: token.offset,
        })?;

        let mut event = Event::note(pitch, duration);
        if let Some(syllable) = state.next_syllable() {
            event = event.with_syllable(syllable);
        }
        self.push(event);
        Ok(())
    }

    fn octave_step(&mut self, token: &Token<'_>) -> Result<(), ScoreError> {
        let step = if token.part(0) == ">" { 1 } else { -1 };
        let state = self.current_state();
        state.octave = state.octave.checked_add(step).ok_or_else(|| PropertyError {
            property: Property::Octave,
            text: token.span.to_owned(),
            offset: token.offset,
        })?;
        Ok(())
    }

    fn rest(&mut self, token: &Token<'_>) -> Result<(), ScoreError> {
        let denominator = parse_length(token.part(0), token.offset)?;
        let state = self.current_state();
        let duration = state.duration(denominator.unwrap_or(state.length));
        self.push(Event::rest(duration));
        Ok(())
    }

    fn prop(&mut self, token: &Token<'_>) -> Result<(), ScoreError> {
        let Some(property) = Property::from_marker(token.part(0)) else {
            return Err(stray(token, token.span.chars().next().unwrap_or('?')).into());
        };
        let text = token.part(1);
        match property {
            Property::Octave => {
                let octave = parse_int::<i32>(property, text, token.offset)?;
                self.current_state().octave = octave;
            }
            Property::Length => {
                let length = parse_positive(property, text, token.offset)?;
                self.current_state().length = length;
            }
            Property::Tempo => {
                let bpm = parse_positive(property, text, token.offset)?;
                self.current_state().bpm = bpm;
            }
        }
        Ok(())
    }

    fn push(&mut self, event: Event) {
        self.project.track_mut(&self.current).events.push(event);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Error for a token that was not produced by [`Tokenizer`].
fn stray(token: &Token<'_>, character: char) -> ParseError {
    ParseError {
        offset: token.offset,
        ..ParseError::at(token.span, 0, character)
    }
}

fn parse_int<T: std::str::FromStr>(
    property: Property,
    text: &str,
    offset: usize,
) -> Result<T, PropertyError> {
    text.parse().map_err(|_| PropertyError {
        property,
        text: text.to_owned(),
        offset,
    })
}

fn parse_positive(property: Property, text: &str, offset: usize) -> Result<u32, PropertyError> {
    match parse_int::<u32>(property, text, offset)? {
        0 => Err(PropertyError {
            property,
            text: text.to_owned(),
            offset,
        }),
        value => Ok(value),
    }
}

/// Explicit note length, `None` when the token omits it.
fn parse_length(text: &str, offset: usize) -> Result<Option<u32>, PropertyError> {
    if text.is_empty() {
        return Ok(None);
    }
    parse_positive(Property::Length, text, offset).map(Some)
}
