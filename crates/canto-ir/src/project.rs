//! Project structure: named tracks of events.

use crate::event::Event;

/// Name of the implicit track that collects events emitted before any
/// track marker.
pub const GLOBAL_TRACK: &str = "global";

/// A complete song: tracks in first-reference order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Project {
    /// Tracks, all starting at time zero
    pub tracks: Vec<Track>,
}

/// A named, ordered sequence of events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Track {
    pub name: String,
    pub events: Vec<Event>,
}

impl Track {
    /// Create an empty track.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            events: Vec::new(),
        }
    }

    /// Sum of event durations in seconds.
    pub fn duration(&self) -> f64 {
        self.events.iter().map(Event::duration).sum()
    }

    /// Exact sample count of the rendered track at `sample_rate`.
    pub fn sample_count(&self, sample_rate: u32) -> usize {
        self.events.iter().map(|e| e.sample_count(sample_rate)).sum()
    }
}

impl Project {
    /// Create an empty project.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a track by name.
    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name == name)
    }

    /// Get a track by name, appending an empty one on first reference.
    pub fn track_mut(&mut self, name: &str) -> &mut Track {
        let index = match self.tracks.iter().position(|t| t.name == name) {
            Some(index) => index,
            None => {
                self.tracks.push(Track::new(name));
                self.tracks.len() - 1
            }
        };
        &mut self.tracks[index]
    }

    /// Events of a track, empty if the track does not exist.
    pub fn events(&self, name: &str) -> &[Event] {
        self.track(name).map(|t| t.events.as_slice()).unwrap_or(&[])
    }

    /// Track names in order.
    pub fn track_names(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|t| t.name.as_str())
    }

    /// Length of the longest track in seconds.
    pub fn duration(&self) -> f64 {
        self.tracks.iter().map(Track::duration).fold(0.0, f64::max)
    }

    /// Total number of events across all tracks.
    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(|t| t.events.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.event_count() == 0
    }
}
