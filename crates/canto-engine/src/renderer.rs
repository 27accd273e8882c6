//! Track rendering and mixing.

use canto_ir::{Event, Project, Track, Waveform};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{EngineError, RenderError};
use crate::resampler::{Alignment, RenderSettings, Resampler};
use crate::voicebank::VoicebankIndex;

/// Lead-in of a segment under [`Alignment::Preutterance`], in samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lead {
    /// How far the segment starts before its beat
    pub preutterance: usize,
    /// How much of the lead-in the previous audio fades out over
    pub overlap: usize,
}

/// Renders projects against a voicebank.
pub struct Renderer<'a> {
    index: &'a VoicebankIndex,
    settings: &'a RenderSettings,
}

impl<'a> Renderer<'a> {
    pub fn new(index: &'a VoicebankIndex, settings: &'a RenderSettings) -> Self {
        Self { index, settings }
    }

    /// Render every track and mix them into one clipped waveform.
    ///
    /// Tracks render in parallel; any failing event aborts the whole render.
    pub fn render(&self, project: &Project) -> Result<Waveform, EngineError> {
        let tracks: Vec<Waveform> = project
            .tracks
            .par_iter()
            .filter(|track| !track.events.is_empty())
            .map(|track| self.render_track(track))
            .collect::<Result<_, _>>()?;
        Ok(mix(&tracks, self.settings.sample_rate))
    }

    /// Render one track. Its length is the sum of its events' sample counts.
    pub fn render_track(&self, track: &Track) -> Result<Waveform, EngineError> {
        let sample_rate = self.settings.sample_rate;
        let lengths: Vec<usize> = track.events.iter().map(|e| e.sample_count(sample_rate)).collect();
        let (fades, leads) = match self.settings.alignment {
            Alignment::Grid => (crossfades(&lengths, self.settings.crossfade_samples()), Vec::new()),
            Alignment::Preutterance => (Vec::new(), self.leads(track, &lengths)?),
        };
        let resampler = Resampler::new(self.index.vocoder(), self.settings);

        let segments: Vec<Vec<f32>> = track
            .events
            .par_iter()
            .enumerate()
            .map(|(i, event)| {
                let tail = fades.get(i).copied().unwrap_or(0);
                let head = leads.get(i).map_or(0, |lead| lead.preutterance);
                self.render_event(&resampler, track, i, event, head + lengths[i] + tail)
            })
            .collect::<Result<_, _>>()?;

        let samples = match self.settings.alignment {
            Alignment::Grid => join(&segments, &lengths, &fades),
            Alignment::Preutterance => overlay(&segments, &leads),
        };
        info!(
            "rendered track {} ({} events, {} samples)",
            track.name,
            track.events.len(),
            samples.len()
        );
        Ok(Waveform::new(samples, sample_rate))
    }

    /// Lead-ins of every event. A lead-in never reaches before the start of
    /// the track, and rests have none.
    fn leads(&self, track: &Track, lengths: &[usize]) -> Result<Vec<Lead>, EngineError> {
        let sample_rate = self.settings.sample_rate as f64;
        let to_samples = |seconds: f64| (seconds.max(0.0) * sample_rate).round() as usize;

        let mut leads = Vec::with_capacity(lengths.len());
        let mut start = 0;
        for (event, &len) in track.events.iter().zip(lengths) {
            let lead = match event {
                Event::Rest { .. } => Lead::default(),
                Event::Note { syllable, .. } => {
                    let entry = self.index.lookup(self.syllable(syllable))?;
                    let preutterance = to_samples(entry.preutterance).min(start);
                    Lead {
                        preutterance,
                        overlap: to_samples(entry.overlap).min(preutterance),
                    }
                }
            };
            leads.push(lead);
            start += len;
        }
        Ok(leads)
    }

    fn syllable<'s>(&'s self, syllable: &'s Option<String>) -> &'s str {
        syllable.as_deref().unwrap_or(&self.settings.default_syllable)
    }

    fn render_event(
        &self,
        resampler: &Resampler<'_>,
        track: &Track,
        index: usize,
        event: &Event,
        len: usize,
    ) -> Result<Vec<f32>, EngineError> {
        match event {
            Event::Rest { .. } => Ok(resampler.rest(len)),
            Event::Note {
                pitch, syllable, ..
            } => {
                let syllable = self.syllable(syllable);
                let (entry, analysis) = self.index.resolve(syllable)?;
                debug!("track {} event {}: {:?} at {}", track.name, index, syllable, pitch);
                resampler
                    .note(entry, &analysis, *pitch, len)
                    .map_err(|cause| {
                        RenderError {
                            track: track.name.clone(),
                            index,
                            cause,
                        }
                        .into()
                    })
            }
        }
    }
}

/// Crossfade length at each boundary between consecutive segments.
pub fn crossfades(lengths: &[usize], configured: usize) -> Vec<usize> {
    lengths
        .windows(2)
        .map(|pair| configured.min(pair[0]).min(pair[1]))
        .collect()
}

/// Join segments rendered with crossfade tails.
///
/// Segment `i` holds `lengths[i] + fades[i]` samples; its tail overlaps the
/// head of segment `i + 1` with a linear crossfade, so the result holds
/// exactly the sum of `lengths`.
pub fn join(segments: &[Vec<f32>], lengths: &[usize], fades: &[usize]) -> Vec<f32> {
    let total: usize = lengths.iter().sum();
    let mut out = Vec::with_capacity(total);
    let mut pos = 0;

    for (i, segment) in segments.iter().enumerate() {
        let fade = if i == 0 { 0 } else { fades[i - 1] };
        for (k, &sample) in segment[..fade].iter().enumerate() {
            let gain = (k + 1) as f32 / (fade + 1) as f32;
            let slot = &mut out[pos + k];
            *slot = *slot * (1.0 - gain) + sample * gain;
        }
        out.extend_from_slice(&segment[fade..]);
        pos += lengths[i];
    }
    out
}

/// Join segments that start early by their lead's preutterance.
///
/// Segment `i` holds `leads[i].preutterance` samples more than its event.
/// Its head is added onto the previous audio, which fades out linearly over
/// the first `overlap` samples of the lead-in and is silent after that.
/// With lead-ins bounded by the audio before them, the result holds exactly
/// the sum of the event lengths.
pub fn overlay(segments: &[Vec<f32>], leads: &[Lead]) -> Vec<f32> {
    let mut out: Vec<f32> = Vec::new();
    for (segment, lead) in segments.iter().zip(leads) {
        let start = out.len().saturating_sub(lead.preutterance);
        let head = out.len() - start;
        for (k, slot) in out[start..].iter_mut().enumerate() {
            let keep = if k < lead.overlap {
                1.0 - (k + 1) as f32 / (lead.overlap + 1) as f32
            } else {
                0.0
            };
            *slot = *slot * keep + segment[k];
        }
        out.extend_from_slice(&segment[head..]);
    }
    out
}

/// Sum tracks sample by sample, zero-padding shorter ones, then hard clip.
pub fn mix(tracks: &[Waveform], sample_rate: u32) -> Waveform {
    let mut out = Waveform::silent(0, sample_rate);
    for track in tracks {
        out.mix_from(track);
    }
    out.hard_clip();
    out
}
