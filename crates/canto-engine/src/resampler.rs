//! Per-event segment rendering.
//!
//! A note is rendered by selecting the analysis frames of the entry's voiced
//! region, looping the sustain part until the note's duration is covered,
//! scaling F0 to the target pitch and resynthesizing.

use std::ops::Range;

use canto_ir::{frame_hop, shift_ratio, Analysis, SynthesisFrames, Vocoder, VoicebankEntry};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RenderCause;

/// How the sustain region is extended when a note outlasts its sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopMode {
    /// Restart from the beginning of the sustain region
    #[default]
    Forward,
    /// Alternate backward and forward passes
    PingPong,
}

/// Where a note's segment is placed relative to its beat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    /// Segments start on the note boundary and crossfade into each other
    #[default]
    Grid,
    /// Segments start `preutterance` early and overlay the previous audio,
    /// which fades out over `overlap`
    Preutterance,
}

/// Render parameters shared by all events.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Crossfade between consecutive segments in seconds
    pub crossfade: f64,
    pub loop_mode: LoopMode,
    pub alignment: Alignment,
    /// Sung for notes without a syllable
    pub default_syllable: String,
}

impl RenderSettings {
    /// Configured crossfade in samples.
    pub fn crossfade_samples(&self) -> usize {
        (self.crossfade.max(0.0) * self.sample_rate as f64).round() as usize
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            crossfade: 0.005,
            loop_mode: LoopMode::Forward,
            alignment: Alignment::Grid,
            default_syllable: "a".to_owned(),
        }
    }
}

/// Analysis frames of an entry's voiced region, and the length of its attack
/// in frames.
pub fn voiced_frames(entry: &VoicebankEntry, analysis: &Analysis) -> (Range<usize>, usize) {
    let frames = analysis.frames();
    let (start, end) = entry.voiced_region(analysis.duration());
    let first = analysis.frame_at(start).min(frames);
    let last = analysis.frame_at(end).min(frames);
    (first..last.max(first), analysis.frame_at(entry.consonant_boundary))
}

/// Frame indices to synthesize `needed` frames from `window`.
///
/// The first `attack` frames are played once and never looped; at least one
/// sustain frame always remains. Shorter requests truncate from the end.
pub fn plan_frames(window: Range<usize>, attack: usize, needed: usize, mode: LoopMode) -> Vec<usize> {
    if window.is_empty() {
        return Vec::new();
    }
    if needed <= window.len() {
        return window.take(needed).collect();
    }

    let sustain_start = window.start + attack.min(window.len() - 1);
    let sustain: Vec<usize> = (sustain_start..window.end).collect();
    let mut plan: Vec<usize> = window.collect();
    let remaining = needed - plan.len();

    match mode {
        LoopMode::PingPong if sustain.len() > 1 => {
            let bounce = sustain.iter().rev().skip(1).chain(sustain.iter().skip(1));
            plan.extend(bounce.cycle().take(remaining));
        }
        _ => plan.extend(sustain.iter().cycle().take(remaining)),
    }
    plan
}

/// Vocoder input for the planned frames, with F0 scaled from the entry's
/// recorded pitch to `pitch`.
///
/// Fails when the shift is too large for a finite, non-zero F0 ratio.
pub fn synthesis_frames<'a>(
    entry: &VoicebankEntry,
    analysis: &'a Analysis,
    plan: &[usize],
    pitch: i32,
) -> Result<SynthesisFrames<'a>, RenderCause> {
    let ratio = pitch
        .checked_sub(entry.recorded_pitch)
        .map(shift_ratio)
        .filter(|r| r.is_normal())
        .ok_or(RenderCause::PitchOutOfRange {
            pitch,
            recorded: entry.recorded_pitch,
        })?;
    Ok(SynthesisFrames {
        f0: plan.iter().map(|&i| analysis.f0[i] * ratio).collect(),
        spectral_envelope: plan.iter().map(|&i| analysis.spectral_envelope[i].as_slice()).collect(),
        aperiodicity: plan.iter().map(|&i| analysis.aperiodicity[i].as_slice()).collect(),
        frame_period: analysis.frame_period,
        envelope_rate: analysis.sample_rate,
    })
}

/// Fit vocoder output to exactly `len` samples.
///
/// Excess is truncated; a shortfall of up to one frame is zero-padded.
pub fn fit_length(samples: &mut Vec<f32>, len: usize, hop: usize) -> Result<(), RenderCause> {
    if samples.len() + hop < len {
        return Err(RenderCause::LengthMismatch {
            expected: len,
            actual: samples.len(),
        });
    }
    samples.resize(len, 0.0);
    Ok(())
}

/// Renders single events into fixed-length segments.
pub struct Resampler<'a> {
    vocoder: &'a dyn Vocoder,
    settings: &'a RenderSettings,
}

impl<'a> Resampler<'a> {
    pub fn new(vocoder: &'a dyn Vocoder, settings: &'a RenderSettings) -> Self {
        Self { vocoder, settings }
    }

    /// Sing `entry` at `pitch` for exactly `len` samples.
    pub fn note(
        &self,
        entry: &VoicebankEntry,
        analysis: &Analysis,
        pitch: i32,
        len: usize,
    ) -> Result<Vec<f32>, RenderCause> {
        if len == 0 {
            return Ok(Vec::new());
        }

        let (window, attack) = voiced_frames(entry, analysis);
        if window.is_empty() {
            return Err(RenderCause::EmptyRegion {
                sample: entry.sample_path.clone(),
            });
        }

        let hop = frame_hop(analysis.frame_period, self.settings.sample_rate);
        let needed = len.div_ceil(hop);
        let looped = needed > window.len();
        let plan = plan_frames(window, attack, needed, self.settings.loop_mode);
        let frames = synthesis_frames(entry, analysis, &plan, pitch)?;

        debug!(
            "{} at {}: {} frames{}",
            entry.syllable,
            pitch,
            plan.len(),
            if looped { " (looped)" } else { "" }
        );
        let mut samples = self
            .vocoder
            .synthesize(&frames, self.settings.sample_rate)
            .map_err(RenderCause::Vocoder)?;
        fit_length(&mut samples, len, hop)?;
        Ok(samples)
    }

    /// Digital silence of `len` samples.
    pub fn rest(&self, len: usize) -> Vec<f32> {
        vec![0.0; len]
    }
}
