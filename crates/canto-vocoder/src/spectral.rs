//! Autocorrelation/cepstrum vocoder.

use canto_ir::{frame_hop, Analysis, SynthesisFrames, Vocoder, VocoderError};
use realfft::num_complex::Complex64;
use realfft::RealFftPlanner;
use tracing::debug;

use crate::dsp::{hann, parabolic_offset, FftPair};

/// Magnitudes below this are floored before taking the log.
const MIN_MAGNITUDE: f64 = 1e-9;

/// Frames quieter than this mean-square level are unvoiced.
const SILENCE_POWER: f64 = 1e-8;

/// Peaks within this fraction of the best correlation prefer the shorter lag.
const OCTAVE_TOLERANCE: f64 = 0.9;

/// Analysis/resynthesis vocoder built on the real FFT.
///
/// Aperiodicity is one value per frame: 1 minus the normalized
/// autocorrelation at the detected period, and 1 for unvoiced frames.
#[derive(Clone, Debug)]
pub struct SpectralVocoder {
    frame_period: f64,
    f0_floor: f64,
    f0_ceil: f64,
    voicing_threshold: f64,
    seed: u64,
}

impl SpectralVocoder {
    pub const DEFAULT_FRAME_PERIOD: f64 = 0.005;

    /// Create a vocoder analysing every `frame_period` seconds.
    pub fn new(frame_period: f64) -> Self {
        Self {
            frame_period,
            f0_floor: 70.0,
            f0_ceil: 1000.0,
            voicing_threshold: 0.45,
            seed: 0x5eed,
        }
    }

    /// Seed of the noise excitation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn frame_period(&self) -> f64 {
        self.frame_period
    }

    /// Analysis window length: three periods of the lowest F0.
    fn fft_size(&self, sample_rate: u32) -> usize {
        let periods = 3.0 * sample_rate as f64 / self.f0_floor;
        (periods.ceil() as usize).next_power_of_two().max(64)
    }
}

impl Default for SpectralVocoder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FRAME_PERIOD)
    }
}

impl Vocoder for SpectralVocoder {
    fn analyze(&self, waveform: &[f32], sample_rate: u32) -> Result<Analysis, VocoderError> {
        if sample_rate == 0 {
            return Err(VocoderError::new("sample rate is zero"));
        }
        if waveform.is_empty() {
            return Err(VocoderError::new("cannot analyse an empty waveform"));
        }

        let hop = frame_hop(self.frame_period, sample_rate);
        let frames = waveform.len().div_ceil(hop);
        let mut analyzer = FrameAnalyzer::new(self, self.fft_size(sample_rate), sample_rate);

        let mut analysis = Analysis {
            f0: Vec::with_capacity(frames),
            spectral_envelope: Vec::with_capacity(frames),
            aperiodicity: Vec::with_capacity(frames),
            frame_period: hop as f64 / sample_rate as f64,
            sample_rate,
        };
        for i in 0..frames {
            let params = analyzer.analyze(waveform, i * hop)?;
            analysis.f0.push(params.f0);
            analysis.spectral_envelope.push(params.envelope);
            analysis.aperiodicity.push(vec![params.aperiodicity]);
        }

        debug!(
            "analysed {} samples into {} frames ({} voiced)",
            waveform.len(),
            frames,
            analysis.f0.iter().filter(|&&f| f > 0.0).count()
        );
        Ok(analysis)
    }

    fn synthesize(
        &self,
        frames: &SynthesisFrames<'_>,
        sample_rate: u32,
    ) -> Result<Vec<f32>, VocoderError> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        if sample_rate == 0 || frames.envelope_rate == 0 {
            return Err(VocoderError::new("sample rate is zero"));
        }
        if frames.spectral_envelope.len() != frames.len() || frames.aperiodicity.len() != frames.len() {
            return Err(VocoderError::new("frame tracks differ in length"));
        }
        let bins = frames.spectral_envelope[0].len();
        if bins < 2 || frames.spectral_envelope.iter().any(|e| e.len() != bins) {
            return Err(VocoderError::new("inconsistent spectral envelope size"));
        }

        let size = (bins - 1) * 2;
        let half = size / 2;
        let hop = frames.hop(sample_rate);
        let total = frames.len() * hop;
        // Buffers are indexed from `half` samples before the first frame centre.
        let span = total + size;
        let nyquist = sample_rate as f64 / 2.0;
        // Output bin k sits at this fractional bin of the analysed envelope.
        let bin_scale = sample_rate as f64 / frames.envelope_rate as f64;
        let mut regridded = vec![0.0; bins];

        let voiced = pulse_train(&frames.f0, hop, sample_rate, span, half);
        let mut rng = fastrand::Rng::with_seed(self.seed);
        let noise: Vec<f64> = (0..span)
            .map(|_| (rng.f64() * 2.0 - 1.0) * 3f64.sqrt())
            .collect();

        let window = hann(size);
        let mut planner = RealFftPlanner::new();
        let fft = FftPair::new(&mut planner, size);
        let mut buf = fft.make_input();
        let mut spectrum = fft.make_spectrum();
        let mut out = vec![0.0; span];
        let mut weight = vec![0.0; span];

        for (i, envelope) in frames.spectral_envelope.iter().enumerate() {
            let ap = frame_aperiodicity(frames.f0[i], frames.aperiodicity[i], nyquist);
            let (voiced_gain, noise_gain) = ((1.0 - ap).sqrt(), ap.sqrt());
            let start = i * hop;

            for (k, slot) in buf.iter_mut().enumerate() {
                let excitation = voiced[start + k] * voiced_gain + noise[start + k] * noise_gain;
                *slot = excitation * window[k];
            }
            fft.forward(&mut buf, &mut spectrum)?;
            let gains: &[f64] = if bin_scale == 1.0 {
                &envelope[..]
            } else {
                regrid(envelope, bin_scale, &mut regridded);
                &regridded[..]
            };
            for (bin, &gain) in spectrum.iter_mut().zip(gains) {
                *bin *= gain;
            }
            fft.inverse(&mut spectrum, &mut buf)?;

            for (k, &y) in buf.iter().enumerate() {
                out[start + k] += y / size as f64;
                weight[start + k] += window[k];
            }
        }

        let floor = size as f64 / (4.0 * hop as f64);
        Ok(out[half..half + total]
            .iter()
            .zip(&weight[half..half + total])
            .map(|(&y, &w)| (y / w.max(floor)) as f32)
            .collect())
    }
}

/// A frame is voiced when its F0 is positive and below Nyquist. NaN is not.
fn is_voiced(f0: f64, nyquist: f64) -> bool {
    f0 > 0.0 && f0 < nyquist
}

fn frame_aperiodicity(f0: f64, aperiodicity: &[f64], nyquist: f64) -> f64 {
    if !is_voiced(f0, nyquist) {
        return 1.0;
    }
    if aperiodicity.is_empty() {
        return 0.0;
    }
    let mean = aperiodicity.iter().sum::<f64>() / aperiodicity.len() as f64;
    mean.clamp(0.0, 1.0)
}

/// Linearly interpolate `envelope` at bin positions `k * scale`. Bins past
/// the analysed band are silent.
fn regrid(envelope: &[f64], scale: f64, out: &mut [f64]) {
    let last = envelope.len() - 1;
    for (k, slot) in out.iter_mut().enumerate() {
        let pos = k as f64 * scale;
        *slot = if pos > last as f64 {
            0.0
        } else {
            let i = pos.floor() as usize;
            let frac = pos - i as f64;
            envelope[i] * (1.0 - frac) + envelope[(i + 1).min(last)] * frac
        };
    }
}

/// Unit-power impulses at the periods given by `f0`, offset by `half`.
///
/// Frames at or above Nyquist get no pulses, so every period is longer than
/// two samples.
fn pulse_train(f0: &[f64], hop: usize, sample_rate: u32, span: usize, half: usize) -> Vec<f64> {
    let mut train = vec![0.0; span];
    let sr = sample_rate as f64;
    let nyquist = sr / 2.0;
    let end = (f0.len() * hop) as f64;
    let last = f0.len().saturating_sub(1);

    let mut t = 0.0;
    while t < end {
        let frame = ((t / hop as f64).round() as usize).min(last);
        let hz = f0[frame];
        if is_voiced(hz, nyquist) {
            let period = sr / hz;
            if let Some(slot) = train.get_mut(t.round() as usize + half) {
                *slot += period.sqrt();
            }
            t += period;
        } else {
            t += 1.0;
        }
    }
    train
}

struct FrameParams {
    f0: f64,
    envelope: Vec<f64>,
    aperiodicity: f64,
}

/// Scratch buffers and plans for analysing frames of one size.
struct FrameAnalyzer {
    sample_rate: f64,
    f0_ceil: f64,
    voicing_threshold: f64,
    min_lag: usize,
    max_lag: usize,
    window: Vec<f64>,
    window_power: f64,
    /// Normalized autocorrelation of the window, per lag
    window_acf: Vec<f64>,
    fft: FftPair,
    /// Zero-padded to twice the frame size so correlation does not wrap
    acf_fft: FftPair,
    frame: Vec<f64>,
    scratch: Vec<f64>,
    spectrum: Vec<Complex64>,
    padded: Vec<f64>,
    padded_spectrum: Vec<Complex64>,
}

impl FrameAnalyzer {
    fn new(vocoder: &SpectralVocoder, size: usize, sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        let max_lag = ((sr / vocoder.f0_floor).ceil() as usize).clamp(3, size / 2 - 2);
        let min_lag = ((sr / vocoder.f0_ceil).floor() as usize).clamp(2, max_lag);

        let window = hann(size);
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let window_acf = (0..=max_lag + 1)
            .map(|lag| {
                let r: f64 = window.iter().zip(&window[lag..]).map(|(a, b)| a * b).sum();
                r / window_power
            })
            .collect();

        let mut planner = RealFftPlanner::new();
        let fft = FftPair::new(&mut planner, size);
        let acf_fft = FftPair::new(&mut planner, size * 2);

        Self {
            sample_rate: sr,
            f0_ceil: vocoder.f0_ceil,
            voicing_threshold: vocoder.voicing_threshold,
            min_lag,
            max_lag,
            window,
            window_power,
            window_acf,
            frame: fft.make_input(),
            scratch: fft.make_input(),
            spectrum: fft.make_spectrum(),
            padded: acf_fft.make_input(),
            padded_spectrum: acf_fft.make_spectrum(),
            fft,
            acf_fft,
        }
    }

    fn analyze(&mut self, waveform: &[f32], centre: usize) -> Result<FrameParams, VocoderError> {
        let start = centre as isize - (self.window.len() / 2) as isize;
        for (k, (slot, w)) in self.frame.iter_mut().zip(&self.window).enumerate() {
            let pos = start + k as isize;
            let x = usize::try_from(pos)
                .ok()
                .and_then(|p| waveform.get(p))
                .map_or(0.0, |&s| s as f64);
            *slot = x * w;
        }

        let (f0, clarity) = self.pitch()?;
        let envelope = self.envelope(f0)?;
        let aperiodicity = if f0 > 0.0 {
            (1.0 - clarity).clamp(0.0, 1.0)
        } else {
            1.0
        };
        Ok(FrameParams {
            f0,
            envelope,
            aperiodicity,
        })
    }

    /// F0 in Hz (0 when unvoiced) and the normalized correlation at that
    /// period.
    fn pitch(&mut self) -> Result<(f64, f64), VocoderError> {
        let size = self.frame.len();
        self.padded[..size].copy_from_slice(&self.frame);
        self.padded[size..].fill(0.0);
        self.acf_fft.forward(&mut self.padded, &mut self.padded_spectrum)?;
        for bin in self.padded_spectrum.iter_mut() {
            *bin = Complex64::new(bin.norm_sqr(), 0.0);
        }
        self.acf_fft.inverse(&mut self.padded_spectrum, &mut self.padded)?;

        let r0 = self.padded[0];
        let power = r0 / self.padded.len() as f64 / self.window_power;
        if power < SILENCE_POWER {
            return Ok((0.0, 0.0));
        }

        let nacf: Vec<f64> = (0..=self.max_lag + 1)
            .map(|lag| self.padded[lag] / r0 / self.window_acf[lag])
            .collect();
        let best = nacf[self.min_lag..=self.max_lag]
            .iter()
            .copied()
            .fold(f64::MIN, f64::max);
        if best < self.voicing_threshold {
            return Ok((0.0, best.max(0.0)));
        }

        let lag = (self.min_lag.max(1)..=self.max_lag)
            .find(|&lag| {
                let v = nacf[lag];
                v >= OCTAVE_TOLERANCE * best && v >= nacf[lag - 1] && v >= nacf[lag + 1]
            })
            .unwrap_or(self.min_lag);

        let period = lag as f64 + parabolic_offset(nacf[lag - 1], nacf[lag], nacf[lag + 1]);
        let f0 = self.sample_rate / period;
        if f0 > self.f0_ceil * 1.05 {
            return Ok((0.0, 0.0));
        }
        Ok((f0, nacf[lag].min(1.0)))
    }

    /// Cepstrally smoothed magnitude spectrum, scaled so that filtering
    /// unit-power excitation reproduces the frame's power.
    fn envelope(&mut self, f0: f64) -> Result<Vec<f64>, VocoderError> {
        let size = self.frame.len();
        self.scratch.copy_from_slice(&self.frame);
        self.fft.forward(&mut self.scratch, &mut self.spectrum)?;
        for bin in self.spectrum.iter_mut() {
            *bin = Complex64::new(bin.norm().max(MIN_MAGNITUDE).ln(), 0.0);
        }
        self.fft.inverse(&mut self.spectrum, &mut self.scratch)?;

        // Keep quefrencies below one pitch period.
        let reference = if f0 > 0.0 { f0 } else { self.f0_ceil };
        let lifter = ((0.8 * self.sample_rate / reference) as usize).clamp(1, size / 2);
        for (q, c) in self.scratch.iter_mut().enumerate() {
            let keep = q < lifter || q > size - lifter;
            *c = if keep { *c / size as f64 } else { 0.0 };
        }
        self.fft.forward(&mut self.scratch, &mut self.spectrum)?;

        let norm = self.window_power.sqrt();
        Ok(self.spectrum.iter().map(|c| c.re.exp() / norm).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 16000;

    fn sine(hz: f64, seconds: f64) -> Vec<f32> {
        let len = (seconds * SR as f64) as usize;
        (0..len)
            .map(|n| (0.5 * (2.0 * std::f64::consts::PI * hz * n as f64 / SR as f64).sin()) as f32)
            .collect()
    }

    fn median_voiced_f0(analysis: &Analysis) -> f64 {
        let n = analysis.frames();
        let mut voiced: Vec<f64> = analysis.f0[n / 5..n - n / 5]
            .iter()
            .copied()
            .filter(|&f| f > 0.0)
            .collect();
        assert!(!voiced.is_empty(), "no voiced frames");
        voiced.sort_by(f64::total_cmp);
        voiced[voiced.len() / 2]
    }

    fn frames_of(analysis: &Analysis, ratio: f64) -> SynthesisFrames<'_> {
        SynthesisFrames {
            f0: analysis.f0.iter().map(|f| f * ratio).collect(),
            spectral_envelope: analysis.spectral_envelope.iter().map(Vec::as_slice).collect(),
            aperiodicity: analysis.aperiodicity.iter().map(Vec::as_slice).collect(),
            frame_period: analysis.frame_period,
            envelope_rate: analysis.sample_rate,
        }
    }

    /// Power-weighted mean frequency of the envelopes of the middle frames.
    fn envelope_centroid(analysis: &Analysis) -> f64 {
        let n = analysis.frames();
        let (mut weighted, mut total) = (0.0, 0.0);
        for envelope in &analysis.spectral_envelope[n / 4..n - n / 4] {
            let bin_hz = analysis.sample_rate as f64 / ((envelope.len() - 1) * 2) as f64;
            for (k, e) in envelope.iter().enumerate() {
                weighted += e * e * k as f64 * bin_hz;
                total += e * e;
            }
        }
        weighted / total
    }

    #[test]
    fn sine_pitch_is_detected() {
        let vocoder = SpectralVocoder::default();
        let analysis = vocoder.analyze(&sine(220.0, 0.3), SR).unwrap();

        assert_eq!(analysis.frames(), 60);
        assert_eq!(analysis.frame_period, 0.005);
        assert_eq!(analysis.sample_rate, SR);
        assert!(analysis.is_consistent());
        assert!((median_voiced_f0(&analysis) - 220.0).abs() < 220.0 * 0.02);

        let mid = analysis.frames() / 2;
        assert!(analysis.aperiodicity[mid][0] < 0.3);
        assert!(analysis
            .spectral_envelope
            .iter()
            .flatten()
            .all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn silence_is_unvoiced() {
        let analysis = SpectralVocoder::default().analyze(&[0.0; 1600], SR).unwrap();
        assert!(!analysis.is_voiced());
        assert!(analysis.aperiodicity.iter().all(|a| a == &[1.0]));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(SpectralVocoder::default().analyze(&[], SR).is_err());
        assert!(SpectralVocoder::default().analyze(&[0.0], 0).is_err());
    }

    #[test]
    fn synthesis_length_is_frames_times_hop() {
        let vocoder = SpectralVocoder::default();
        let analysis = vocoder.analyze(&sine(220.0, 0.2), SR).unwrap();
        let frames = frames_of(&analysis, 1.0);
        let out = vocoder.synthesize(&frames, SR).unwrap();

        assert_eq!(out.len(), frames.len() * 80);
        assert!(out.iter().all(|s| s.is_finite()));
        assert!(out.iter().any(|s| s.abs() > 1e-3));

        // Rendering at another rate changes only the hop.
        let out = vocoder.synthesize(&frames, SR / 2).unwrap();
        assert_eq!(out.len(), frames.len() * 40);
    }

    #[test]
    fn scaled_f0_moves_resynthesized_pitch() {
        let vocoder = SpectralVocoder::default();
        let analysis = vocoder.analyze(&sine(220.0, 0.4), SR).unwrap();
        let out = vocoder.synthesize(&frames_of(&analysis, 1.5), SR).unwrap();

        let again = vocoder.analyze(&out, SR).unwrap();
        let f0 = median_voiced_f0(&again);
        assert!((f0 - 330.0).abs() < 330.0 * 0.05, "f0 {}", f0);
    }

    #[test]
    fn synthesis_is_deterministic() {
        let vocoder = SpectralVocoder::default();
        let analysis = vocoder.analyze(&sine(300.0, 0.1), SR).unwrap();
        let frames = frames_of(&analysis, 1.0);
        assert_eq!(
            vocoder.synthesize(&frames, SR).unwrap(),
            vocoder.synthesize(&frames, SR).unwrap()
        );

        // Unvoiced frames are pure noise, so the seed shows.
        let silent = vocoder.analyze(&[0.0; 800], SR).unwrap();
        let mut loud = silent.clone();
        loud.spectral_envelope.iter_mut().flatten().for_each(|v| *v = 1.0);
        let frames = frames_of(&loud, 1.0);
        assert_ne!(
            vocoder.synthesize(&frames, SR).unwrap(),
            vocoder.clone().with_seed(7).synthesize(&frames, SR).unwrap()
        );
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let envelope = [1.0; 5];
        let short = [1.0; 3];
        let ap = [0.0];
        let frames = SynthesisFrames {
            f0: vec![100.0, 100.0],
            spectral_envelope: vec![envelope.as_slice(), short.as_slice()],
            aperiodicity: vec![ap.as_slice(), ap.as_slice()],
            frame_period: 0.005,
            envelope_rate: SR,
        };
        assert!(SpectralVocoder::default().synthesize(&frames, SR).is_err());

        let empty = SynthesisFrames {
            f0: Vec::new(),
            spectral_envelope: Vec::new(),
            aperiodicity: Vec::new(),
            frame_period: 0.005,
            envelope_rate: SR,
        };
        assert!(SpectralVocoder::default().synthesize(&empty, SR).unwrap().is_empty());
    }

    #[test]
    fn pitch_above_nyquist_is_unvoiced() {
        let envelope = [1.0; 5];
        let ap = [0.0];
        for f0 in [220.0 * 2f64.powi(30), 8000.0, f64::INFINITY, f64::NAN] {
            let frames = SynthesisFrames {
                f0: vec![f0; 4],
                spectral_envelope: vec![envelope.as_slice(); 4],
                aperiodicity: vec![ap.as_slice(); 4],
                frame_period: 0.005,
                envelope_rate: SR,
            };
            let out = SpectralVocoder::default().synthesize(&frames, SR).unwrap();
            assert_eq!(out.len(), 4 * 80, "f0 {}", f0);
            assert!(out.iter().all(|s| s.is_finite()), "f0 {}", f0);
        }
        assert!(pulse_train(&[1e12; 4], 80, SR, 400, 40).iter().all(|&p| p == 0.0));
    }

    #[test]
    fn regrid_maps_bins_by_frequency() {
        let envelope = [0.0, 1.0, 2.0, 3.0, 4.0];
        let mut out = [0.0; 5];

        // Twice the output rate: bin k reads source bin 2k.
        regrid(&envelope, 2.0, &mut out);
        assert_eq!(out, [0.0, 2.0, 4.0, 0.0, 0.0]);

        // Half the output rate: halfway bins are interpolated.
        regrid(&envelope, 0.5, &mut out);
        assert_eq!(out, [0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn formants_stay_put_at_another_output_rate() {
        let vocoder = SpectralVocoder::default();
        let analysis = vocoder.analyze(&sine(500.0, 0.4), SR).unwrap();
        let frames = frames_of(&analysis, 1.0);

        let native = vocoder.synthesize(&frames, SR).unwrap();
        let reference = envelope_centroid(&vocoder.analyze(&native, SR).unwrap());

        let doubled = vocoder.synthesize(&frames, SR * 2).unwrap();
        assert_eq!(doubled.len(), frames.len() * 160);
        let centroid = envelope_centroid(&vocoder.analyze(&doubled, SR * 2).unwrap());
        assert!(
            (centroid - reference).abs() < reference * 0.3,
            "centroid {} vs {}",
            centroid,
            reference
        );
    }
}
