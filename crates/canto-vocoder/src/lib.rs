//! Built-in analysis/resynthesis backend for canto.
//!
//! [`SpectralVocoder`] estimates F0 from the windowed autocorrelation,
//! takes the spectral envelope from a liftered cepstrum and resynthesizes
//! with a pulse train plus noise, filtered frame by frame and overlap-added.

mod dsp;
mod spectral;

pub use spectral::SpectralVocoder;
