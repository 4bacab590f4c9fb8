//! # Pitch Detection Module
//!
//! Harmonic Product Spectrum (HPS) fundamental estimation.
//!
//! A periodic tone puts energy at its fundamental and at integer multiples
//! of it. Multiplying the power at bin `k` with the power at `2k`, `3k`, ...
//! reinforces the true fundamental and suppresses bins that only line up
//! with one harmonic, such as a loud second partial that a plain peak
//! picker would report an octave too high.

use crate::fft::PowerSpectrum;

/// Result of one HPS pass over a power spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct HpsEstimate {
    /// The product spectrum; entries whose harmonics fall past the end are zero.
    pub hps: Vec<f32>,
    /// Bin with the largest product, or `None` if the spectrum has no bin above DC.
    pub peak_bin: Option<usize>,
}

impl HpsEstimate {
    /// Converts the peak bin to Hz for a frame of `frame_size` samples.
    pub fn peak_frequency(&self, sample_rate: u32, frame_size: usize) -> Option<f32> {
        self.peak_bin
            .map(|bin| bin_to_frequency(bin, sample_rate, frame_size))
    }
}

/// Runs the harmonic product over `spectrum` using `harmonics` partials.
///
/// The fundamental counts as the first partial, so `harmonics = 3` multiplies
/// each bin by the bins at twice and three times its index.
pub fn estimate(spectrum: &PowerSpectrum, harmonics: usize) -> HpsEstimate {
    let hps = harmonic_product_spectrum(spectrum.bins(), harmonics);
    let peak_bin = find_peak(&hps);
    HpsEstimate { hps, peak_bin }
}

/// Builds the harmonic product spectrum of `spectrum`.
///
/// For every `h` in `2..=harmonics`, bins below `len / h` are multiplied by
/// `spectrum[k * h]`; bins from `len / h` upward have no `h`-th harmonic
/// inside the spectrum and are zeroed.
pub fn harmonic_product_spectrum(spectrum: &[f32], harmonics: usize) -> Vec<f32> {
    let len = spectrum.len();
    let mut hps = spectrum.to_vec();

    for h in 2..=harmonics {
        let limit = len / h;
        for (k, value) in hps.iter_mut().enumerate() {
            if k < limit {
                *value *= spectrum[k * h];
            } else {
                *value = 0.0;
            }
        }
    }

    hps
}

/// Index of the largest value, skipping the DC bin.
///
/// Only a strictly larger value replaces the current best, so ties go to
/// the lowest bin.
pub fn find_peak(hps: &[f32]) -> Option<usize> {
    if hps.len() < 2 {
        return None;
    }

    let mut peak = 1;
    for k in 2..hps.len() {
        if hps[k] > hps[peak] {
            peak = k;
        }
    }
    Some(peak)
}

/// Centre frequency of `bin` in Hz.
pub fn bin_to_frequency(bin: usize, sample_rate: u32, frame_size: usize) -> f32 {
    bin as f32 * sample_rate as f32 / frame_size as f32
}
