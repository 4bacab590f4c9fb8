//! # Fast Fourier Transform (FFT) Module
//!
//! Frequency-domain front end of the pitch pipeline: the analysis window,
//! the transform itself and the reduction of complex bins to power.
//!
//! ## Features
//! - Hann windowing for reduced spectral leakage
//! - Iterative in-place radix-2 FFT with a precomputed plan
//! - Power spectrum with the DC bin excluded

use crate::error::ConfigError;
use rustfft::num_complex::Complex32;
use std::f64::consts::PI;

/// Precomputed Hann window coefficients for one frame length.
///
/// Coefficient `i` is `0.5 * (1 - cos(2πi / (N - 1)))`, tapering the frame
/// to zero at both edges.
#[derive(Debug, Clone)]
pub struct HannWindow {
    coefficients: Vec<f32>,
}

impl HannWindow {
    pub fn new(len: usize) -> Self {
        if len == 1 {
            // The formula divides by N - 1; a single sample passes unchanged.
            return Self { coefficients: vec![1.0] };
        }
        let n_minus_1 = len.saturating_sub(1) as f32;
        let coefficients = (0..len)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
            .collect();
        Self { coefficients }
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Weights `frame` by the window, producing a real-valued complex signal.
    ///
    /// # Panics
    /// * If `frame.len()` differs from the window length
    pub fn apply(&self, frame: &[f32]) -> Vec<Complex32> {
        assert_eq!(
            frame.len(),
            self.coefficients.len(),
            "frame length must match the window length"
        );
        frame
            .iter()
            .zip(&self.coefficients)
            .map(|(&sample, &coeff)| Complex32::new(sample * coeff, 0.0))
            .collect()
    }
}

/// A forward FFT planned for a fixed power-of-two length.
///
/// The plan holds the bit-reversal permutation and the twiddle factors
/// `exp(-2πik/N)`, so a transform allocates nothing and runs in
/// O(N log N) on the caller's buffer.
#[derive(Debug, Clone)]
pub struct FftEngine {
    len: usize,
    bit_reverse: Vec<usize>,
    twiddles: Vec<Complex32>,
}

impl FftEngine {
    /// Plans a transform of `len` points.
    ///
    /// # Returns
    /// * `Err(ConfigError::FrameSizeNotPowerOfTwo)` - if `len` is zero or not a power of two
    pub fn new(len: usize) -> Result<Self, ConfigError> {
        if !len.is_power_of_two() {
            return Err(ConfigError::FrameSizeNotPowerOfTwo(len));
        }

        let bits = len.trailing_zeros();
        let bit_reverse = if bits == 0 {
            vec![0]
        } else {
            (0..len)
                .map(|i| i.reverse_bits() >> (usize::BITS - bits))
                .collect()
        };

        // Computed in f64 so the error does not grow with N.
        let twiddles = (0..len / 2)
            .map(|k| {
                let angle = -2.0 * PI * k as f64 / len as f64;
                Complex32::new(angle.cos() as f32, angle.sin() as f32)
            })
            .collect();

        Ok(Self { len, bit_reverse, twiddles })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Replaces `buffer` with its discrete Fourier transform.
    ///
    /// # Panics
    /// * If `buffer.len()` differs from the planned length
    pub fn process(&self, buffer: &mut [Complex32]) {
        assert_eq!(
            buffer.len(),
            self.len,
            "buffer length must match the planned FFT length"
        );

        for (i, &j) in self.bit_reverse.iter().enumerate() {
            if i < j {
                buffer.swap(i, j);
            }
        }

        // Butterflies: combine pairs of size/2-point transforms into size-point ones.
        let mut size = 2;
        while size <= self.len {
            let half = size / 2;
            let stride = self.len / size;
            for start in (0..self.len).step_by(size) {
                for k in 0..half {
                    let even = buffer[start + k];
                    let odd = buffer[start + k + half] * self.twiddles[k * stride];
                    buffer[start + k] = even + odd;
                    buffer[start + k + half] = even - odd;
                }
            }
            size *= 2;
        }
    }
}

/// Power per bin for the lower half of a spectrum, plus its sum.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    bins: Vec<f32>,
    total_power: f32,
}

impl PowerSpectrum {
    /// Reduces an N-point complex spectrum to N/2 power bins.
    ///
    /// Bin 0 (DC) is left at zero and kept out of the total so a constant
    /// offset in the input cannot dominate the peak search.
    pub fn from_spectrum(spectrum: &[Complex32]) -> Self {
        let half = spectrum.len() / 2;
        let mut bins = vec![0.0; half];
        let mut total = 0.0_f64;
        for k in 1..half {
            let power = spectrum[k].norm_sqr();
            bins[k] = power;
            total += power as f64;
        }
        Self { bins, total_power: total as f32 }
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn total_power(&self) -> f32 {
        self.total_power
    }
}
