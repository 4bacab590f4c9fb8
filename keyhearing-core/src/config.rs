//! Operating parameters for the pitch pipeline.

use crate::error::ConfigError;

/// Sample rate requested from the capture device, in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Samples per analysis frame. Must be a power of two.
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// Number of harmonics multiplied together by the HPS estimator.
pub const DEFAULT_HARMONICS: usize = 3;

/// Frames whose total spectral power falls below this are reported as silence.
pub const DEFAULT_POWER_THRESHOLD: f32 = 500.0;

/// Just below C3 (130.81 Hz), the lowest note in the table.
pub const DEFAULT_MIN_FREQUENCY: f32 = 129.0;

/// Consecutive failed reads tolerated before the device is considered lost.
pub const DEFAULT_MAX_CONSECUTIVE_READ_ERRORS: usize = 50;

/// Pipeline configuration parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Capture sample rate in Hz (default: 44100)
    pub sample_rate: u32,

    /// Analysis frame size in samples (default: 4096)
    /// Must be a power of two; the FFT is planned for exactly this length.
    pub frame_size: usize,

    /// Harmonics used by the product spectrum, including the fundamental (default: 3)
    pub harmonics: usize,

    /// Minimum total power for a frame to count as signal (default: 500.0)
    pub power_threshold: f32,

    /// Estimates below this frequency are reported as no signal (default: 129.0 Hz)
    pub min_frequency: f32,

    /// Read failures in a row before the run is aborted (default: 50)
    pub max_consecutive_read_errors: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            harmonics: DEFAULT_HARMONICS,
            power_threshold: DEFAULT_POWER_THRESHOLD,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            max_consecutive_read_errors: DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
        }
    }
}

impl PipelineConfig {
    /// Checks every parameter, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        if self.frame_size < 2 || !self.frame_size.is_power_of_two() {
            return Err(ConfigError::FrameSizeNotPowerOfTwo(self.frame_size));
        }
        if self.harmonics < 2 {
            return Err(ConfigError::TooFewHarmonics(self.harmonics));
        }
        check_threshold("power threshold", self.power_threshold)?;
        check_threshold("minimum frequency", self.min_frequency)?;
        Ok(())
    }

    /// Width of one spectrum bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.frame_size as f32
    }
}

fn check_threshold(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { name, value })
    }
}
