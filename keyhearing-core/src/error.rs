//! Error types for configuration, audio capture and the pitch pipeline.

use thiserror::Error;

/// Rejected [`PipelineConfig`](crate::config::PipelineConfig) values.
///
/// These are caught once, before any audio is captured, so the per-frame
/// path never has to check them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("frame size {0} is not a power of two of at least 2")]
    FrameSizeNotPowerOfTwo(usize),

    #[error("harmonic count {0} is below the minimum of 2")]
    TooFewHarmonics(usize),

    #[error("sample rate must be positive")]
    InvalidSampleRate,

    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidThreshold { name: &'static str, value: f32 },

    #[error("invalid note table: {0}")]
    InvalidNoteTable(String),
}

/// Failures reported by an [`AudioSource`](crate::audio::AudioSource).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AudioError {
    /// The capture backend or its default device could not be initialised.
    #[error("audio device initialisation failed: {0}")]
    DeviceInit(String),

    /// The device refused the requested channels, format or sample rate.
    #[error("failed to open audio stream: {0}")]
    StreamOpen(String),

    #[error("failed to start audio stream: {0}")]
    StreamStart(String),

    /// A single frame could not be captured (overrun, underrun, hiccup).
    #[error("failed to read audio frame: {0}")]
    Read(String),

    /// The source has no more frames; the run ends normally.
    #[error("audio source closed")]
    Closed,
}

/// Errors that end a [`PitchPipeline`](crate::pipeline::PitchPipeline) run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    /// Too many reads in a row failed; the device is assumed to be gone.
    #[error("giving up after {count} consecutive read errors (last: {last})")]
    DeviceLost { count: usize, last: AudioError },
}
