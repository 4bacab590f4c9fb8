// keyhearing-core/src/lib.rs

//! The core logic for the keyHearing pitch detector.
//! This crate is responsible for audio capture, spectral analysis,
//! harmonic product spectrum pitch estimation and note mapping.
//! It contains no GUI or console code.

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod pipeline;
pub mod pitch;
pub mod tuning;

use std::fmt;
use tuning::Note;

/// Line printed for frames without a usable pitch.
pub const NO_SIGNAL: &str = "NO_SIGNAL";

/// A detected pitch for a single audio frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate<'a> {
    /// Frequency of the winning HPS bin in Hz.
    pub frequency_hz: f32,
    /// The nearest note in the table used for the analysis.
    pub note: &'a Note,
    /// Deviation from `note` in cents, positive when sharp.
    pub cents_offset: f32,
    /// Power summed over all non-DC bins of the frame.
    pub total_power: f32,
    /// The winning HPS bin.
    pub peak_bin: usize,
}

/// Outcome of analysing one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict<'a> {
    /// Too quiet, or the estimate lies below the lowest note.
    NoSignal,
    Pitch(PitchEstimate<'a>),
}

impl<'a> Verdict<'a> {
    pub fn has_signal(&self) -> bool {
        matches!(self, Verdict::Pitch(_))
    }

    pub fn estimate(&self) -> Option<&PitchEstimate<'a>> {
        match self {
            Verdict::Pitch(estimate) => Some(estimate),
            Verdict::NoSignal => None,
        }
    }
}

/// Formats the output line: `NO_SIGNAL`, or `<note> <frequency_hz> <cents>`.
impl fmt::Display for Verdict<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::NoSignal => f.write_str(NO_SIGNAL),
            Verdict::Pitch(estimate) => write!(
                f,
                "{} {:.2} {:.2}",
                estimate.note.name, estimate.frequency_hz, estimate.cents_offset
            ),
        }
    }
}
