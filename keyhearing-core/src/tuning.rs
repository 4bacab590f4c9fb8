//! # Musical Tuning Module
//!
//! The note table and the frequency-to-note mapping used by the pipeline.
//!
//! ## Features
//! - Equal temperament note table from C3 to C6 (A4 = 440 Hz)
//! - Nearest-note lookup with deterministic tie-breaking
//! - Cent deviation calculations

use crate::error::ConfigError;
use once_cell::sync::Lazy;

/// Reference pitch for the standard table.
pub const A4_FREQUENCY: f32 = 440.0;

/// Semitone offsets from A4 covered by the standard table: C3 through C6.
const LOWEST_SEMITONE: i32 = -21;
const HIGHEST_SEMITONE: i32 = 15;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

impl Note {
    pub fn new(name: impl Into<String>, frequency: f32) -> Self {
        Self { name: name.into(), frequency }
    }
}

/// The closest table entry to an estimated frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteMatch<'a> {
    pub note: &'a Note,
    /// Position of `note` in its table.
    pub index: usize,
    /// Deviation of the estimate from `note`, positive when sharp.
    pub cents: f32,
}

/// An immutable set of notes sorted by ascending frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteTable {
    notes: Vec<Note>,
}

/// Statically computed C3..C6 table, built on first use.
static STANDARD: Lazy<NoteTable> =
    Lazy::new(|| NoteTable::equal_temperament(A4_FREQUENCY, LOWEST_SEMITONE, HIGHEST_SEMITONE));

impl NoteTable {
    /// The 37-note C3..C6 table the pipeline uses by default.
    pub fn standard() -> &'static NoteTable {
        &STANDARD
    }

    /// Builds an equal-tempered table spanning `lowest..=highest` semitones
    /// relative to A4, tuned so that A4 sounds at `a4`.
    pub fn equal_temperament(a4: f32, lowest: i32, highest: i32) -> Self {
        let notes = (lowest..=highest)
            .map(|n| {
                // f = f0 * 2^(n/12), n semitones away from A4
                let frequency = a4 * 2.0_f32.powf(n as f32 / 12.0);
                // A4 sits 9 semitones above C4; octaves change at C.
                let from_c4 = n + 9;
                let name = NOTE_NAMES[from_c4.rem_euclid(12) as usize];
                let octave = 4 + from_c4.div_euclid(12);
                Note::new(format!("{}{}", name, octave), frequency)
            })
            .collect();
        Self { notes }
    }

    /// Wraps a caller-supplied list of notes.
    ///
    /// The list must be non-empty, strictly ascending and contain only
    /// positive, finite frequencies.
    pub fn from_notes(notes: Vec<Note>) -> Result<Self, ConfigError> {
        if notes.is_empty() {
            return Err(ConfigError::InvalidNoteTable("table is empty".into()));
        }
        if let Some(bad) = notes.iter().find(|n| !(n.frequency.is_finite() && n.frequency > 0.0)) {
            return Err(ConfigError::InvalidNoteTable(format!(
                "{} has non-positive frequency {}",
                bad.name, bad.frequency
            )));
        }
        if let Some(pair) = notes.windows(2).find(|w| w[0].frequency >= w[1].frequency) {
            return Err(ConfigError::InvalidNoteTable(format!(
                "{} is not below {}",
                pair[0].name, pair[1].name
            )));
        }
        Ok(Self { notes })
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn lowest(&self) -> Option<&Note> {
        self.notes.first()
    }

    pub fn highest(&self) -> Option<&Note> {
        self.notes.last()
    }

    /// Looks a note up by its exact name (e.g. "A4").
    pub fn find(&self, name: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.name == name)
    }

    /// Finds the closest note to `freq` and the deviation from it in cents.
    ///
    /// Scans the table in order and only replaces the current best on a
    /// strictly smaller distance, so a frequency exactly halfway between two
    /// notes resolves to the lower one. Returns `None` for non-positive or
    /// non-finite input.
    pub fn nearest(&self, freq: f32) -> Option<NoteMatch<'_>> {
        if !(freq.is_finite() && freq > 0.0) {
            return None;
        }

        let mut best: Option<(usize, f32)> = None;
        for (index, note) in self.notes.iter().enumerate() {
            let distance = (freq - note.frequency).abs();
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((index, distance)),
            }
        }

        best.map(|(index, _)| {
            let note = &self.notes[index];
            NoteMatch {
                note,
                index,
                cents: calculate_cents_deviation(freq, note.frequency),
            }
        })
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
