//! # Pitch Pipeline
//!
//! Runs frames through window → FFT → power spectrum → HPS → note mapping,
//! and drives that analysis from an [`AudioSource`] until the source closes,
//! the consumer stops, or a stop signal arrives.
//!
//! Every frame is analysed independently. The only state kept between frames
//! is the window, the FFT plan and the note table, all fixed at construction.

use crate::audio::{AudioSource, CaptureSession, StreamConfig};
use crate::config::PipelineConfig;
use crate::error::{AudioError, ConfigError, PipelineError};
use crate::fft::{FftEngine, HannWindow, PowerSpectrum};
use crate::pitch;
use crate::tuning::NoteTable;
use crate::{PitchEstimate, Verdict};
use crossbeam_channel::{Receiver, TryRecvError};
use std::ops::ControlFlow;

/// Why a [`PitchPipeline::run`] ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The audio source reported that it is closed.
    #[default]
    SourceClosed,
    /// The stop signal fired (or its sender went away).
    Cancelled,
    /// The verdict consumer asked to stop.
    ConsumerDone,
}

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Frames that were read and analysed.
    pub frames: usize,
    /// Analysed frames that produced a pitch.
    pub pitched: usize,
    /// Reads that failed and were skipped.
    pub read_errors: usize,
    pub stop_reason: StopReason,
}

impl RunSummary {
    pub fn no_signal(&self) -> usize {
        self.frames - self.pitched
    }
}

/// The per-frame pitch estimator.
#[derive(Debug, Clone)]
pub struct PitchPipeline<'n> {
    config: PipelineConfig,
    window: HannWindow,
    fft: FftEngine,
    notes: &'n NoteTable,
}

impl<'n> PitchPipeline<'n> {
    /// Validates `config` and precomputes the window and FFT plan.
    pub fn new(config: PipelineConfig, notes: &'n NoteTable) -> Result<Self, ConfigError> {
        config.validate()?;
        let window = HannWindow::new(config.frame_size);
        let fft = FftEngine::new(config.frame_size)?;
        Ok(Self { config, window, fft, notes })
    }

    /// A pipeline over the standard C3..C6 note table.
    pub fn with_standard_notes(config: PipelineConfig) -> Result<PitchPipeline<'static>, ConfigError> {
        PitchPipeline::new(config, NoteTable::standard())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn notes(&self) -> &'n NoteTable {
        self.notes
    }

    /// Analyses one frame of raw samples.
    ///
    /// # Panics
    /// * If `frame.len()` differs from the configured frame size
    pub fn analyze(&self, frame: &[f32]) -> Verdict<'n> {
        let mut signal = self.window.apply(frame);
        self.fft.process(&mut signal);
        let spectrum = PowerSpectrum::from_spectrum(&signal);
        let total_power = spectrum.total_power();

        if total_power < self.config.power_threshold {
            log::debug!("Total power {:.1} below threshold", total_power);
            return Verdict::NoSignal;
        }

        let estimate = pitch::estimate(&spectrum, self.config.harmonics);
        let (peak_bin, frequency_hz) = match estimate.peak_bin {
            Some(bin) => (
                bin,
                pitch::bin_to_frequency(bin, self.config.sample_rate, self.config.frame_size),
            ),
            None => return Verdict::NoSignal,
        };

        if frequency_hz < self.config.min_frequency {
            log::debug!("Peak at bin {} ({:.2} Hz) below minimum frequency", peak_bin, frequency_hz);
            return Verdict::NoSignal;
        }

        match self.notes.nearest(frequency_hz) {
            Some(found) => {
                log::debug!(
                    "Peak at bin {} ({:.2} Hz) -> {} {:+.2} cents, power {:.1}",
                    peak_bin,
                    frequency_hz,
                    found.note.name,
                    found.cents,
                    total_power
                );
                Verdict::Pitch(PitchEstimate {
                    frequency_hz,
                    note: found.note,
                    cents_offset: found.cents,
                    total_power,
                    peak_bin,
                })
            }
            None => Verdict::NoSignal,
        }
    }

    /// Captures and analyses frames from `source` until something ends the run.
    ///
    /// The stream is opened and started first and is stopped and closed on
    /// every way out of this function. `stop` is checked once before each
    /// read; a message or a disconnected sender ends the run. Pass
    /// `crossbeam_channel::never()` to run without a stop signal.
    ///
    /// A failed read is logged and skipped without producing a verdict. After
    /// `max_consecutive_read_errors` failures in a row (0 disables the limit)
    /// the device is considered lost.
    ///
    /// # Returns
    /// * `Ok(summary)` - the source closed, `stop` fired, or `on_verdict` broke
    /// * `Err(e)` - the stream could not be opened or started, or the device was lost
    pub fn run<S, F>(
        &self,
        source: &mut S,
        stop: &Receiver<()>,
        mut on_verdict: F,
    ) -> Result<RunSummary, PipelineError>
    where
        S: AudioSource + ?Sized,
        F: FnMut(Verdict<'n>) -> ControlFlow<()>,
    {
        let stream_config = StreamConfig::mono(self.config.sample_rate, self.config.frame_size);
        let mut session = CaptureSession::begin(source, &stream_config)?;

        let mut frame = vec![0.0_f32; self.config.frame_size];
        let mut summary = RunSummary::default();
        let mut consecutive_errors = 0;

        loop {
            if stop_requested(stop) {
                log::info!("Stop requested after {} frames", summary.frames);
                summary.stop_reason = StopReason::Cancelled;
                break;
            }

            match session.read(&mut frame) {
                Ok(()) => consecutive_errors = 0,
                Err(AudioError::Closed) => {
                    log::info!("Audio source closed after {} frames", summary.frames);
                    summary.stop_reason = StopReason::SourceClosed;
                    break;
                }
                Err(e @ AudioError::Read(_)) => {
                    summary.read_errors += 1;
                    consecutive_errors += 1;
                    log::warn!("Skipping frame: {}", e);
                    let limit = self.config.max_consecutive_read_errors;
                    if limit > 0 && consecutive_errors >= limit {
                        log::error!("Audio device lost after {} failed reads", consecutive_errors);
                        return Err(PipelineError::DeviceLost {
                            count: consecutive_errors,
                            last: e,
                        });
                    }
                    continue;
                }
                Err(e) => {
                    log::error!("Fatal audio error: {}", e);
                    return Err(e.into());
                }
            }

            let verdict = self.analyze(&frame);
            summary.frames += 1;
            if verdict.has_signal() {
                summary.pitched += 1;
            }

            if on_verdict(verdict).is_break() {
                summary.stop_reason = StopReason::ConsumerDone;
                break;
            }
        }

        if let Err(e) = session.finish() {
            log::warn!("Error stopping audio stream: {}", e);
        }
        Ok(summary)
    }
}

fn stop_requested(stop: &Receiver<()>) -> bool {
    match stop.try_recv() {
        Ok(()) | Err(TryRecvError::Disconnected) => true,
        Err(TryRecvError::Empty) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44100;
    const FRAMES: usize = 4096;

    /// A tone with decaying partials, like a plucked or bowed string.
    fn harmonic_tone(frequency: f32, amplitude: f32) -> Vec<f32> {
        let partials = [1.0, 0.5, 0.33];
        (0..FRAMES)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                partials
                    .iter()
                    .enumerate()
                    .map(|(n, a)| a * (2.0 * PI * frequency * (n + 1) as f32 * t).sin())
                    .sum::<f32>()
                    * amplitude
            })
            .collect()
    }

    fn pipeline() -> PitchPipeline<'static> {
        PitchPipeline::with_standard_notes(PipelineConfig::default()).unwrap()
    }

    #[test]
    fn concert_a_maps_to_a4() {
        let verdict = pipeline().analyze(&harmonic_tone(440.0, 1.0));
        let estimate = verdict.estimate().expect("expected a pitch");
        assert_eq!(estimate.peak_bin, 41);
        assert_eq!(estimate.note.name, "A4");
        assert!((estimate.frequency_hz - 441.43).abs() < 0.01);
        assert!((estimate.cents_offset - 5.62).abs() < 0.05);
        assert!(estimate.total_power > 500.0);
    }

    #[test]
    fn silence_is_no_signal() {
        assert_eq!(pipeline().analyze(&vec![0.0; FRAMES]), Verdict::NoSignal);
    }

    #[test]
    fn quiet_tone_is_no_signal() {
        assert_eq!(pipeline().analyze(&harmonic_tone(440.0, 0.01)), Verdict::NoSignal);
    }

    #[test]
    fn low_tone_is_below_minimum_frequency() {
        // Well below C3; the product peak lands under 129 Hz.
        assert_eq!(pipeline().analyze(&harmonic_tone(80.0, 1.0)), Verdict::NoSignal);
    }

    #[test]
    fn dc_offset_does_not_count_as_signal() {
        assert_eq!(pipeline().analyze(&vec![0.001; FRAMES]), Verdict::NoSignal);
    }

    #[test]
    fn rejects_invalid_frame_size() {
        let config = PipelineConfig { frame_size: 3000, ..Default::default() };
        assert!(matches!(
            PitchPipeline::with_standard_notes(config),
            Err(ConfigError::FrameSizeNotPowerOfTwo(3000))
        ));
    }
}
