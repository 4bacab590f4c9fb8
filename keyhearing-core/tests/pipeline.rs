//! Integration tests for the pitch pipeline, driven by a scripted audio source.

use crossbeam_channel::never;
use keyhearing_core::audio::{AudioSource, StreamConfig};
use keyhearing_core::config::PipelineConfig;
use keyhearing_core::error::{AudioError, PipelineError};
use keyhearing_core::fft::{FftEngine, HannWindow, PowerSpectrum};
use keyhearing_core::pipeline::{PitchPipeline, StopReason};
use keyhearing_core::{pitch, Verdict};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::ops::ControlFlow;

const SAMPLE_RATE: u32 = 44100;
const FRAMES: usize = 4096;

/// One scripted outcome per `read` call.
enum Step {
    Frame(Vec<f32>),
    Fail(&'static str),
}

/// Replays a fixed script of frames and failures, then reports `Closed`.
#[derive(Default)]
struct ScriptedSource {
    steps: VecDeque<Step>,
    fail_open: bool,
    opened_with: Option<StreamConfig>,
    lifecycle: Vec<&'static str>,
}

impl ScriptedSource {
    fn new(steps: Vec<Step>) -> Self {
        Self { steps: steps.into(), ..Default::default() }
    }
}

impl AudioSource for ScriptedSource {
    fn open(&mut self, config: &StreamConfig) -> Result<(), AudioError> {
        self.lifecycle.push("open");
        if self.fail_open {
            return Err(AudioError::StreamOpen("unsupported sample rate".into()));
        }
        self.opened_with = Some(*config);
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.lifecycle.push("start");
        Ok(())
    }

    fn read(&mut self, frame: &mut [f32]) -> Result<(), AudioError> {
        match self.steps.pop_front() {
            Some(Step::Frame(samples)) => {
                frame.copy_from_slice(&samples);
                Ok(())
            }
            Some(Step::Fail(message)) => Err(AudioError::Read(message.into())),
            None => Err(AudioError::Closed),
        }
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.lifecycle.push("stop");
        Ok(())
    }

    fn close(&mut self) {
        self.lifecycle.push("close");
    }
}

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

fn pure_sine(frequency: f32) -> Vec<f32> {
    (0..FRAMES)
        .map(|i| (2.0 * PI * frequency * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

fn power_spectrum(frame: &[f32]) -> PowerSpectrum {
    let mut signal = HannWindow::new(frame.len()).apply(frame);
    FftEngine::new(frame.len()).unwrap().process(&mut signal);
    PowerSpectrum::from_spectrum(&signal)
}

fn expected_bin(frequency: f32) -> i64 {
    (frequency * FRAMES as f32 / SAMPLE_RATE as f32).round() as i64
}

fn pipeline() -> PitchPipeline<'static> {
    PitchPipeline::with_standard_notes(PipelineConfig::default()).unwrap()
}

fn collect_lines(
    pipeline: &PitchPipeline<'static>,
    source: &mut ScriptedSource,
) -> (Vec<String>, Result<keyhearing_core::pipeline::RunSummary, PipelineError>) {
    let mut lines = Vec::new();
    let result = pipeline.run(source, &never(), |verdict| {
        lines.push(verdict.to_string());
        ControlFlow::Continue(())
    });
    (lines, result)
}

#[test]
fn hps_peak_tracks_harmonic_tones_across_the_note_range() {
    let mut frequency = 130.0;
    while frequency <= 1046.0 {
        let spectrum = power_spectrum(&harmonic_tone(frequency, 1.0));
        let peak = pitch::estimate(&spectrum, 3).peak_bin.unwrap() as i64;
        assert!(
            (peak - expected_bin(frequency)).abs() <= 1,
            "{} Hz: peak bin {}, expected {}",
            frequency,
            peak,
            expected_bin(frequency)
        );
        frequency += 9.5;
    }
}

#[test]
fn raw_power_peak_tracks_pure_sines() {
    for frequency in [130.81, 220.0, 440.0, 659.25, 1046.5] {
        let spectrum = power_spectrum(&pure_sine(frequency));
        let peak = pitch::find_peak(spectrum.bins()).unwrap() as i64;
        assert!((peak - expected_bin(frequency)).abs() <= 1, "{} Hz: bin {}", frequency, peak);
    }
}

#[test]
fn hps_corrects_octave_errors() {
    // The second partial is the loudest; a plain peak picker lands an octave high.
    let partials = [0.4, 1.0, 0.6];
    let frame: Vec<f32> = (0..FRAMES)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            partials
                .iter()
                .enumerate()
                .map(|(n, a)| a * (2.0 * PI * 220.0 * (n + 1) as f32 * t).sin())
                .sum()
        })
        .collect();

    let spectrum = power_spectrum(&frame);
    assert_eq!(pitch::find_peak(spectrum.bins()), Some(41));
    assert_eq!(pitch::estimate(&spectrum, 3).peak_bin, Some(20));

    let verdict = pipeline().analyze(&frame);
    assert_eq!(verdict.estimate().unwrap().note.name, "A3");
}

#[test]
fn run_emits_one_line_per_frame_and_skips_failed_reads() {
    let mut source = ScriptedSource::new(vec![
        Step::Frame(harmonic_tone(440.0, 1.0)),
        Step::Frame(vec![0.0; FRAMES]),
        Step::Fail("overrun"),
        Step::Frame(harmonic_tone(261.63, 0.5)),
        Step::Frame(harmonic_tone(440.0, 0.01)),
    ]);

    let (lines, result) = collect_lines(&pipeline(), &mut source);
    let summary = result.unwrap();

    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "A4 441.43 5.62");
    assert_eq!(lines[1], "NO_SIGNAL");
    assert!(lines[2].starts_with("C4 258.40 -21."), "got {}", lines[2]);
    assert_eq!(lines[3], "NO_SIGNAL");

    assert_eq!(summary.frames, 4);
    assert_eq!(summary.pitched, 2);
    assert_eq!(summary.no_signal(), 2);
    assert_eq!(summary.read_errors, 1);
    assert_eq!(summary.stop_reason, StopReason::SourceClosed);

    assert_eq!(source.opened_with, Some(StreamConfig::mono(44100, 4096)));
    assert_eq!(source.lifecycle, vec!["open", "start", "stop", "close"]);
}

#[test]
fn frames_are_independent() {
    let pipeline = pipeline();
    let tone = harmonic_tone(329.63, 1.0);
    let first = pipeline.analyze(&tone).to_string();
    pipeline.analyze(&vec![0.0; FRAMES]);
    pipeline.analyze(&harmonic_tone(880.0, 1.0));
    assert_eq!(pipeline.analyze(&tone).to_string(), first);
}

#[test]
fn persistent_read_failures_abort_and_release_the_stream() {
    let config = PipelineConfig { max_consecutive_read_errors: 3, ..Default::default() };
    let pipeline = PitchPipeline::with_standard_notes(config).unwrap();
    let mut source = ScriptedSource::new(vec![
        Step::Frame(harmonic_tone(440.0, 1.0)),
        Step::Fail("disconnected"),
        Step::Fail("disconnected"),
        Step::Fail("disconnected"),
        Step::Frame(harmonic_tone(440.0, 1.0)),
    ]);

    let (lines, result) = collect_lines(&pipeline, &mut source);

    assert_eq!(lines, vec!["A4 441.43 5.62"]);
    match result {
        Err(PipelineError::DeviceLost { count, last }) => {
            assert_eq!(count, 3);
            assert_eq!(last, AudioError::Read("disconnected".into()));
        }
        other => panic!("expected DeviceLost, got {:?}", other),
    }
    assert_eq!(source.lifecycle, vec!["open", "start", "stop", "close"]);
}

#[test]
fn a_successful_read_resets_the_failure_count() {
    let config = PipelineConfig { max_consecutive_read_errors: 2, ..Default::default() };
    let pipeline = PitchPipeline::with_standard_notes(config).unwrap();
    let mut source = ScriptedSource::new(vec![
        Step::Fail("hiccup"),
        Step::Frame(vec![0.0; FRAMES]),
        Step::Fail("hiccup"),
        Step::Frame(vec![0.0; FRAMES]),
    ]);

    let (lines, result) = collect_lines(&pipeline, &mut source);
    assert_eq!(lines, vec!["NO_SIGNAL", "NO_SIGNAL"]);
    assert_eq!(result.unwrap().read_errors, 2);
}

#[test]
fn open_failure_is_reported() {
    let mut source = ScriptedSource { fail_open: true, ..Default::default() };
    let (lines, result) = collect_lines(&pipeline(), &mut source);

    assert!(lines.is_empty());
    assert!(matches!(result, Err(PipelineError::Audio(AudioError::StreamOpen(_)))));
    assert_eq!(source.lifecycle, vec!["open"]);
}

#[test]
fn stop_signal_is_checked_before_each_read() {
    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    let mut source = ScriptedSource::new(vec![
        Step::Frame(harmonic_tone(440.0, 1.0)),
        Step::Frame(harmonic_tone(440.0, 1.0)),
        Step::Frame(harmonic_tone(440.0, 1.0)),
    ]);

    let mut seen = 0;
    let summary = pipeline()
        .run(&mut source, &stop_rx, |_| {
            seen += 1;
            if seen == 2 {
                stop_tx.send(()).unwrap();
            }
            ControlFlow::Continue(())
        })
        .unwrap();

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(source.steps.len(), 1);
    assert_eq!(source.lifecycle, vec!["open", "start", "stop", "close"]);
}

#[test]
fn dropped_stop_sender_cancels_the_run() {
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    drop(stop_tx);
    let mut source = ScriptedSource::new(vec![Step::Frame(vec![0.0; FRAMES])]);

    let summary = pipeline().run(&mut source, &stop_rx, |_| ControlFlow::Continue(())).unwrap();
    assert_eq!(summary.frames, 0);
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
}

#[test]
fn consumer_can_end_the_run() {
    let mut source = ScriptedSource::new(vec![
        Step::Frame(harmonic_tone(440.0, 1.0)),
        Step::Frame(harmonic_tone(440.0, 1.0)),
    ]);

    let mut verdicts: Vec<Verdict<'static>> = Vec::new();
    let summary = pipeline()
        .run(&mut source, &never(), |verdict| {
            verdicts.push(verdict);
            ControlFlow::Break(())
        })
        .unwrap();

    assert_eq!(verdicts.len(), 1);
    assert_eq!(summary.stop_reason, StopReason::ConsumerDone);
    assert_eq!(source.lifecycle, vec!["open", "start", "stop", "close"]);
}
