//! # keyHearing command line front end
//!
//! Listens to an input device and prints one line per analysed frame:
//! `NO_SIGNAL`, or `<note> <frequency_hz> <cents_offset>`. Logs go to stderr
//! (set `RUST_LOG=debug` for per-frame details) so stdout stays parseable.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use keyhearing_core::audio::{self, CaptureSession, CpalSource, StreamConfig};
use keyhearing_core::config::{self, PipelineConfig};
use keyhearing_core::pipeline::PitchPipeline;
use std::io::Write;
use std::ops::ControlFlow;

#[derive(Debug, Parser)]
#[command(name = "keyhearing", version, about = "Real-time monophonic pitch detection")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    listen: ListenArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect pitch continuously (the default)
    Listen(ListenArgs),
    /// Read a single buffer from the input device and report it
    Probe(ProbeArgs),
    /// List available input devices
    Devices,
}

#[derive(Debug, Clone, Args)]
struct ListenArgs {
    /// Input device name (default: the host's default input)
    #[arg(long)]
    device: Option<String>,

    /// Capture sample rate in Hz
    #[arg(long, default_value_t = config::DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Samples per analysis frame (power of two)
    #[arg(long, default_value_t = config::DEFAULT_FRAME_SIZE)]
    frame_size: usize,

    /// Harmonics multiplied by the product spectrum
    #[arg(long, default_value_t = config::DEFAULT_HARMONICS)]
    harmonics: usize,

    /// Minimum total spectral power for a frame to count as signal
    #[arg(long, default_value_t = config::DEFAULT_POWER_THRESHOLD)]
    power_threshold: f32,

    /// Lowest frequency reported as a pitch, in Hz
    #[arg(long, default_value_t = config::DEFAULT_MIN_FREQUENCY)]
    min_frequency: f32,

    /// Consecutive failed reads before giving up (0 = never)
    #[arg(long, default_value_t = config::DEFAULT_MAX_CONSECUTIVE_READ_ERRORS)]
    max_read_errors: usize,

    /// Stop after this many frames instead of running until killed
    #[arg(long)]
    frames: Option<usize>,
}

impl ListenArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            sample_rate: self.sample_rate,
            frame_size: self.frame_size,
            harmonics: self.harmonics,
            power_threshold: self.power_threshold,
            min_frequency: self.min_frequency,
            max_consecutive_read_errors: self.max_read_errors,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct ProbeArgs {
    /// Input device name (default: the host's default input)
    #[arg(long)]
    device: Option<String>,

    #[arg(long, default_value_t = config::DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Samples to read
    #[arg(long, default_value_t = 256)]
    frames_per_buffer: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Listen(args)) => listen(&args),
        Some(Command::Probe(args)) => probe(&args),
        Some(Command::Devices) => devices(),
        None => listen(&cli.listen),
    }
}

fn listen(args: &ListenArgs) -> Result<()> {
    let pipeline = PitchPipeline::with_standard_notes(args.pipeline_config())
        .context("invalid pipeline configuration")?;
    let mut source = CpalSource::with_device(args.device.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut remaining = args.frames;

    let summary = pipeline
        .run(&mut source, &crossbeam_channel::never(), |verdict| {
            if let Err(e) = writeln!(out, "{}", verdict).and_then(|_| out.flush()) {
                log::info!("Output closed ({}), stopping", e);
                return ControlFlow::Break(());
            }
            match remaining.as_mut() {
                Some(n) => {
                    *n = n.saturating_sub(1);
                    if *n == 0 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                }
                None => ControlFlow::Continue(()),
            }
        })
        .context("pitch detection failed")?;

    log::info!(
        "Processed {} frames ({} with pitch, {} without), {} read errors, stopped: {:?}",
        summary.frames,
        summary.pitched,
        summary.no_signal(),
        summary.read_errors,
        summary.stop_reason
    );
    Ok(())
}

fn probe(args: &ProbeArgs) -> Result<()> {
    let mut source = CpalSource::with_device(args.device.clone());
    let config = StreamConfig::mono(args.sample_rate, args.frames_per_buffer);
    let mut session =
        CaptureSession::begin(&mut source, &config).context("failed to start capture")?;

    println!("Recording from microphone...");
    let mut buffer = vec![0.0_f32; args.frames_per_buffer];
    session.read(&mut buffer).context("failed to read stream")?;
    println!("Read {} samples from mic.", buffer.len());

    let peak = buffer.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
    log::info!("Peak amplitude: {:.4}", peak);

    session.finish().context("failed to stop stream")?;
    Ok(())
}

fn devices() -> Result<()> {
    let devices = audio::list_input_devices().context("failed to enumerate input devices")?;
    if devices.is_empty() {
        println!("No input devices found.");
    }
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        println!("{} {}", marker, device.name);
    }
    Ok(())
}
