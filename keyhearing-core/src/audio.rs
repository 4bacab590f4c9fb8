//! # Audio Capture Module
//!
//! This module defines the capability the pitch pipeline reads frames from
//! ([`AudioSource`]), a scoped guard that guarantees the stream is released
//! ([`CaptureSession`]), and a real-time implementation on top of CPAL
//! (Cross-Platform Audio Library).
//!
//! ## Features
//! - Blocking, frame-sized reads regardless of the backend's callback model
//! - Stop and close on every exit path, including errors
//! - Automatic mono/f32 configuration selection
//! - Input device listing

use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Captured buffers queued between the audio callback and the reader.
const CHANNEL_CAPACITY: usize = 64;

/// How long a read waits for the device before reporting an error.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Requested stream parameters. Samples are always delivered as `f32`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    /// Channels delivered to the reader (only mono is used by the pipeline).
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per buffer handed over by the backend.
    pub frames_per_buffer: usize,
}

impl StreamConfig {
    pub fn mono(sample_rate: u32, frames_per_buffer: usize) -> Self {
        Self { channels: 1, sample_rate, frames_per_buffer }
    }
}

/// A capture device the pipeline can pull frames from.
///
/// The lifecycle is `open` → `start` → `read`* → `stop` → `close`.
/// Use [`CaptureSession`] rather than calling these directly so the stream
/// is always released.
pub trait AudioSource {
    fn open(&mut self, config: &StreamConfig) -> Result<(), AudioError>;

    fn start(&mut self) -> Result<(), AudioError>;

    /// Fills `frame` completely, blocking until enough samples are captured.
    ///
    /// Returns `AudioError::Closed` once the source has nothing more to give.
    fn read(&mut self, frame: &mut [f32]) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;

    /// Releases the stream. Must be safe to call when nothing is open.
    fn close(&mut self);
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn open(&mut self, config: &StreamConfig) -> Result<(), AudioError> {
        (**self).open(config)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        (**self).start()
    }

    fn read(&mut self, frame: &mut [f32]) -> Result<(), AudioError> {
        (**self).read(frame)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        (**self).stop()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// An opened and started stream; stopped and closed when dropped.
pub struct CaptureSession<'a, S: AudioSource + ?Sized> {
    source: &'a mut S,
    active: bool,
}

impl<'a, S: AudioSource + ?Sized> CaptureSession<'a, S> {
    /// Opens and starts `source`.
    ///
    /// If starting fails the stream is closed again before the error is
    /// returned.
    pub fn begin(source: &'a mut S, config: &StreamConfig) -> Result<Self, AudioError> {
        source.open(config)?;
        if let Err(e) = source.start() {
            source.close();
            return Err(e);
        }
        log::info!(
            "Capture started: {} Hz, {} channel(s), {} samples per buffer",
            config.sample_rate,
            config.channels,
            config.frames_per_buffer
        );
        Ok(Self { source, active: true })
    }

    pub fn read(&mut self, frame: &mut [f32]) -> Result<(), AudioError> {
        self.source.read(frame)
    }

    /// Stops and closes the stream, reporting a failure to stop.
    ///
    /// The stream is closed even when stopping fails.
    pub fn finish(mut self) -> Result<(), AudioError> {
        self.active = false;
        let stopped = self.source.stop();
        self.source.close();
        log::info!("Capture stopped");
        stopped
    }
}

impl<S: AudioSource + ?Sized> Drop for CaptureSession<'_, S> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(e) = self.source.stop() {
            log::warn!("Error stopping audio stream: {}", e);
        }
        self.source.close();
        log::info!("Capture released");
    }
}

/// An input device as reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDevice {
    pub name: String,
    pub is_default: bool,
}

/// Lists the input devices of the default host.
pub fn list_input_devices() -> Result<Vec<InputDevice>, AudioError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

    Ok(devices
        .filter_map(|device| device.name().ok())
        .map(|name| InputDevice {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
        })
        .collect())
}

/// Live capture from a CPAL input device.
///
/// CPAL delivers audio through a callback on its own thread. The callback
/// keeps the first channel of every buffer and forwards it over a bounded
/// channel; [`read`](AudioSource::read) blocks on that channel, turning the
/// callback stream into frame-sized reads. If the reader falls behind, whole
/// buffers are dropped and the next read reports an overflow.
pub struct CpalSource {
    device_name: Option<String>,
    read_timeout: Duration,
    stream: Option<cpal::Stream>,
    samples: Option<Receiver<Vec<f32>>>,
    errors: Option<Receiver<String>>,
    dropped: Arc<AtomicUsize>,
    pending: Vec<f32>,
}

impl CpalSource {
    /// Captures from the host's default input device.
    pub fn default_device() -> Self {
        Self::with_device(None)
    }

    /// Captures from the input device called `name`, or the default one.
    pub fn with_device(name: Option<String>) -> Self {
        Self {
            device_name: name,
            read_timeout: DEFAULT_READ_TIMEOUT,
            stream: None,
            samples: None,
            errors: None,
            dropped: Arc::new(AtomicUsize::new(0)),
            pending: Vec::new(),
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    fn find_device(&self) -> Result<cpal::Device, AudioError> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceInit("no input device available".into())),
            Some(wanted) => host
                .input_devices()
                .map_err(|e| AudioError::DeviceInit(e.to_string()))?
                .find(|d| d.name().map(|n| &n == wanted).unwrap_or(false))
                .ok_or_else(|| AudioError::DeviceInit(format!("no input device named '{}'", wanted))),
        }
    }
}

impl AudioSource for CpalSource {
    fn open(&mut self, config: &StreamConfig) -> Result<(), AudioError> {
        let device = self.find_device()?;
        log::info!(
            "Using audio input device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        let configs = device
            .supported_input_configs()
            .map_err(|e| AudioError::StreamOpen(e.to_string()))?
            .collect::<Vec<_>>();
        let supported = find_supported_config(configs, config.sample_rate).ok_or_else(|| {
            AudioError::StreamOpen(format!("no f32 input format at {} Hz", config.sample_rate))
        })?;

        let stream_config: cpal::StreamConfig = supported
            .with_sample_rate(cpal::SampleRate(config.sample_rate))
            .config();
        let channels = usize::from(stream_config.channels.max(1));
        log::debug!(
            "Selected input config: {} channel(s) at {} Hz",
            stream_config.channels,
            config.sample_rate
        );

        let (sample_tx, sample_rx) = crossbeam_channel::bounded::<Vec<f32>>(CHANNEL_CAPACITY);
        let (error_tx, error_rx) = crossbeam_channel::unbounded::<String>();
        let dropped = Arc::clone(&self.dropped);
        let frames_per_buffer = config.frames_per_buffer.max(1);

        // This buffer will accumulate audio data from the callback.
        let mut audio_buffer: Vec<f32> = Vec::with_capacity(frames_per_buffer * 2);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    audio_buffer.extend(data.iter().step_by(channels));

                    while audio_buffer.len() >= frames_per_buffer {
                        let buffer: Vec<f32> = audio_buffer.drain(..frames_per_buffer).collect();
                        if sample_tx.try_send(buffer).is_err() {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
                move |err| {
                    let _ = error_tx.send(err.to_string());
                },
                None,
            )
            .map_err(|e| AudioError::StreamOpen(e.to_string()))?;

        self.dropped.store(0, Ordering::Relaxed);
        self.pending.clear();
        self.stream = Some(stream);
        self.samples = Some(sample_rx);
        self.errors = Some(error_rx);
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| AudioError::StreamStart("stream is not open".into()))?;
        stream.play().map_err(|e| AudioError::StreamStart(e.to_string()))
    }

    fn read(&mut self, frame: &mut [f32]) -> Result<(), AudioError> {
        let samples = self.samples.as_ref().ok_or(AudioError::Closed)?;

        if let Some(errors) = &self.errors {
            match errors.try_recv() {
                Ok(message) => {
                    self.pending.clear();
                    return Err(AudioError::Read(message));
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }
        }

        let overflowed = self.dropped.swap(0, Ordering::Relaxed);
        if overflowed > 0 {
            self.pending.clear();
            return Err(AudioError::Read(format!(
                "input overflow, {} buffer(s) dropped",
                overflowed
            )));
        }

        while self.pending.len() < frame.len() {
            match samples.recv_timeout(self.read_timeout) {
                Ok(buffer) => self.pending.extend_from_slice(&buffer),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(AudioError::Read("timed out waiting for audio".into()));
                }
                Err(RecvTimeoutError::Disconnected) => return Err(AudioError::Closed),
            }
        }

        frame.copy_from_slice(&self.pending[..frame.len()]);
        self.pending.drain(..frame.len());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        match &self.stream {
            Some(stream) => stream
                .pause()
                .map_err(|e| AudioError::Read(format!("failed to pause stream: {}", e))),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        // Dropping the stream closes it and ends the callback.
        self.stream = None;
        self.samples = None;
        self.errors = None;
        self.pending.clear();
    }
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only f32 configurations whose range contains `target_rate` qualify; among
/// those the one with the fewest channels wins (mono when available).
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
}
