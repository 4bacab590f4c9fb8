//! # keyHearing - Pitch Display Window
//!
//! A small window showing the note, frequency and cents offset detected on
//! the default input device, coloured by how well the note is in tune.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application
//! - **Audio Thread**: Runs the pitch pipeline against the input device
//! - **Communication**: Crossbeam channels for verdicts and shutdown
//! - **Updates**: The window polls for new verdicts every 50ms

mod ui;

use crossbeam_channel::{Receiver, Sender};
use iced::{Element, Subscription, Theme};
use keyhearing_core::Verdict;
use keyhearing_core::config::PipelineConfig;
use keyhearing_core::audio::CpalSource;
use keyhearing_core::pipeline::PitchPipeline;
use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use ui::main_display::create_main_view;

/// How often the window drains the verdict channel.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn main() -> iced::Result {
    env_logger::init();
    log::info!("[MAIN] Starting keyHearing...");
    let result = iced::application("keyHearing", KeyHearingApp::update, KeyHearingApp::view)
        .subscription(KeyHearingApp::subscription)
        .theme(KeyHearingApp::theme)
        .window_size((320.0, 220.0))
        .run();
    log::info!("[MAIN] Application finished with result: {:?}", result);
    result
}

#[derive(Debug, Clone)]
pub enum Message {
    /// Timer tick: pick up whatever the audio thread has produced.
    Tick,
}

/// Events sent from the audio thread to the window.
#[derive(Debug)]
enum WorkerEvent {
    Verdict(Verdict<'static>),
    Failed(String),
}

/// What the window currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// No frame has been analysed yet.
    Listening,
    Detected(Verdict<'static>),
    /// Capture ended with an error.
    Failed(String),
}

/// The audio thread and the channel used to stop it.
#[derive(Debug)]
struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Drop for AudioWorker {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("[MAIN] Audio thread panicked");
            }
        }
    }
}

#[derive(Debug)]
struct KeyHearingApp {
    _audio_worker: AudioWorker,
    events: Receiver<WorkerEvent>,
    reading: Reading,
}

impl Default for KeyHearingApp {
    fn default() -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            _audio_worker: start_audio_processing(events_tx),
            events: events_rx,
            reading: Reading::Listening,
        }
    }
}

impl KeyHearingApp {
    fn update(&mut self, message: Message) {
        match message {
            Message::Tick => {
                while let Ok(event) = self.events.try_recv() {
                    self.reading = match event {
                        WorkerEvent::Verdict(verdict) => Reading::Detected(verdict),
                        WorkerEvent::Failed(error) => Reading::Failed(error),
                    };
                }
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.reading)
    }

    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(POLL_INTERVAL).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Spawns the audio thread, which runs the pipeline until the window goes away.
///
/// The thread stops when the shutdown channel fires or its sender is dropped,
/// or when the window stops receiving verdicts.
fn start_audio_processing(events: Sender<WorkerEvent>) -> AudioWorker {
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    let thread_handle = thread::spawn(move || {
        log::info!("[AUDIO-THREAD] Starting audio thread...");
        let pipeline = match PitchPipeline::with_standard_notes(PipelineConfig::default()) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                let _ = events.send(WorkerEvent::Failed(e.to_string()));
                return;
            }
        };

        let mut source = CpalSource::default_device();
        let result = pipeline.run(&mut source, &shutdown_rx, |verdict| {
            match events.send(WorkerEvent::Verdict(verdict)) {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            }
        });

        match result {
            Ok(summary) => log::info!(
                "[AUDIO-THREAD] Finished after {} frames ({:?})",
                summary.frames,
                summary.stop_reason
            ),
            Err(e) => {
                log::error!("[AUDIO-THREAD] Fatal error: {}", e);
                let _ = events.send(WorkerEvent::Failed(e.to_string()));
            }
        }
    });

    AudioWorker {
        shutdown_tx,
        thread_handle: Some(thread_handle),
    }
}
