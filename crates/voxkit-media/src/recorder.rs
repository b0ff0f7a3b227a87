//! Recorder session
//!
//! Capture side of the driver layer: a recorder driver pushes PCM frames
//! through a bounded channel into whoever started the session (the ASR
//! agent). Lifecycle status rides the same signal path as the other
//! engines.

use crate::driver::{AudioProperty, DriverCategory, RecorderDriver};
use crate::error::{MediaError, MediaResult};
use crate::registry::{DriverEntry, DriverRegistry};
use crate::signal::{valid_transition, DriverSignal, DriverSink, PlaybackState, SignalPayload};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voxkit_foundation::ClientConfig;
use voxkit_telemetry::ClientMetrics;

static NEXT_RECORDER_ID: AtomicU64 = AtomicU64::new(1);

/// Frames buffered between the capture thread and the consumer.
const FRAME_QUEUE_DEPTH: usize = 256;

/// One block of captured PCM.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Handle a recorder backend uses to hand off captured frames. Frames are
/// dropped (and counted) rather than blocking the capture thread when the
/// consumer falls behind.
#[derive(Clone)]
pub struct FrameSink {
    tx: mpsc::Sender<AudioFrame>,
    metrics: ClientMetrics,
}

impl FrameSink {
    pub fn push(&self, frame: AudioFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.metrics
                    .recorder_frames
                    .fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.metrics
                    .recorder_frames_dropped
                    .fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

/// A capture session bound to a recorder driver. `READY` on construction;
/// `start` completes asynchronously with a `PLAYING` (capturing) status.
pub struct RecorderSession {
    id: u64,
    entry: Arc<DriverEntry>,
    driver: Arc<dyn RecorderDriver>,
    state: Arc<Mutex<PlaybackState>>,
    generation: Arc<AtomicU64>,
    signal_tx: mpsc::Sender<DriverSignal>,
    pump: JoinHandle<()>,
    frames_rx: Option<mpsc::Receiver<AudioFrame>>,
    metrics: ClientMetrics,
}

impl RecorderSession {
    pub fn new(
        registry: &DriverRegistry,
        preferred_driver: Option<&str>,
        property: AudioProperty,
        config: &ClientConfig,
        metrics: ClientMetrics,
    ) -> MediaResult<Self> {
        let entry = registry.find(DriverCategory::Recorder, preferred_driver)?;
        let driver = entry
            .recorder()
            .cloned()
            .ok_or_else(|| MediaError::Configuration("entry is not a recorder driver".into()))?;

        let state = Arc::new(Mutex::new(PlaybackState::Idle));
        let generation = Arc::new(AtomicU64::new(0));
        let (signal_tx, mut signal_rx) = mpsc::channel(config.signal_queue_depth);

        let pump_state = state.clone();
        let pump_generation = generation.clone();
        let pump_metrics = metrics.clone();
        let pump = tokio::spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                let DriverSignal {
                    generation,
                    payload,
                    ..
                } = signal;
                match payload {
                    SignalPayload::Status(next) => {
                        if generation < pump_generation.load(Ordering::SeqCst) {
                            pump_metrics.mark_stale_signal();
                            continue;
                        }
                        let mut current = pump_state.lock();
                        if *current == next {
                            continue;
                        }
                        if !valid_transition(*current, next) {
                            pump_metrics.mark_invalid_transition();
                            tracing::warn!(
                                target: "voxkit::media",
                                "Invalid recorder transition dropped: {} -> {}",
                                *current,
                                next
                            );
                            continue;
                        }
                        *current = next;
                        pump_metrics.mark_transition();
                    }
                    SignalPayload::Event(event) => {
                        tracing::debug!(target: "voxkit::media", ?event, "Recorder event");
                    }
                    SignalPayload::Duration(_) | SignalPayload::Position(_) => {}
                }
            }
        });

        let (frames_tx, frames_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
        let frame_sink = FrameSink {
            tx: frames_tx,
            metrics: metrics.clone(),
        };

        let id = NEXT_RECORDER_ID.fetch_add(1, Ordering::SeqCst);
        entry.bind();
        // on open failure the session drops here: close, unbind, pump abort
        let session = Self {
            id,
            entry: entry.clone(),
            driver,
            state,
            generation,
            signal_tx,
            pump,
            frames_rx: Some(frames_rx),
            metrics,
        };

        let sink = session.sink(0);
        session.driver.open(&property, &frame_sink, &sink)?;
        *session.state.lock() = PlaybackState::Ready;
        tracing::debug!(
            target: "voxkit::media",
            driver = %entry.descriptor.name,
            "Recorder session opened"
        );
        Ok(session)
    }

    /// Begin capturing. Valid in `READY`.
    pub fn start(&self) -> MediaResult<()> {
        let current = *self.state.lock();
        if current != PlaybackState::Ready {
            return Err(MediaError::InvalidState {
                operation: "start",
                state: current,
            });
        }
        self.driver
            .start(&self.sink(self.generation.load(Ordering::SeqCst)))
    }

    /// Halt capturing. Bumps the generation so a late start completion is
    /// discarded.
    pub fn stop(&self) -> MediaResult<()> {
        let current = *self.state.lock();
        if !matches!(current, PlaybackState::Ready | PlaybackState::Playing) {
            return Err(MediaError::InvalidState {
                operation: "stop",
                state: current,
            });
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.driver.stop(&self.sink(generation))
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    /// Take the capture frame receiver. Yields `None` after the first call.
    pub fn take_frames(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.frames_rx.take()
    }

    fn sink(&self, generation: u64) -> DriverSink {
        DriverSink::new(
            self.id,
            generation,
            self.signal_tx.clone(),
            self.metrics.clone(),
        )
    }
}

impl Drop for RecorderSession {
    fn drop(&mut self) {
        self.driver.close(self.id);
        self.entry.unbind();
        self.pump.abort();
    }
}
