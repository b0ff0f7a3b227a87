//! PCM channel
//!
//! Byte-stream sibling of the player for synthesized speech: the client
//! pushes raw PCM (TTS audio attachments) into the channel buffer, the
//! bound pcm driver drains it through a [`PcmStream`] handle. Transport,
//! callbacks, generation stamping, and state validation mirror the player
//! engine.

use crate::driver::{AudioProperty, DriverCategory, PcmDriver};
use crate::error::{MediaError, MediaResult};
use crate::registry::{DriverEntry, DriverRegistry};
use crate::signal::{
    valid_transition, DriverSignal, DriverSink, MediaEvent, PlaybackState, SignalPayload,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voxkit_foundation::{ClientConfig, VOLUME_MAX, VOLUME_MIN};
use voxkit_telemetry::ClientMetrics;

static NEXT_PCM_ID: AtomicU64 = AtomicU64::new(1);

pub type PcmStatusCallback = Arc<dyn Fn(PlaybackState) + Send + Sync>;
pub type PcmEventCallback = Arc<dyn Fn(MediaEvent) + Send + Sync>;

struct PcmCore {
    state: PlaybackState,
    volume: i32,
    buffer: VecDeque<u8>,
    eof: bool,
    status_cb: Option<PcmStatusCallback>,
    event_cb: Option<PcmEventCallback>,
}

struct PcmShared {
    name: String,
    generation: AtomicU64,
    core: Mutex<PcmCore>,
    metrics: ClientMetrics,
}

impl PcmShared {
    fn apply(&self, signal: DriverSignal) {
        match signal.payload {
            SignalPayload::Status(next) => {
                if signal.generation < self.generation.load(Ordering::SeqCst) {
                    self.metrics.mark_stale_signal();
                    return;
                }
                let cb = {
                    let mut core = self.core.lock();
                    if core.state == next {
                        return;
                    }
                    if !valid_transition(core.state, next) {
                        self.metrics.mark_invalid_transition();
                        tracing::warn!(
                            target: "voxkit::media",
                            channel = %self.name,
                            "Invalid pcm transition dropped: {} -> {}",
                            core.state,
                            next
                        );
                        return;
                    }
                    core.state = next;
                    core.status_cb.clone()
                };
                self.metrics.mark_transition();
                if next == PlaybackState::Error {
                    self.metrics.mark_driver_error();
                }
                if let Some(cb) = cb {
                    cb(next);
                }
            }
            SignalPayload::Event(event) => {
                let cb = self.core.lock().event_cb.clone();
                if let Some(cb) = cb {
                    cb(event);
                }
            }
            // pcm channels have no seekable timeline
            SignalPayload::Duration(_) | SignalPayload::Position(_) => {}
        }
    }
}

/// Driver-facing read handle onto the channel buffer. Safe to use from
/// driver-owned threads.
#[derive(Clone)]
pub struct PcmStream {
    shared: Arc<PcmShared>,
}

impl PcmStream {
    /// Drain up to `buf.len()` bytes. Returns the number of bytes copied.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut core = self.shared.core.lock();
        let n = buf.len().min(core.buffer.len());
        for (dst, src) in buf.iter_mut().zip(core.buffer.drain(..n)) {
            *dst = src;
        }
        drop(core);
        self.shared
            .metrics
            .pcm_bytes_read
            .fetch_add(n as u64, Ordering::Relaxed);
        n
    }

    /// Bytes currently buffered.
    pub fn data_size(&self) -> usize {
        self.shared.core.lock().buffer.len()
    }

    /// Whether the producer marked the stream complete.
    pub fn eof(&self) -> bool {
        let core = self.shared.core.lock();
        core.eof && core.buffer.is_empty()
    }
}

/// One pcm playback session bound to a pcm driver.
pub struct PcmChannel {
    id: u64,
    shared: Arc<PcmShared>,
    entry: Arc<DriverEntry>,
    driver: Arc<dyn PcmDriver>,
    property: AudioProperty,
    signal_tx: mpsc::Sender<DriverSignal>,
    pump: JoinHandle<()>,
}

impl PcmChannel {
    /// Open a channel on the named (or default) pcm driver. The channel is
    /// `READY` on return. Must be called inside a Tokio runtime.
    pub fn new(
        name: impl Into<String>,
        registry: &DriverRegistry,
        preferred_driver: Option<&str>,
        property: AudioProperty,
        config: &ClientConfig,
        metrics: ClientMetrics,
    ) -> MediaResult<Self> {
        let entry = registry.find(DriverCategory::Pcm, preferred_driver)?;
        let driver = entry
            .pcm()
            .cloned()
            .ok_or_else(|| MediaError::Configuration("entry is not a pcm driver".into()))?;

        let shared = Arc::new(PcmShared {
            name: name.into(),
            generation: AtomicU64::new(0),
            core: Mutex::new(PcmCore {
                state: PlaybackState::Idle,
                volume: config.default_volume,
                buffer: VecDeque::new(),
                eof: false,
                status_cb: None,
                event_cb: None,
            }),
            metrics: metrics.clone(),
        });

        let (signal_tx, mut signal_rx) = mpsc::channel(config.signal_queue_depth);
        let pump_shared = shared.clone();
        let pump = tokio::spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                pump_shared.apply(signal);
            }
        });

        let id = NEXT_PCM_ID.fetch_add(1, Ordering::SeqCst);
        entry.bind();
        // on open failure the channel drops here: close, unbind, pump abort
        let channel = Self {
            id,
            shared,
            entry: entry.clone(),
            driver,
            property,
            signal_tx,
            pump,
        };

        let sink = channel.sink(0);
        channel.driver.open(&property, &channel.stream(), &sink)?;
        channel.shared.core.lock().state = PlaybackState::Ready;
        channel.shared.metrics.mark_transition();
        tracing::debug!(
            target: "voxkit::media",
            channel = %channel.shared.name,
            driver = %entry.descriptor.name,
            "Pcm channel opened"
        );
        Ok(channel)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn property(&self) -> AudioProperty {
        self.property
    }

    /// The driver-facing read handle.
    pub fn stream(&self) -> PcmStream {
        PcmStream {
            shared: self.shared.clone(),
        }
    }

    /// Append bytes to the buffer; `last` marks end of stream. Valid while
    /// `READY`, `PLAYING`, or `PAUSED`.
    pub fn push_data(&self, data: &[u8], last: bool) -> MediaResult<usize> {
        {
            let mut core = self.shared.core.lock();
            if !matches!(
                core.state,
                PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
            ) {
                return Err(MediaError::InvalidState {
                    operation: "push_data",
                    state: core.state,
                });
            }
            core.buffer.extend(data.iter().copied());
            if last {
                core.eof = true;
            }
        }
        self.shared
            .metrics
            .pcm_bytes_pushed
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        self.driver
            .notify_data(&self.stream(), &self.sink(self.generation()));
        Ok(data.len())
    }

    /// Bytes currently buffered and not yet drained by the driver.
    pub fn data_size(&self) -> usize {
        self.shared.core.lock().buffer.len()
    }

    pub fn start(&self) -> MediaResult<()> {
        self.check_state("start", &[PlaybackState::Ready])?;
        self.driver
            .start(&self.stream(), &self.sink(self.generation()))
    }

    /// Halt the stream. Bumps the generation so late completions of earlier
    /// requests are discarded.
    pub fn stop(&self) -> MediaResult<()> {
        self.check_state(
            "stop",
            &[
                PlaybackState::Ready,
                PlaybackState::Playing,
                PlaybackState::Paused,
            ],
        )?;
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.driver.stop(&self.sink(generation))
    }

    pub fn pause(&self) -> MediaResult<()> {
        self.check_state("pause", &[PlaybackState::Playing])?;
        self.driver.pause(&self.sink(self.generation()))
    }

    pub fn resume(&self) -> MediaResult<()> {
        self.check_state("resume", &[PlaybackState::Paused])?;
        self.driver
            .resume(&self.stream(), &self.sink(self.generation()))
    }

    /// Clamp to [0, 100] and forward to the driver best effort.
    pub fn set_volume(&self, volume: i32) -> MediaResult<()> {
        let clamped = volume.clamp(VOLUME_MIN, VOLUME_MAX);
        self.shared.core.lock().volume = clamped;
        if let Err(e) = self
            .driver
            .set_volume(&self.sink(self.generation()), clamped)
        {
            tracing::warn!(
                target: "voxkit::media",
                channel = %self.shared.name,
                "Driver ignored volume change: {}",
                e
            );
        }
        Ok(())
    }

    pub fn get_volume(&self) -> i32 {
        self.shared.core.lock().volume
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.core.lock().state
    }

    /// Register the status callback; replaces any previous one.
    pub fn set_status_callback(&self, cb: impl Fn(PlaybackState) + Send + Sync + 'static) {
        self.shared.core.lock().status_cb = Some(Arc::new(cb));
    }

    /// Register the event callback; replaces any previous one.
    pub fn set_event_callback(&self, cb: impl Fn(MediaEvent) + Send + Sync + 'static) {
        self.shared.core.lock().event_cb = Some(Arc::new(cb));
    }

    fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    fn sink(&self, generation: u64) -> DriverSink {
        DriverSink::new(
            self.id,
            generation,
            self.signal_tx.clone(),
            self.shared.metrics.clone(),
        )
    }

    fn check_state(&self, operation: &'static str, allowed: &[PlaybackState]) -> MediaResult<()> {
        let core = self.shared.core.lock();
        if !allowed.contains(&core.state) {
            return Err(MediaError::InvalidState {
                operation,
                state: core.state,
            });
        }
        Ok(())
    }
}

impl Drop for PcmChannel {
    fn drop(&mut self) {
        self.driver.close(self.id);
        self.entry.unbind();
        self.pump.abort();
    }
}
