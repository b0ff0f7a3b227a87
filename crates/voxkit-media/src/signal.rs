//! Driver-emitted signals and their marshaling channel
//!
//! Driver backends run on their own threads. Everything they report comes
//! through a [`DriverSink`] into a bounded channel drained by the owning
//! engine's control task, so shared instance state is only ever mutated
//! there. Each sink is minted for one control request and stamped with that
//! request's generation; signals stamped older than the instance's current
//! generation are dropped as stale.

use std::fmt;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use voxkit_telemetry::ClientMetrics;

/// Identifier of a player instance (or pcm/recorder instance) within its
/// owning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Per-instance playback state machine.
///
/// `Idle → Ready → Playing ⇄ Paused`; `Playing|Paused|Ready → Stopped`;
/// `Stopped|Error → Ready` via a new source binding. `Error` is terminal
/// until the source is re-bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Ready,
    Playing,
    Paused,
    Stopped,
    Error,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "IDLE",
            PlaybackState::Ready => "READY",
            PlaybackState::Playing => "PLAYING",
            PlaybackState::Paused => "PAUSED",
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Error => "ERROR",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns whether `from -> to` is a legal state-machine edge. Same-state
/// reports are filtered before this check.
pub(crate) fn valid_transition(from: PlaybackState, to: PlaybackState) -> bool {
    use PlaybackState::*;
    matches!(
        (from, to),
        (Idle, Ready)
            | (Stopped, Ready)
            | (Error, Ready)
            | (Ready, Playing)
            | (Ready, Stopped)
            | (Playing, Paused)
            | (Playing, Stopped)
            | (Paused, Playing)
            | (Paused, Stopped)
            | (_, Error)
    )
}

/// Free-form domain signals from a driver. Unlike status, events are not
/// validated against the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    SourceChanged,
    Invalid,
    LoadFailed,
    Loaded,
    Underrun,
    BufferFull,
    EndOfStream,
}

#[derive(Debug, Clone)]
pub(crate) enum SignalPayload {
    Status(PlaybackState),
    Event(MediaEvent),
    Duration(u64),
    Position(u64),
}

#[derive(Debug, Clone)]
pub(crate) struct DriverSignal {
    pub instance: u64,
    pub generation: u64,
    pub payload: SignalPayload,
}

/// Handle a driver backend uses to report back to the engine.
///
/// Cloneable and cheap; a driver keeps the sink from the request that
/// started an operation and emits completions and spontaneous signals
/// (position, underrun, end-of-stream) through it from any thread.
#[derive(Clone)]
pub struct DriverSink {
    instance: u64,
    generation: u64,
    tx: mpsc::Sender<DriverSignal>,
    metrics: ClientMetrics,
}

impl DriverSink {
    pub(crate) fn new(
        instance: u64,
        generation: u64,
        tx: mpsc::Sender<DriverSignal>,
        metrics: ClientMetrics,
    ) -> Self {
        Self {
            instance,
            generation,
            tx,
            metrics,
        }
    }

    /// The instance this sink reports for.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Push a new playback status. Validated against the state machine and
    /// the generation counter by the engine before any callback fires.
    pub fn emit_status(&self, status: PlaybackState) {
        self.send(SignalPayload::Status(status));
    }

    /// Push a free-form media event.
    pub fn emit_event(&self, event: MediaEvent) {
        self.send(SignalPayload::Event(event));
    }

    /// Report the source duration once the backend knows it.
    pub fn emit_duration(&self, duration_ms: u64) {
        self.send(SignalPayload::Duration(duration_ms));
    }

    /// Report playback progress.
    pub fn emit_position(&self, position_ms: u64) {
        self.send(SignalPayload::Position(position_ms));
    }

    fn send(&self, payload: SignalPayload) {
        let signal = DriverSignal {
            instance: self.instance,
            generation: self.generation,
            payload,
        };
        if let Err(e) = self.tx.try_send(signal) {
            self.metrics
                .signal_queue_overflows
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: "voxkit::media",
                instance = self.instance,
                "Driver signal dropped, queue full or engine gone: {}",
                e
            );
        }
    }
}
