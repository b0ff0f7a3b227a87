//! Media player engine
//!
//! Owns every player instance, enforces the per-instance state machine, and
//! drains driver signals from a bounded channel on its own control task.
//! Transport requests never block: they validate state, hand the request to
//! the bound driver, and return; completion arrives through the status
//! callback.

use crate::driver::{DriverCategory, MediaSource, PlayerDriver};
use crate::error::{MediaError, MediaResult};
use crate::registry::{DriverEntry, DriverRegistry};
use crate::signal::{
    valid_transition, DriverSignal, DriverSink, MediaEvent, PlaybackState, PlayerId, SignalPayload,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voxkit_foundation::{ClientConfig, VOLUME_MAX, VOLUME_MIN};
use voxkit_telemetry::ClientMetrics;

pub type StatusCallback = Arc<dyn Fn(PlayerId, PlaybackState) + Send + Sync>;
pub type EventCallback = Arc<dyn Fn(PlayerId, MediaEvent) + Send + Sync>;

/// Non-owning view of one player instance, returned by `find`.
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub state: PlaybackState,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub volume: i32,
    pub source_uri: Option<String>,
}

struct PlayerCore {
    state: PlaybackState,
    source: Option<MediaSource>,
    driver: Option<Arc<DriverEntry>>,
    duration_ms: Option<u64>,
    position_ms: u64,
    volume: i32,
    status_cb: Option<StatusCallback>,
    event_cb: Option<EventCallback>,
}

struct PlayerInstance {
    id: PlayerId,
    /// Bumped by cancellation points (set_source, stop, destroy). Status and
    /// position signals stamped with an older generation are stale.
    generation: AtomicU64,
    core: Mutex<PlayerCore>,
}

struct EngineShared {
    players: Mutex<HashMap<u64, Arc<PlayerInstance>>>,
    metrics: ClientMetrics,
}

impl EngineShared {
    fn apply(&self, signal: DriverSignal) {
        let player = self.players.lock().get(&signal.instance).cloned();
        let Some(player) = player else {
            tracing::debug!(
                target: "voxkit::media",
                instance = signal.instance,
                "Signal for destroyed instance dropped"
            );
            return;
        };

        match signal.payload {
            SignalPayload::Status(next) => {
                if signal.generation < player.generation.load(Ordering::SeqCst) {
                    self.metrics.mark_stale_signal();
                    tracing::debug!(
                        target: "voxkit::media",
                        player = %player.id,
                        status = %next,
                        "Stale status dropped"
                    );
                    return;
                }
                let cb = {
                    let mut core = player.core.lock();
                    if core.state == next {
                        return;
                    }
                    if !valid_transition(core.state, next) {
                        self.metrics.mark_invalid_transition();
                        tracing::warn!(
                            target: "voxkit::media",
                            player = %player.id,
                            "Invalid driver transition dropped: {} -> {}",
                            core.state,
                            next
                        );
                        return;
                    }
                    tracing::debug!(
                        target: "voxkit::media",
                        player = %player.id,
                        "Status: {} -> {}",
                        core.state,
                        next
                    );
                    core.state = next;
                    core.status_cb.clone()
                };
                self.metrics.mark_transition();
                if next == PlaybackState::Error {
                    self.metrics.mark_driver_error();
                }
                if let Some(cb) = cb {
                    cb(player.id, next);
                }
            }
            SignalPayload::Event(event) => {
                let cb = player.core.lock().event_cb.clone();
                if let Some(cb) = cb {
                    cb(player.id, event);
                }
            }
            SignalPayload::Duration(duration_ms) => {
                player.core.lock().duration_ms = Some(duration_ms);
            }
            SignalPayload::Position(position_ms) => {
                if signal.generation < player.generation.load(Ordering::SeqCst) {
                    self.metrics.mark_stale_signal();
                    return;
                }
                player.core.lock().position_ms = position_ms;
            }
        }
    }
}

/// Engine owning zero or more player instances. Must be constructed inside
/// a Tokio runtime; the signal pump runs until the engine is dropped.
pub struct PlayerEngine {
    registry: Arc<DriverRegistry>,
    shared: Arc<EngineShared>,
    signal_tx: mpsc::Sender<DriverSignal>,
    pump: JoinHandle<()>,
    next_id: AtomicU64,
    max_players: usize,
    default_volume: i32,
    preferred_driver: Option<String>,
}

impl PlayerEngine {
    pub fn new(
        registry: Arc<DriverRegistry>,
        config: &ClientConfig,
        metrics: ClientMetrics,
    ) -> Self {
        let (signal_tx, mut signal_rx) = mpsc::channel(config.signal_queue_depth);
        let shared = Arc::new(EngineShared {
            players: Mutex::new(HashMap::new()),
            metrics,
        });

        let pump_shared = shared.clone();
        let pump = tokio::spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                pump_shared.apply(signal);
            }
            tracing::debug!(target: "voxkit::media", "Player signal pump stopped");
        });

        Self {
            registry,
            shared,
            signal_tx,
            pump,
            next_id: AtomicU64::new(1),
            max_players: config.max_players,
            default_volume: config.default_volume,
            preferred_driver: config.drivers.player.clone(),
        }
    }

    /// Allocate a new instance in `IDLE`.
    pub fn create(&self) -> MediaResult<PlayerId> {
        let mut players = self.shared.players.lock();
        if players.len() >= self.max_players {
            return Err(MediaError::Exhausted {
                limit: self.max_players,
            });
        }
        let id = PlayerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        players.insert(
            id.0,
            Arc::new(PlayerInstance {
                id,
                generation: AtomicU64::new(0),
                core: Mutex::new(PlayerCore {
                    state: PlaybackState::Idle,
                    source: None,
                    driver: None,
                    duration_ms: None,
                    position_ms: 0,
                    volume: self.default_volume,
                    status_cb: None,
                    event_cb: None,
                }),
            }),
        );
        drop(players);

        self.shared
            .metrics
            .players_created
            .fetch_add(1, Ordering::Relaxed);
        self.shared
            .metrics
            .players_live
            .fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "voxkit::media", player = %id, "Player created");
        Ok(id)
    }

    /// Release an instance. Rejected while `PLAYING` or `PAUSED`; the
    /// caller must `stop` first so the hardware tears down cleanly.
    pub fn destroy(&self, id: PlayerId) -> MediaResult<()> {
        let player = self.instance(id)?;
        let driver = {
            let core = player.core.lock();
            if matches!(core.state, PlaybackState::Playing | PlaybackState::Paused) {
                return Err(MediaError::InvalidState {
                    operation: "destroy",
                    state: core.state,
                });
            }
            core.driver.clone()
        };

        player.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(entry) = driver {
            if let Some(d) = entry.player() {
                d.close(id.0);
            }
            entry.unbind();
        }
        self.shared.players.lock().remove(&id.0);

        self.shared
            .metrics
            .players_destroyed
            .fetch_add(1, Ordering::Relaxed);
        self.shared
            .metrics
            .players_live
            .fetch_sub(1, Ordering::Relaxed);
        tracing::debug!(target: "voxkit::media", player = %id, "Player destroyed");
        Ok(())
    }

    /// Bind a source and select the driver (explicit in the source,
    /// configured preference, or category default). Valid in `IDLE`,
    /// `STOPPED`, and `ERROR` (the reset path); transitions to `READY`.
    pub fn set_source(&self, id: PlayerId, source: MediaSource) -> MediaResult<()> {
        let player = self.instance(id)?;
        let mut core = player.core.lock();
        if !matches!(
            core.state,
            PlaybackState::Idle | PlaybackState::Stopped | PlaybackState::Error
        ) {
            return Err(MediaError::InvalidState {
                operation: "set_source",
                state: core.state,
            });
        }

        let name = source
            .preferred_driver
            .clone()
            .or_else(|| self.preferred_driver.clone());
        let entry = self.registry.find(DriverCategory::Player, name.as_deref())?;
        let driver = entry
            .player()
            .cloned()
            .ok_or_else(|| MediaError::Configuration("entry is not a player driver".into()))?;
        if !driver.accepts(&source) {
            return Err(MediaError::UnsupportedSource {
                uri: source.uri.clone(),
            });
        }

        let generation = player.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let sink = self.sink(id, generation);
        driver.open(&source, &sink)?;

        if let Some(old) = core.driver.take() {
            if let Some(d) = old.player() {
                d.close(id.0);
            }
            old.unbind();
        }
        entry.bind();
        core.driver = Some(entry);
        core.source = Some(source);
        core.duration_ms = None;
        core.position_ms = 0;

        // the binding itself is the IDLE/STOPPED/ERROR -> READY edge; a
        // driver that also reports READY is deduplicated by the pump
        let previous = core.state;
        core.state = PlaybackState::Ready;
        let cb = core.status_cb.clone();
        drop(core);

        self.shared.metrics.mark_transition();
        tracing::debug!(
            target: "voxkit::media",
            player = %id,
            "Status: {} -> {}",
            previous,
            PlaybackState::Ready
        );
        if let Some(cb) = cb {
            cb(id, PlaybackState::Ready);
        }
        Ok(())
    }

    /// Request playback. Valid in `READY`; completion is the driver's
    /// `PLAYING` status.
    pub fn start(&self, id: PlayerId) -> MediaResult<()> {
        self.transport(id, "start", &[PlaybackState::Ready], false, |d, sink| {
            d.start(sink)
        })
    }

    /// Request a halt. Valid in `READY` (cancels an in-flight start),
    /// `PLAYING`, and `PAUSED`. Bumps the generation so any late completion
    /// of an earlier request is discarded; the instance race-free resolves
    /// to `STOPPED`.
    pub fn stop(&self, id: PlayerId) -> MediaResult<()> {
        self.transport(
            id,
            "stop",
            &[
                PlaybackState::Ready,
                PlaybackState::Playing,
                PlaybackState::Paused,
            ],
            true,
            |d, sink| d.stop(sink),
        )
    }

    pub fn pause(&self, id: PlayerId) -> MediaResult<()> {
        self.transport(id, "pause", &[PlaybackState::Playing], false, |d, sink| {
            d.pause(sink)
        })
    }

    pub fn resume(&self, id: PlayerId) -> MediaResult<()> {
        self.transport(id, "resume", &[PlaybackState::Paused], false, |d, sink| {
            d.resume(sink)
        })
    }

    /// Jump to `position_ms`. Valid while `PLAYING` or `PAUSED`; rejected
    /// with `OutOfRange` once a known duration is exceeded. Position only
    /// moves when the driver reports it applied.
    pub fn seek(&self, id: PlayerId, position_ms: u64) -> MediaResult<()> {
        let player = self.instance(id)?;
        let core = player.core.lock();
        if !matches!(core.state, PlaybackState::Playing | PlaybackState::Paused) {
            return Err(MediaError::InvalidState {
                operation: "seek",
                state: core.state,
            });
        }
        if let Some(duration_ms) = core.duration_ms {
            if position_ms > duration_ms {
                return Err(MediaError::OutOfRange {
                    position_ms,
                    duration_ms,
                });
            }
        }
        let (driver, sink) = self.driver_of(&player, &core)?;
        drop(core);
        driver.seek(&sink, position_ms)
    }

    /// Clamp to [0, 100], store, and forward to the driver best effort.
    /// Never fails on a valid instance.
    pub fn set_volume(&self, id: PlayerId, volume: i32) -> MediaResult<()> {
        let clamped = volume.clamp(VOLUME_MIN, VOLUME_MAX);
        let player = self.instance(id)?;
        let mut core = player.core.lock();
        core.volume = clamped;
        if let Some(entry) = core.driver.clone() {
            let sink = self.sink(id, player.generation.load(Ordering::SeqCst));
            drop(core);
            if let Some(d) = entry.player() {
                if let Err(e) = d.set_volume(&sink, clamped) {
                    tracing::warn!(
                        target: "voxkit::media",
                        player = %id,
                        "Driver ignored volume change: {}",
                        e
                    );
                }
            }
        }
        Ok(())
    }

    pub fn get_volume(&self, id: PlayerId) -> MediaResult<i32> {
        Ok(self.instance(id)?.core.lock().volume)
    }

    pub fn get_status(&self, id: PlayerId) -> MediaResult<PlaybackState> {
        Ok(self.instance(id)?.core.lock().state)
    }

    pub fn get_position(&self, id: PlayerId) -> MediaResult<u64> {
        Ok(self.instance(id)?.core.lock().position_ms)
    }

    /// Last reported duration; `None` until the driver knows it.
    pub fn get_duration(&self, id: PlayerId) -> MediaResult<Option<u64>> {
        Ok(self.instance(id)?.core.lock().duration_ms)
    }

    /// Non-owning lookup by identifier.
    pub fn find(&self, id: PlayerId) -> Option<PlayerSnapshot> {
        let player = self.shared.players.lock().get(&id.0).cloned()?;
        let core = player.core.lock();
        Some(PlayerSnapshot {
            id,
            state: core.state,
            position_ms: core.position_ms,
            duration_ms: core.duration_ms,
            volume: core.volume,
            source_uri: core.source.as_ref().map(|s| s.uri.clone()),
        })
    }

    /// Register the status callback; replaces any previous one.
    pub fn set_status_callback(
        &self,
        id: PlayerId,
        cb: impl Fn(PlayerId, PlaybackState) + Send + Sync + 'static,
    ) -> MediaResult<()> {
        self.instance(id)?.core.lock().status_cb = Some(Arc::new(cb));
        Ok(())
    }

    /// Register the event callback; replaces any previous one.
    pub fn set_event_callback(
        &self,
        id: PlayerId,
        cb: impl Fn(PlayerId, MediaEvent) + Send + Sync + 'static,
    ) -> MediaResult<()> {
        self.instance(id)?.core.lock().event_cb = Some(Arc::new(cb));
        Ok(())
    }

    pub fn player_count(&self) -> usize {
        self.shared.players.lock().len()
    }

    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    fn instance(&self, id: PlayerId) -> MediaResult<Arc<PlayerInstance>> {
        self.shared
            .players
            .lock()
            .get(&id.0)
            .cloned()
            .ok_or_else(|| MediaError::NotFound(format!("{id}")))
    }

    fn sink(&self, id: PlayerId, generation: u64) -> DriverSink {
        DriverSink::new(
            id.0,
            generation,
            self.signal_tx.clone(),
            self.shared.metrics.clone(),
        )
    }

    fn driver_of(
        &self,
        player: &Arc<PlayerInstance>,
        core: &PlayerCore,
    ) -> MediaResult<(Arc<dyn PlayerDriver>, DriverSink)> {
        let entry = core.driver.clone().ok_or(MediaError::InvalidState {
            operation: "transport",
            state: core.state,
        })?;
        let driver = entry
            .player()
            .cloned()
            .ok_or_else(|| MediaError::Configuration("entry is not a player driver".into()))?;
        let sink = self.sink(player.id, player.generation.load(Ordering::SeqCst));
        Ok((driver, sink))
    }

    fn transport(
        &self,
        id: PlayerId,
        operation: &'static str,
        allowed: &[PlaybackState],
        bump_generation: bool,
        f: impl FnOnce(&Arc<dyn PlayerDriver>, &DriverSink) -> MediaResult<()>,
    ) -> MediaResult<()> {
        let player = self.instance(id)?;
        let core = player.core.lock();
        if !allowed.contains(&core.state) {
            return Err(MediaError::InvalidState {
                operation,
                state: core.state,
            });
        }
        let entry = core.driver.clone().ok_or(MediaError::InvalidState {
            operation,
            state: core.state,
        })?;
        let driver = entry
            .player()
            .cloned()
            .ok_or_else(|| MediaError::Configuration("entry is not a player driver".into()))?;
        let generation = if bump_generation {
            player.generation.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            player.generation.load(Ordering::SeqCst)
        };
        let sink = self.sink(id, generation);
        drop(core);

        tracing::debug!(target: "voxkit::media", player = %id, operation, "Transport request");
        f(&driver, &sink)
    }
}

impl Drop for PlayerEngine {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverDescriptor, DriverOps};
    use crate::drivers::NullPlayerDriver;
    use std::time::Duration;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use tokio::time::timeout;

    /// Driver that completes nothing on its own; tests drive emissions
    /// through the sinks captured per request.
    #[derive(Default)]
    struct ManualDriver {
        sinks: Mutex<HashMap<&'static str, DriverSink>>,
    }

    impl ManualDriver {
        fn sink(&self, op: &str) -> DriverSink {
            self.sinks.lock().get(op).cloned().expect("sink captured")
        }

        fn capture(&self, op: &'static str, sink: &DriverSink) {
            self.sinks.lock().insert(op, sink.clone());
        }
    }

    impl PlayerDriver for ManualDriver {
        fn open(&self, _source: &MediaSource, sink: &DriverSink) -> MediaResult<()> {
            self.capture("open", sink);
            Ok(())
        }
        fn start(&self, sink: &DriverSink) -> MediaResult<()> {
            self.capture("start", sink);
            Ok(())
        }
        fn stop(&self, sink: &DriverSink) -> MediaResult<()> {
            self.capture("stop", sink);
            Ok(())
        }
        fn pause(&self, sink: &DriverSink) -> MediaResult<()> {
            self.capture("pause", sink);
            Ok(())
        }
        fn resume(&self, sink: &DriverSink) -> MediaResult<()> {
            self.capture("resume", sink);
            Ok(())
        }
        fn seek(&self, sink: &DriverSink, _position_ms: u64) -> MediaResult<()> {
            self.capture("seek", sink);
            Ok(())
        }
        fn close(&self, _instance: u64) {}
    }

    fn engine_with(ops: DriverOps) -> PlayerEngine {
        let registry = Arc::new(DriverRegistry::new());
        registry
            .register(DriverDescriptor::new("test", DriverCategory::Player), ops)
            .unwrap();
        PlayerEngine::new(
            registry,
            &ClientConfig::default(),
            ClientMetrics::default(),
        )
    }

    fn null_engine(duration_ms: Option<u64>) -> PlayerEngine {
        let driver = match duration_ms {
            Some(d) => NullPlayerDriver::with_duration(d),
            None => NullPlayerDriver::new(),
        };
        engine_with(DriverOps::Player(Arc::new(driver)))
    }

    fn status_probe(
        engine: &PlayerEngine,
        id: PlayerId,
    ) -> UnboundedReceiver<PlaybackState> {
        let (tx, rx) = unbounded_channel();
        engine
            .set_status_callback(id, move |_, status| {
                let _ = tx.send(status);
            })
            .unwrap();
        rx
    }

    async fn next_status(rx: &mut UnboundedReceiver<PlaybackState>) -> PlaybackState {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("status within deadline")
            .expect("probe alive")
    }

    #[tokio::test]
    async fn start_then_pause_scenario() {
        let engine = null_engine(None);
        let id = engine.create().unwrap();
        let mut rx = status_probe(&engine, id);

        engine.set_source(id, MediaSource::url("a.mp3")).unwrap();
        assert_eq!(next_status(&mut rx).await, PlaybackState::Ready);

        engine.start(id).unwrap();
        assert_eq!(next_status(&mut rx).await, PlaybackState::Playing);

        engine.pause(id).unwrap();
        assert_eq!(next_status(&mut rx).await, PlaybackState::Paused);
        assert_eq!(engine.get_status(id).unwrap(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn restart_cycle_never_skips_ready() {
        let engine = null_engine(None);
        let id = engine.create().unwrap();
        let mut rx = status_probe(&engine, id);
        let mut observed = Vec::new();

        engine.set_source(id, MediaSource::url("a.mp3")).unwrap();
        observed.push(next_status(&mut rx).await);
        engine.start(id).unwrap();
        observed.push(next_status(&mut rx).await);
        engine.stop(id).unwrap();
        observed.push(next_status(&mut rx).await);
        engine.set_source(id, MediaSource::url("b.mp3")).unwrap();
        observed.push(next_status(&mut rx).await);
        engine.start(id).unwrap();
        observed.push(next_status(&mut rx).await);

        use PlaybackState::*;
        assert_eq!(observed, vec![Ready, Playing, Stopped, Ready, Playing]);
    }

    #[tokio::test]
    async fn seek_past_duration_fails_and_position_unchanged() {
        let engine = null_engine(Some(10_000));
        let id = engine.create().unwrap();
        let mut rx = status_probe(&engine, id);

        engine.set_source(id, MediaSource::url("a.mp3")).unwrap();
        engine.start(id).unwrap();
        while next_status(&mut rx).await != PlaybackState::Playing {}
        // duration rides the same queue as the status we just saw
        assert_eq!(engine.get_duration(id).unwrap(), Some(10_000));

        let err = engine.seek(id, 20_000).unwrap_err();
        assert!(matches!(err, MediaError::OutOfRange { .. }));
        assert_eq!(engine.get_position(id).unwrap(), 0);
    }

    #[tokio::test]
    async fn volume_clamps_and_is_idempotent() {
        let engine = null_engine(None);
        let id = engine.create().unwrap();

        engine.set_volume(id, 150).unwrap();
        assert_eq!(engine.get_volume(id).unwrap(), 100);
        engine.set_volume(id, 150).unwrap();
        assert_eq!(engine.get_volume(id).unwrap(), 100);
        engine.set_volume(id, -10).unwrap();
        assert_eq!(engine.get_volume(id).unwrap(), 0);
    }

    #[tokio::test]
    async fn stale_playing_status_cannot_regress_stop() {
        let driver = Arc::new(ManualDriver::default());
        let engine = engine_with(DriverOps::Player(driver.clone()));
        let id = engine.create().unwrap();
        let mut rx = status_probe(&engine, id);
        let (event_tx, mut event_rx) = unbounded_channel();
        engine
            .set_event_callback(id, move |_, event| {
                let _ = event_tx.send(event);
            })
            .unwrap();

        engine.set_source(id, MediaSource::url("a.mp3")).unwrap();
        assert_eq!(next_status(&mut rx).await, PlaybackState::Ready);

        // start is in flight: the driver captured the sink but has not
        // completed yet when stop arrives
        engine.start(id).unwrap();
        let start_sink = driver.sink("start");
        engine.stop(id).unwrap();
        driver.sink("stop").emit_status(PlaybackState::Stopped);
        assert_eq!(next_status(&mut rx).await, PlaybackState::Stopped);

        // the late start completion must not move the instance backward
        start_sink.emit_status(PlaybackState::Playing);
        // marker event behind the stale status on the same FIFO queue
        driver.sink("stop").emit_event(MediaEvent::EndOfStream);
        timeout(Duration::from_secs(1), event_rx.recv())
            .await
            .expect("marker event")
            .expect("probe alive");

        assert_eq!(engine.get_status(id).unwrap(), PlaybackState::Stopped);
    }

    #[tokio::test]
    async fn driver_error_is_terminal_until_new_source() {
        let driver = Arc::new(ManualDriver::default());
        let engine = engine_with(DriverOps::Player(driver.clone()));
        let id = engine.create().unwrap();
        let mut rx = status_probe(&engine, id);

        engine.set_source(id, MediaSource::url("a.mp3")).unwrap();
        assert_eq!(next_status(&mut rx).await, PlaybackState::Ready);
        engine.start(id).unwrap();
        driver.sink("start").emit_status(PlaybackState::Error);
        assert_eq!(next_status(&mut rx).await, PlaybackState::Error);

        assert!(matches!(
            engine.start(id),
            Err(MediaError::InvalidState { .. })
        ));

        // re-binding a source is the documented reset path
        engine.set_source(id, MediaSource::url("b.mp3")).unwrap();
        assert_eq!(next_status(&mut rx).await, PlaybackState::Ready);
    }

    #[tokio::test]
    async fn destroy_rejected_while_playing() {
        let engine = null_engine(None);
        let id = engine.create().unwrap();
        let mut rx = status_probe(&engine, id);

        engine.set_source(id, MediaSource::url("a.mp3")).unwrap();
        engine.start(id).unwrap();
        while next_status(&mut rx).await != PlaybackState::Playing {}

        assert!(matches!(
            engine.destroy(id),
            Err(MediaError::InvalidState { .. })
        ));

        engine.stop(id).unwrap();
        assert_eq!(next_status(&mut rx).await, PlaybackState::Stopped);
        engine.destroy(id).unwrap();
        assert!(engine.find(id).is_none());
    }

    #[tokio::test]
    async fn transport_rejected_without_source() {
        let engine = null_engine(None);
        let id = engine.create().unwrap();
        assert!(matches!(
            engine.start(id),
            Err(MediaError::InvalidState { .. })
        ));
        assert!(matches!(
            engine.pause(id),
            Err(MediaError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn unsupported_source_rejected() {
        struct Mp3Only;
        impl PlayerDriver for Mp3Only {
            fn accepts(&self, source: &MediaSource) -> bool {
                source.uri.ends_with(".mp3")
            }
            fn open(&self, _source: &MediaSource, _sink: &DriverSink) -> MediaResult<()> {
                Ok(())
            }
            fn start(&self, _sink: &DriverSink) -> MediaResult<()> {
                Ok(())
            }
            fn stop(&self, _sink: &DriverSink) -> MediaResult<()> {
                Ok(())
            }
            fn pause(&self, _sink: &DriverSink) -> MediaResult<()> {
                Ok(())
            }
            fn resume(&self, _sink: &DriverSink) -> MediaResult<()> {
                Ok(())
            }
            fn seek(&self, _sink: &DriverSink, _position_ms: u64) -> MediaResult<()> {
                Ok(())
            }
            fn close(&self, _instance: u64) {}
        }

        let engine = engine_with(DriverOps::Player(Arc::new(Mp3Only)));
        let id = engine.create().unwrap();
        assert!(matches!(
            engine.set_source(id, MediaSource::url("a.ogg")),
            Err(MediaError::UnsupportedSource { .. })
        ));
        engine.set_source(id, MediaSource::url("a.mp3")).unwrap();
    }

    #[tokio::test]
    async fn creation_fails_on_exhaustion() {
        let registry = Arc::new(DriverRegistry::new());
        registry
            .register(
                DriverDescriptor::new("null", DriverCategory::Player),
                DriverOps::Player(Arc::new(NullPlayerDriver::new())),
            )
            .unwrap();
        let config = ClientConfig {
            max_players: 1,
            ..ClientConfig::default()
        };
        let engine = PlayerEngine::new(registry, &config, ClientMetrics::default());

        let id = engine.create().unwrap();
        assert!(matches!(
            engine.create(),
            Err(MediaError::Exhausted { limit: 1 })
        ));
        engine.destroy(id).unwrap();
        engine.create().unwrap();
    }

    #[tokio::test]
    async fn bound_driver_cannot_be_unregistered() {
        let registry = Arc::new(DriverRegistry::new());
        registry
            .register(
                DriverDescriptor::new("null", DriverCategory::Player),
                DriverOps::Player(Arc::new(NullPlayerDriver::new())),
            )
            .unwrap();
        let engine = PlayerEngine::new(
            registry.clone(),
            &ClientConfig::default(),
            ClientMetrics::default(),
        );

        let id = engine.create().unwrap();
        engine.set_source(id, MediaSource::url("a.mp3")).unwrap();

        assert!(matches!(
            registry.unregister(DriverCategory::Player, "null"),
            Err(MediaError::InUse { .. })
        ));

        engine.destroy(id).unwrap();
        registry.unregister(DriverCategory::Player, "null").unwrap();
    }

    #[tokio::test]
    async fn callbacks_replace_not_append() {
        let engine = null_engine(None);
        let id = engine.create().unwrap();

        let (old_tx, mut old_rx) = unbounded_channel();
        engine
            .set_status_callback(id, move |_, status| {
                let _ = old_tx.send(status);
            })
            .unwrap();
        let mut rx = status_probe(&engine, id); // replaces the first callback

        engine.set_source(id, MediaSource::url("a.mp3")).unwrap();
        assert_eq!(next_status(&mut rx).await, PlaybackState::Ready);
        assert!(old_rx.try_recv().is_err());
    }
}
