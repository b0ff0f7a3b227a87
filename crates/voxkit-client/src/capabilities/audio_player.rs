//! AudioPlayer agent
//!
//! Owns one player instance in the media engine and translates engine
//! status into playback events and player activity. `Play` preempts
//! whatever is currently audible: the agent stops the instance, awaits the
//! engine's halt report, then binds the new source.

use crate::builder::{CapabilityContext, CapabilityFactory};
use crate::capabilities::media_err;
use crate::error::ClientResult;
use crate::hub::CapabilityEmitter;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use voxkit_capability::{
    CapabilityError, CapabilityHandler, CapabilityKind, CapabilityResult, Directive, ListenerSet,
};
use voxkit_media::{MediaEvent, MediaSource, PlaybackState, PlayerEngine, PlayerId};

/// Externally visible player activity, as reported in the cloud context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerActivity {
    Idle,
    Playing,
    Paused,
    Stopped,
    Finished,
}

impl PlayerActivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerActivity::Idle => "IDLE",
            PlayerActivity::Playing => "PLAYING",
            PlayerActivity::Paused => "PAUSED",
            PlayerActivity::Stopped => "STOPPED",
            PlayerActivity::Finished => "FINISHED",
        }
    }
}

/// Domain events for application code (UI playback indicators etc).
pub trait AudioPlayerListener: Send + Sync {
    fn on_activity(&self, activity: PlayerActivity);
}

struct AudioPlayerInner {
    engine: Arc<PlayerEngine>,
    emitter: CapabilityEmitter,
    loading_timeout: Duration,
    player: Mutex<Option<PlayerId>>,
    token: Mutex<Option<String>>,
    listeners: ListenerSet<dyn AudioPlayerListener>,
    activity_tx: watch::Sender<PlayerActivity>,
    activity_rx: watch::Receiver<PlayerActivity>,
}

impl AudioPlayerInner {
    fn set_activity(&self, activity: PlayerActivity) {
        let _ = self.activity_tx.send(activity);
        self.listeners.notify(|l| l.on_activity(activity));
        self.emitter
            .status(json!({ "playerActivity": activity.as_str() }));
    }

    fn on_player_status(&self, status: PlaybackState) {
        let previous = *self.activity_rx.borrow();
        match status {
            PlaybackState::Playing => {
                let name = if previous == PlayerActivity::Paused {
                    "PlaybackResumed"
                } else {
                    "PlaybackStarted"
                };
                self.set_activity(PlayerActivity::Playing);
                self.emit_playback(name, json!({}));
            }
            PlaybackState::Paused => {
                self.set_activity(PlayerActivity::Paused);
                self.emit_playback("PlaybackPaused", json!({}));
            }
            PlaybackState::Stopped => {
                if matches!(previous, PlayerActivity::Playing | PlayerActivity::Paused) {
                    self.set_activity(PlayerActivity::Stopped);
                    self.emit_playback("PlaybackStopped", json!({}));
                } else {
                    // halt after finish (or before start) changes no
                    // externally visible activity
                    let _ = self.activity_tx.send(PlayerActivity::Stopped);
                }
            }
            PlaybackState::Error => {
                self.set_activity(PlayerActivity::Stopped);
                self.emit_playback(
                    "PlaybackFailed",
                    json!({ "error": "MEDIA_ERROR_INTERNAL_DEVICE_ERROR" }),
                );
            }
            PlaybackState::Idle | PlaybackState::Ready => {}
        }
    }

    fn on_player_event(&self, event: MediaEvent) {
        match event {
            MediaEvent::EndOfStream => {
                self.set_activity(PlayerActivity::Finished);
                self.emit_playback("PlaybackFinished", json!({}));
            }
            MediaEvent::LoadFailed => {
                self.emit_playback("PlaybackFailed", json!({ "error": "MEDIA_LOAD_FAILED" }));
            }
            MediaEvent::Underrun | MediaEvent::BufferFull => {
                tracing::debug!(target: "voxkit::client", ?event, "Buffer report");
            }
            _ => {}
        }
    }

    fn emit_playback(&self, name: &str, mut payload: serde_json::Value) {
        let offset = (*self.player.lock())
            .and_then(|id| self.engine.get_position(id).ok())
            .unwrap_or(0);
        if let Some(object) = payload.as_object_mut() {
            object.insert("token".into(), json!(self.token.lock().clone()));
            object.insert("offsetInMilliseconds".into(), json!(offset));
        }
        self.emitter.event(name, payload);
    }
}

pub struct AudioPlayerAgent {
    inner: Arc<AudioPlayerInner>,
}

impl AudioPlayerAgent {
    pub fn new(ctx: &CapabilityContext) -> Self {
        let (activity_tx, activity_rx) = watch::channel(PlayerActivity::Idle);
        Self {
            inner: Arc::new(AudioPlayerInner {
                engine: ctx.engine.clone(),
                emitter: ctx.emitter(CapabilityKind::AudioPlayer),
                loading_timeout: Duration::from_secs(ctx.config.loading_timeout_secs),
                player: Mutex::new(None),
                token: Mutex::new(None),
                listeners: ListenerSet::new(),
                activity_tx,
                activity_rx,
            }),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn AudioPlayerListener>) {
        self.inner.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn AudioPlayerListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    pub fn activity(&self) -> PlayerActivity {
        *self.inner.activity_rx.borrow()
    }

    /// The player instance id, once one exists. Non-owning.
    pub fn player_id(&self) -> Option<PlayerId> {
        *self.inner.player.lock()
    }

    fn ensure_player(&self) -> CapabilityResult<PlayerId> {
        let mut slot = self.inner.player.lock();
        if let Some(id) = *slot {
            return Ok(id);
        }
        let id = self.inner.engine.create().map_err(media_err)?;
        let inner = self.inner.clone();
        self.inner
            .engine
            .set_status_callback(id, move |_, status| inner.on_player_status(status))
            .map_err(media_err)?;
        let inner = self.inner.clone();
        self.inner
            .engine
            .set_event_callback(id, move |_, event| inner.on_player_event(event))
            .map_err(media_err)?;
        *slot = Some(id);
        Ok(id)
    }

    fn current_player(&self) -> CapabilityResult<PlayerId> {
        (*self.inner.player.lock())
            .ok_or_else(|| CapabilityError::InvalidState("no active player".into()))
    }

    async fn play(&self, directive: &Directive) -> CapabilityResult<()> {
        let url = directive
            .payload
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CapabilityError::Payload("Play requires a url".into()))?;
        let token = directive
            .payload
            .get("token")
            .and_then(|v| v.as_str())
            .map(String::from);

        let id = self.ensure_player()?;
        let status = self.inner.engine.get_status(id).map_err(media_err)?;
        if matches!(status, PlaybackState::Playing | PlaybackState::Paused) {
            self.halt_and_wait(id).await?;
        }

        *self.inner.token.lock() = token;
        self.inner
            .engine
            .set_source(id, MediaSource::url(url))
            .map_err(media_err)?;
        self.inner.engine.start(id).map_err(media_err)?;
        Ok(())
    }

    /// Stop the instance and suspend until the engine reports the halt.
    /// This is the pipeline's suspension point: completion arrives via the
    /// status callback, never from the transport call itself.
    async fn halt_and_wait(&self, id: PlayerId) -> CapabilityResult<()> {
        let mut rx = self.inner.activity_rx.clone();
        self.inner.engine.stop(id).map_err(media_err)?;
        let halted = async {
            loop {
                if matches!(
                    self.inner.engine.get_status(id),
                    Ok(PlaybackState::Stopped) | Err(_)
                ) {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        };
        tokio::time::timeout(self.inner.loading_timeout, halted)
            .await
            .map_err(|_| CapabilityError::InvalidState("player did not halt in time".into()))
    }

    fn seek(&self, directive: &Directive) -> CapabilityResult<()> {
        let position_ms = directive
            .payload
            .get("offsetInMilliseconds")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                CapabilityError::Payload("Seek requires offsetInMilliseconds".into())
            })?;
        let id = self.current_player()?;
        self.inner.engine.seek(id, position_ms).map_err(media_err)
    }
}

#[async_trait]
impl CapabilityHandler for AudioPlayerAgent {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::AudioPlayer
    }

    async fn handle_directive(&self, directive: Directive) -> CapabilityResult<()> {
        match directive.name.as_str() {
            "Play" => self.play(&directive).await,
            "Stop" => {
                let id = self.current_player()?;
                self.inner.engine.stop(id).map_err(media_err)
            }
            "Pause" => {
                let id = self.current_player()?;
                self.inner.engine.pause(id).map_err(media_err)
            }
            "Resume" => {
                let id = self.current_player()?;
                self.inner.engine.resume(id).map_err(media_err)
            }
            "Seek" => self.seek(&directive),
            other => Err(CapabilityError::UnknownDirective {
                capability: self.kind(),
                name: other.to_string(),
            }),
        }
    }

    fn state(&self) -> serde_json::Value {
        let offset = (*self.inner.player.lock())
            .and_then(|id| self.inner.engine.get_position(id).ok())
            .unwrap_or(0);
        json!({
            "playerActivity": self.activity().as_str(),
            "offsetInMilliseconds": offset,
            "token": self.inner.token.lock().clone(),
        })
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub struct AudioPlayerFactory;

impl CapabilityFactory for AudioPlayerFactory {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::AudioPlayer
    }

    fn create(&self, ctx: &CapabilityContext) -> ClientResult<Arc<dyn CapabilityHandler>> {
        Ok(Arc::new(AudioPlayerAgent::new(ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::testutil::test_context;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::timeout;

    struct ActivityProbe {
        tx: tokio::sync::mpsc::UnboundedSender<PlayerActivity>,
    }

    impl AudioPlayerListener for ActivityProbe {
        fn on_activity(&self, activity: PlayerActivity) {
            let _ = self.tx.send(activity);
        }
    }

    fn play_directive(url: &str) -> Directive {
        Directive::new(
            CapabilityKind::AudioPlayer,
            "Play",
            json!({ "url": url, "token": "tok-1" }),
        )
    }

    async fn next(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<PlayerActivity>,
    ) -> PlayerActivity {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("activity within deadline")
            .expect("probe alive")
    }

    #[tokio::test]
    async fn play_pause_resume_stop_flow() {
        let ctx = test_context();
        let agent = AudioPlayerAgent::new(&ctx);
        let (tx, mut rx) = unbounded_channel();
        agent.add_listener(Arc::new(ActivityProbe { tx }));

        agent
            .handle_directive(play_directive("https://cdn/a.mp3"))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, PlayerActivity::Playing);

        agent
            .handle_directive(Directive::new(
                CapabilityKind::AudioPlayer,
                "Pause",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, PlayerActivity::Paused);

        agent
            .handle_directive(Directive::new(
                CapabilityKind::AudioPlayer,
                "Resume",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, PlayerActivity::Playing);

        agent
            .handle_directive(Directive::new(
                CapabilityKind::AudioPlayer,
                "Stop",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, PlayerActivity::Stopped);
        assert_eq!(agent.state()["playerActivity"], "STOPPED");
    }

    #[tokio::test]
    async fn play_preempts_current_playback() {
        let ctx = test_context();
        let agent = AudioPlayerAgent::new(&ctx);
        let (tx, mut rx) = unbounded_channel();
        agent.add_listener(Arc::new(ActivityProbe { tx }));

        agent
            .handle_directive(play_directive("https://cdn/a.mp3"))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, PlayerActivity::Playing);

        // second Play while audible: halt, rebind, restart
        agent
            .handle_directive(play_directive("https://cdn/b.mp3"))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, PlayerActivity::Stopped);
        assert_eq!(next(&mut rx).await, PlayerActivity::Playing);

        let id = agent.player_id().unwrap();
        let snapshot = ctx.engine.find(id).unwrap();
        assert_eq!(snapshot.source_uri.as_deref(), Some("https://cdn/b.mp3"));
    }

    #[tokio::test]
    async fn stop_without_player_is_invalid_state() {
        let ctx = test_context();
        let agent = AudioPlayerAgent::new(&ctx);
        let err = agent
            .handle_directive(Directive::new(
                CapabilityKind::AudioPlayer,
                "Stop",
                json!({}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidState(_)));
    }

    #[tokio::test]
    async fn unknown_directive_rejected() {
        let ctx = test_context();
        let agent = AudioPlayerAgent::new(&ctx);
        let err = agent
            .handle_directive(Directive::new(
                CapabilityKind::AudioPlayer,
                "Shuffle",
                json!({}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::UnknownDirective { .. }));
    }
}
