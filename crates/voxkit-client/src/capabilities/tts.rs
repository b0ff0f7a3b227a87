//! TTS agent
//!
//! Synthesized speech arrives from the cloud as raw PCM attachments; the
//! agent feeds them through a pcm channel on the configured pcm driver.
//! `Speak` opens a fresh channel, the transport pushes attachment bytes via
//! [`TtsAgent::push_attachment`], and the driver's completions become
//! speech events.

use crate::builder::{CapabilityContext, CapabilityFactory};
use crate::capabilities::media_err;
use crate::error::ClientResult;
use crate::hub::CapabilityEmitter;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use voxkit_capability::{
    CapabilityError, CapabilityHandler, CapabilityKind, CapabilityResult, Directive, ListenerSet,
};
use voxkit_foundation::ClientConfig;
use voxkit_media::{
    AudioProperty, DriverRegistry, MediaEvent, PcmChannel, PlaybackState,
};
use voxkit_telemetry::ClientMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsState {
    Idle,
    Speaking,
    Stopped,
    Finished,
}

impl TtsState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsState::Idle => "IDLE",
            TtsState::Speaking => "SPEAKING",
            TtsState::Stopped => "STOPPED",
            TtsState::Finished => "FINISHED",
        }
    }
}

pub trait TtsListener: Send + Sync {
    fn on_tts_state(&self, state: TtsState);
}

struct TtsInner {
    emitter: CapabilityEmitter,
    state: Mutex<TtsState>,
    current_text: Mutex<Option<String>>,
    listeners: ListenerSet<dyn TtsListener>,
}

impl TtsInner {
    fn set_state(&self, state: TtsState) {
        *self.state.lock() = state;
        self.listeners.notify(|l| l.on_tts_state(state));
        self.emitter.status(json!({ "ttsActivity": state.as_str() }));
    }

    fn on_channel_status(&self, status: PlaybackState) {
        match status {
            PlaybackState::Playing => {
                self.set_state(TtsState::Speaking);
                self.emitter.event("SpeechStarted", json!({}));
            }
            PlaybackState::Stopped => {
                // a stop after end-of-stream is teardown, not interruption
                if *self.state.lock() != TtsState::Finished {
                    self.set_state(TtsState::Stopped);
                    self.emitter.event("SpeechStopped", json!({}));
                }
            }
            PlaybackState::Error => {
                self.set_state(TtsState::Stopped);
                self.emitter
                    .event("SpeechFailed", json!({ "error": "INTERNAL_DEVICE_ERROR" }));
            }
            _ => {}
        }
    }

    fn on_channel_event(&self, event: MediaEvent) {
        if event == MediaEvent::EndOfStream {
            self.set_state(TtsState::Finished);
            self.emitter.event("SpeechFinished", json!({}));
        }
    }
}

pub struct TtsAgent {
    inner: Arc<TtsInner>,
    config: Arc<ClientConfig>,
    registry: Arc<DriverRegistry>,
    metrics: ClientMetrics,
    channel: Mutex<Option<PcmChannel>>,
}

impl TtsAgent {
    pub fn new(ctx: &CapabilityContext) -> Self {
        Self {
            inner: Arc::new(TtsInner {
                emitter: ctx.emitter(CapabilityKind::Tts),
                state: Mutex::new(TtsState::Idle),
                current_text: Mutex::new(None),
                listeners: ListenerSet::new(),
            }),
            config: ctx.config.clone(),
            registry: ctx.registry.clone(),
            metrics: ctx.metrics.clone(),
            channel: Mutex::new(None),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn TtsListener>) {
        self.inner.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn TtsListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    pub fn tts_state(&self) -> TtsState {
        *self.inner.state.lock()
    }

    /// Feed synthesized audio bytes into the active speech channel. Called
    /// by the transport as attachments arrive; `last` closes the stream.
    pub fn push_attachment(&self, data: &[u8], last: bool) -> CapabilityResult<usize> {
        let channel = self.channel.lock();
        let channel = channel
            .as_ref()
            .ok_or_else(|| CapabilityError::InvalidState("no active speech".into()))?;
        channel.push_data(data, last).map_err(media_err)
    }

    fn speak(&self, directive: &Directive) -> CapabilityResult<()> {
        let text = directive
            .payload
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CapabilityError::Payload("Speak requires text".into()))?;

        // a new Speak replaces any running one outright; the old driver
        // session closes when the channel drops
        if let Some(old) = self.channel.lock().take() {
            tracing::debug!(target: "voxkit::client", "Replacing active speech channel");
            drop(old);
        }

        let channel = PcmChannel::new(
            "tts",
            &self.registry,
            self.config.drivers.pcm.as_deref(),
            AudioProperty::default(),
            &self.config,
            self.metrics.clone(),
        )
        .map_err(media_err)?;

        let inner = self.inner.clone();
        channel.set_status_callback(move |status| inner.on_channel_status(status));
        let inner = self.inner.clone();
        channel.set_event_callback(move |event| inner.on_channel_event(event));

        // reset any Finished/Stopped left over from the previous turn
        *self.inner.state.lock() = TtsState::Idle;
        channel.start().map_err(media_err)?;
        *self.inner.current_text.lock() = Some(text.to_string());
        *self.channel.lock() = Some(channel);
        Ok(())
    }

    /// Halt the active channel in place. The channel (and its signal pump)
    /// stays alive so the driver's Stopped completion still lands.
    fn stop_channel(&self) {
        let channel = self.channel.lock();
        if let Some(channel) = channel.as_ref() {
            if matches!(
                channel.state(),
                PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
            ) {
                if let Err(e) = channel.stop() {
                    tracing::warn!(target: "voxkit::client", "Speech halt failed: {}", e);
                }
            }
        }
    }
}

#[async_trait]
impl CapabilityHandler for TtsAgent {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Tts
    }

    async fn handle_directive(&self, directive: Directive) -> CapabilityResult<()> {
        match directive.name.as_str() {
            "Speak" => self.speak(&directive),
            "Stop" => {
                self.stop_channel();
                Ok(())
            }
            other => Err(CapabilityError::UnknownDirective {
                capability: self.kind(),
                name: other.to_string(),
            }),
        }
    }

    fn state(&self) -> serde_json::Value {
        json!({
            "ttsActivity": self.tts_state().as_str(),
            "text": self.inner.current_text.lock().clone(),
        })
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub struct TtsFactory;

impl CapabilityFactory for TtsFactory {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Tts
    }

    fn create(&self, ctx: &CapabilityContext) -> ClientResult<Arc<dyn CapabilityHandler>> {
        Ok(Arc::new(TtsAgent::new(ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::testutil::test_context;
    use std::time::Duration;
    use tokio::time::timeout;

    struct StateProbe {
        tx: tokio::sync::mpsc::UnboundedSender<TtsState>,
    }

    impl TtsListener for StateProbe {
        fn on_tts_state(&self, state: TtsState) {
            let _ = self.tx.send(state);
        }
    }

    async fn next(rx: &mut tokio::sync::mpsc::UnboundedReceiver<TtsState>) -> TtsState {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("state within deadline")
            .expect("probe alive")
    }

    #[tokio::test]
    async fn speak_then_attachments_finish_speech() {
        let ctx = test_context();
        let agent = TtsAgent::new(&ctx);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        agent.add_listener(Arc::new(StateProbe { tx }));

        agent
            .handle_directive(Directive::new(
                CapabilityKind::Tts,
                "Speak",
                json!({ "text": "hello there" }),
            ))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, TtsState::Speaking);

        agent.push_attachment(&[0u8; 512], false).unwrap();
        agent.push_attachment(&[0u8; 128], true).unwrap();
        // the null pcm driver reports end of stream once eof is drained
        assert_eq!(next(&mut rx).await, TtsState::Finished);
        assert_eq!(agent.state()["ttsActivity"], "FINISHED");
    }

    #[tokio::test]
    async fn stop_interrupts_speech() {
        let ctx = test_context();
        let agent = TtsAgent::new(&ctx);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        agent.add_listener(Arc::new(StateProbe { tx }));

        agent
            .handle_directive(Directive::new(
                CapabilityKind::Tts,
                "Speak",
                json!({ "text": "interrupted" }),
            ))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, TtsState::Speaking);

        agent
            .handle_directive(Directive::new(CapabilityKind::Tts, "Stop", json!({})))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, TtsState::Stopped);
    }

    #[tokio::test]
    async fn attachment_without_speak_rejected() {
        let ctx = test_context();
        let agent = TtsAgent::new(&ctx);
        assert!(matches!(
            agent.push_attachment(&[0u8; 16], false),
            Err(CapabilityError::InvalidState(_))
        ));
    }
}
