//! ASR agent
//!
//! Drives a recorder session for speech capture. Captured frames are
//! handed to the transport for upstream streaming via
//! [`AsrAgent::take_audio`]; recognition results come back from the cloud
//! as `NotifyResult` directives.

use crate::builder::{CapabilityContext, CapabilityFactory};
use crate::capabilities::media_err;
use crate::error::ClientResult;
use crate::hub::CapabilityEmitter;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::mpsc;
use voxkit_capability::{
    CapabilityError, CapabilityHandler, CapabilityKind, CapabilityResult, Directive, ListenerSet,
};
use voxkit_foundation::ClientConfig;
use voxkit_media::{AudioFrame, AudioProperty, DriverRegistry, RecorderSession, SampleFormat};
use voxkit_telemetry::ClientMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsrState {
    Idle,
    Listening,
    Recognizing,
    Busy,
}

impl AsrState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AsrState::Idle => "IDLE",
            AsrState::Listening => "LISTENING",
            AsrState::Recognizing => "RECOGNIZING",
            AsrState::Busy => "BUSY",
        }
    }
}

pub trait AsrListener: Send + Sync {
    fn on_state_changed(&self, state: AsrState);

    fn on_partial_result(&self, text: &str) {
        let _ = text;
    }

    fn on_complete_result(&self, text: &str) {
        let _ = text;
    }

    fn on_error(&self, reason: &str) {
        let _ = reason;
    }
}

struct AsrShared {
    emitter: CapabilityEmitter,
    state: Mutex<AsrState>,
    listeners: ListenerSet<dyn AsrListener>,
}

impl AsrShared {
    fn set_state(&self, state: AsrState) {
        {
            let mut current = self.state.lock();
            if *current == state {
                return;
            }
            *current = state;
        }
        self.listeners.notify(|l| l.on_state_changed(state));
        self.emitter.status(json!({ "asrState": state.as_str() }));
    }
}

pub struct AsrAgent {
    shared: Arc<AsrShared>,
    config: Arc<ClientConfig>,
    registry: Arc<DriverRegistry>,
    metrics: ClientMetrics,
    session: Mutex<Option<RecorderSession>>,
    audio_rx: Mutex<Option<mpsc::Receiver<AudioFrame>>>,
}

impl AsrAgent {
    pub fn new(ctx: &CapabilityContext) -> Self {
        Self {
            shared: Arc::new(AsrShared {
                emitter: ctx.emitter(CapabilityKind::Asr),
                state: Mutex::new(AsrState::Idle),
                listeners: ListenerSet::new(),
            }),
            config: ctx.config.clone(),
            registry: ctx.registry.clone(),
            metrics: ctx.metrics.clone(),
            session: Mutex::new(None),
            audio_rx: Mutex::new(None),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn AsrListener>) {
        self.shared.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn AsrListener>) -> bool {
        self.shared.listeners.remove(listener)
    }

    pub fn asr_state(&self) -> AsrState {
        *self.shared.state.lock()
    }

    /// Take the capture frame stream for upstream submission. Available
    /// once per recognition turn.
    pub fn take_audio(&self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.audio_rx.lock().take()
    }

    /// Begin a recognition turn: open a recorder session and start
    /// capturing. Idempotent while already listening.
    fn start_listening(&self) -> CapabilityResult<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            tracing::debug!(target: "voxkit::client", "Recognition already in progress");
            return Ok(());
        }

        let property = AudioProperty {
            sample_rate: 16_000,
            channels: 1,
            format: SampleFormat::S16Le,
        };
        let mut new_session = RecorderSession::new(
            &self.registry,
            self.config.drivers.recorder.as_deref(),
            property,
            &self.config,
            self.metrics.clone(),
        )
        .map_err(media_err)?;

        *self.audio_rx.lock() = new_session.take_frames();
        new_session.start().map_err(media_err)?;
        *session = Some(new_session);
        drop(session);

        self.shared.set_state(AsrState::Listening);
        self.shared.emitter.event("ListeningStarted", json!({}));
        Ok(())
    }

    fn stop_listening(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            if let Err(e) = session.stop() {
                tracing::debug!(target: "voxkit::client", "Recorder halt skipped: {}", e);
            }
        }
        self.audio_rx.lock().take();
        self.shared.set_state(AsrState::Idle);
    }

    fn notify_result(&self, directive: &Directive) -> CapabilityResult<()> {
        let state = directive
            .payload
            .get("state")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CapabilityError::Payload("NotifyResult requires state".into()))?;
        let result = directive
            .payload
            .get("result")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        match state {
            "PARTIAL" => {
                self.shared.set_state(AsrState::Recognizing);
                self.shared
                    .listeners
                    .notify(|l| l.on_partial_result(result));
            }
            "COMPLETE" => {
                self.shared.set_state(AsrState::Busy);
                self.shared
                    .listeners
                    .notify(|l| l.on_complete_result(result));
                self.stop_listening();
            }
            "NONE" => {
                self.shared.listeners.notify(|l| l.on_error("no result"));
                self.stop_listening();
            }
            "ERROR" => {
                self.shared
                    .listeners
                    .notify(|l| l.on_error("recognition error"));
                self.stop_listening();
            }
            other => {
                return Err(CapabilityError::Payload(format!(
                    "unknown recognition state: {other}"
                )))
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CapabilityHandler for AsrAgent {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Asr
    }

    async fn handle_directive(&self, directive: Directive) -> CapabilityResult<()> {
        match directive.name.as_str() {
            "ExpectSpeech" => self.start_listening(),
            "StopRecognize" => {
                self.stop_listening();
                Ok(())
            }
            "NotifyResult" => self.notify_result(&directive),
            other => Err(CapabilityError::UnknownDirective {
                capability: self.kind(),
                name: other.to_string(),
            }),
        }
    }

    fn state(&self) -> serde_json::Value {
        json!({ "asrState": self.asr_state().as_str() })
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub struct AsrFactory;

impl CapabilityFactory for AsrFactory {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Asr
    }

    fn create(&self, ctx: &CapabilityContext) -> ClientResult<Arc<dyn CapabilityHandler>> {
        Ok(Arc::new(AsrAgent::new(ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::testutil::test_context;

    fn directive(name: &str, payload: serde_json::Value) -> Directive {
        Directive::new(CapabilityKind::Asr, name, payload)
    }

    #[tokio::test]
    async fn expect_speech_starts_listening() {
        let ctx = test_context();
        let agent = AsrAgent::new(&ctx);

        agent
            .handle_directive(directive("ExpectSpeech", json!({})))
            .await
            .unwrap();
        assert_eq!(agent.asr_state(), AsrState::Listening);
        assert!(agent.take_audio().is_some());
        assert!(agent.take_audio().is_none());

        // idempotent while a turn is open
        agent
            .handle_directive(directive("ExpectSpeech", json!({})))
            .await
            .unwrap();

        agent
            .handle_directive(directive("StopRecognize", json!({})))
            .await
            .unwrap();
        assert_eq!(agent.asr_state(), AsrState::Idle);
    }

    #[tokio::test]
    async fn partial_then_complete_results() {
        let ctx = test_context();
        let agent = AsrAgent::new(&ctx);

        struct ResultProbe {
            results: Mutex<Vec<String>>,
        }
        impl AsrListener for ResultProbe {
            fn on_state_changed(&self, _state: AsrState) {}
            fn on_partial_result(&self, text: &str) {
                self.results.lock().push(format!("partial:{text}"));
            }
            fn on_complete_result(&self, text: &str) {
                self.results.lock().push(format!("complete:{text}"));
            }
        }

        let probe = Arc::new(ResultProbe {
            results: Mutex::new(Vec::new()),
        });
        agent.add_listener(probe.clone());

        agent
            .handle_directive(directive("ExpectSpeech", json!({})))
            .await
            .unwrap();
        agent
            .handle_directive(directive(
                "NotifyResult",
                json!({ "state": "PARTIAL", "result": "turn on" }),
            ))
            .await
            .unwrap();
        assert_eq!(agent.asr_state(), AsrState::Recognizing);

        agent
            .handle_directive(directive(
                "NotifyResult",
                json!({ "state": "COMPLETE", "result": "turn on the light" }),
            ))
            .await
            .unwrap();
        assert_eq!(agent.asr_state(), AsrState::Idle);

        let results = probe.results.lock();
        assert_eq!(
            *results,
            vec![
                "partial:turn on".to_string(),
                "complete:turn on the light".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn malformed_notify_result_rejected() {
        let ctx = test_context();
        let agent = AsrAgent::new(&ctx);
        let err = agent
            .handle_directive(directive("NotifyResult", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Payload(_)));
    }
}
