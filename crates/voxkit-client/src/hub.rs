//! Capability hub
//!
//! Fan-out point between the agents and the outside world: per-capability
//! listener sets, the shared observer set, and upstream forwarding to the
//! network manager. Agents publish through a [`CapabilityEmitter`] and know
//! nothing about who is listening.

use crate::network::NetworkManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use voxkit_capability::{
    CapabilityKind, CapabilityListener, CapabilityObserver, CapabilitySignal, ListenerSet,
};
use voxkit_telemetry::ClientMetrics;

pub struct CapabilityHub {
    listeners: Mutex<HashMap<CapabilityKind, Arc<ListenerSet<dyn CapabilityListener>>>>,
    observers: ListenerSet<dyn CapabilityObserver>,
    upstream: Mutex<Option<Arc<dyn NetworkManager>>>,
    metrics: ClientMetrics,
}

impl CapabilityHub {
    pub fn new(metrics: ClientMetrics) -> Arc<Self> {
        Arc::new(Self {
            listeners: Mutex::new(HashMap::new()),
            observers: ListenerSet::new(),
            upstream: Mutex::new(None),
            metrics,
        })
    }

    pub fn set_upstream(&self, network: Arc<dyn NetworkManager>) {
        *self.upstream.lock() = Some(network);
    }

    pub fn add_listener(&self, kind: CapabilityKind, listener: Arc<dyn CapabilityListener>) {
        self.listener_set(kind).add(listener);
    }

    pub fn remove_listener(
        &self,
        kind: CapabilityKind,
        listener: &Arc<dyn CapabilityListener>,
    ) -> bool {
        self.listener_set(kind).remove(listener)
    }

    pub fn add_observer(&self, observer: Arc<dyn CapabilityObserver>) {
        self.observers.add(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn CapabilityObserver>) -> bool {
        self.observers.remove(observer)
    }

    /// Mint the publishing handle for one capability.
    pub fn emitter(self: &Arc<Self>, kind: CapabilityKind) -> CapabilityEmitter {
        CapabilityEmitter {
            hub: self.clone(),
            kind,
        }
    }

    pub(crate) fn notify_signal(&self, kind: CapabilityKind, signal: CapabilitySignal) {
        let signal_ref = &signal;
        self.observers
            .notify(|observer| observer.on_signal(kind, signal_ref.clone()));
    }

    pub(crate) fn emit_event(&self, kind: CapabilityKind, name: &str, payload: serde_json::Value) {
        self.metrics.events_emitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            target: "voxkit::client",
            capability = %kind,
            event = name,
            "Capability event"
        );

        self.listener_set(kind)
            .notify(|l| l.on_event(kind, name, payload.clone()));

        let upstream = self.upstream.lock().clone();
        if let Some(network) = upstream {
            match network.send_event(kind, name, payload) {
                Ok(()) => {
                    self.metrics.events_upstream.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::warn!(
                        target: "voxkit::client",
                        capability = %kind,
                        event = name,
                        "Upstream event submission failed: {}",
                        e
                    );
                }
            }
        }
    }

    pub(crate) fn emit_status(&self, kind: CapabilityKind, status: serde_json::Value) {
        self.listener_set(kind)
            .notify(|l| l.on_status(kind, status.clone()));
        self.notify_signal(kind, CapabilitySignal::StateUpdated(status));
    }

    fn listener_set(&self, kind: CapabilityKind) -> Arc<ListenerSet<dyn CapabilityListener>> {
        self.listeners
            .lock()
            .entry(kind)
            .or_insert_with(|| Arc::new(ListenerSet::new()))
            .clone()
    }
}

/// Publishing handle an agent holds onto; each emission fans out to the
/// capability's listeners and is forwarded upstream.
#[derive(Clone)]
pub struct CapabilityEmitter {
    hub: Arc<CapabilityHub>,
    kind: CapabilityKind,
}

impl CapabilityEmitter {
    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    pub fn event(&self, name: &str, payload: serde_json::Value) {
        self.hub.emit_event(self.kind, name, payload);
    }

    pub fn status(&self, status: serde_json::Value) {
        self.hub.emit_status(self.kind, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(CapabilityKind, String)>>,
    }

    impl CapabilityListener for Recorder {
        fn on_status(&self, _capability: CapabilityKind, _status: serde_json::Value) {}
        fn on_event(&self, capability: CapabilityKind, name: &str, _payload: serde_json::Value) {
            self.events.lock().push((capability, name.to_string()));
        }
    }

    #[test]
    fn events_reach_only_matching_kind() {
        let hub = CapabilityHub::new(ClientMetrics::default());
        let tts = Arc::new(Recorder::default());
        let asr = Arc::new(Recorder::default());
        hub.add_listener(CapabilityKind::Tts, tts.clone());
        hub.add_listener(CapabilityKind::Asr, asr.clone());

        hub.emitter(CapabilityKind::Tts)
            .event("SpeechStarted", json!({}));

        assert_eq!(tts.events.lock().len(), 1);
        assert!(asr.events.lock().is_empty());
    }

    #[test]
    fn removed_listener_stops_receiving() {
        let hub = CapabilityHub::new(ClientMetrics::default());
        let listener = Arc::new(Recorder::default());
        hub.add_listener(CapabilityKind::Tts, listener.clone());

        let as_dyn: Arc<dyn CapabilityListener> = listener.clone();
        assert!(hub.remove_listener(CapabilityKind::Tts, &as_dyn));

        hub.emitter(CapabilityKind::Tts)
            .event("SpeechStarted", json!({}));
        assert!(listener.events.lock().is_empty());
    }
}
