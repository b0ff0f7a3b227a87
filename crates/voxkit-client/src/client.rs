//! Client orchestrator
//!
//! The one top-level object of a session: owns the capability builder, the
//! driver registry and player engine, the network-manager handle, and the
//! wakeup handler. Routes inbound directives to the right agent and relays
//! everything the agents emit to the network layer and local listeners.

use crate::builder::{CapabilityBuilder, CapabilityContext, CapabilityFactory};
use crate::capabilities::default_factories;
use crate::error::{ClientError, ClientResult};
use crate::hub::CapabilityHub;
use crate::network::NetworkManager;
use crate::wakeup::{WakeupDetectState, WakeupHandler, WakeupListener};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use voxkit_capability::{
    CapabilityHandler, CapabilityKind, CapabilityListener, CapabilityObserver, CapabilitySignal,
    Directive,
};
use voxkit_foundation::{ClientConfig, ClientState, LifecycleManager};
use voxkit_media::{DriverRegistry, PlayerEngine};
use voxkit_telemetry::ClientMetrics;

/// The orchestrator's own observer registration: every built handler is
/// implicitly observed, independent of application listeners.
struct ClientObserver;

impl CapabilityObserver for ClientObserver {
    fn on_signal(&self, capability: CapabilityKind, signal: CapabilitySignal) {
        match signal {
            CapabilitySignal::Created => {
                tracing::info!(target: "voxkit::client", capability = %capability, "Handler ready");
            }
            CapabilitySignal::StateUpdated(state) => {
                tracing::debug!(
                    target: "voxkit::client",
                    capability = %capability,
                    %state,
                    "Capability state"
                );
            }
            CapabilitySignal::DirectiveFailed { name, error } => {
                tracing::warn!(
                    target: "voxkit::client",
                    capability = %capability,
                    directive = name,
                    "Directive failed: {}",
                    error
                );
            }
        }
    }
}

/// Routes the wake signal into a recognition turn.
struct WakeupRelay {
    client: Weak<VoxClient>,
    runtime: tokio::runtime::Handle,
}

impl WakeupListener for WakeupRelay {
    fn on_wakeup_state(&self, state: WakeupDetectState) {
        match state {
            WakeupDetectState::Detecting => {
                tracing::debug!(target: "voxkit::client", "Wakeup detecting");
            }
            WakeupDetectState::Fail => {
                tracing::warn!(target: "voxkit::client", "Wakeup detection failed");
            }
            WakeupDetectState::Detected => {
                let Some(client) = self.client.upgrade() else {
                    return;
                };
                self.runtime.spawn(async move {
                    let directive = Directive::new(
                        CapabilityKind::Asr,
                        "ExpectSpeech",
                        json!({ "source": "wakeup" }),
                    );
                    if let Err(e) = client.dispatch(directive).await {
                        tracing::warn!(
                            target: "voxkit::client",
                            "Wakeup recognition start failed: {}",
                            e
                        );
                    }
                });
            }
        }
    }
}

/// One instance per process session. Must be constructed inside a Tokio
/// runtime; never cloned, passed by `Arc` reference to whoever needs it.
pub struct VoxClient {
    config: Arc<ClientConfig>,
    registry: Arc<DriverRegistry>,
    engine: Arc<PlayerEngine>,
    hub: Arc<CapabilityHub>,
    builder: CapabilityBuilder,
    network: Arc<dyn NetworkManager>,
    wakeup: Mutex<Option<Box<dyn WakeupHandler>>>,
    lifecycle: LifecycleManager,
    metrics: ClientMetrics,
}

impl VoxClient {
    /// Client with the seven built-in capability agents.
    pub fn new(config: ClientConfig, network: Arc<dyn NetworkManager>) -> Arc<Self> {
        Self::with_factories(config, network, default_factories())
    }

    /// Client with an explicit capability set (subset of the built-ins,
    /// or application-provided replacements).
    pub fn with_factories(
        config: ClientConfig,
        network: Arc<dyn NetworkManager>,
        factories: Vec<Arc<dyn CapabilityFactory>>,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let metrics = ClientMetrics::new();
        let registry = Arc::new(DriverRegistry::new());
        let engine = Arc::new(PlayerEngine::new(
            registry.clone(),
            &config,
            metrics.clone(),
        ));
        let hub = CapabilityHub::new(metrics.clone());
        hub.set_upstream(network.clone());
        hub.add_observer(Arc::new(ClientObserver));

        let builder = CapabilityBuilder::new(CapabilityContext {
            config: config.clone(),
            registry: registry.clone(),
            engine: engine.clone(),
            metrics: metrics.clone(),
            hub: hub.clone(),
        });
        for factory in factories {
            builder.register_factory(factory);
        }

        Arc::new(Self {
            config,
            registry,
            engine,
            hub,
            builder,
            network,
            wakeup: Mutex::new(None),
            lifecycle: LifecycleManager::new(),
            metrics,
        })
    }

    /// Attach the wakeup engine and wire its signal to the ASR agent.
    pub fn set_wakeup_handler(self: &Arc<Self>, handler: Box<dyn WakeupHandler>) {
        handler.set_listener(Arc::new(WakeupRelay {
            client: Arc::downgrade(self),
            runtime: tokio::runtime::Handle::current(),
        }));
        *self.wakeup.lock() = Some(handler);
    }

    /// Bring the session up: build every registered capability, connect
    /// the transport, start wakeup detection.
    pub fn initialize(&self) -> ClientResult<()> {
        self.lifecycle.transition(ClientState::Initializing)?;

        for kind in self.builder.supported_kinds() {
            self.builder.build(kind)?;
        }
        self.network.connect()?;
        if let Some(wakeup) = self.wakeup.lock().as_ref() {
            wakeup.start_wakeup()?;
        }

        self.lifecycle.transition(ClientState::Running)?;
        tracing::info!(target: "voxkit::client", "Client initialized");
        Ok(())
    }

    /// Tear the session down. Idempotent failures are logged, not raised.
    pub fn deinitialize(&self) -> ClientResult<()> {
        self.lifecycle.transition(ClientState::Stopping)?;
        if let Err(e) = self.network.disconnect() {
            tracing::warn!(target: "voxkit::client", "Disconnect failed: {}", e);
        }
        self.builder.teardown();
        self.lifecycle.transition(ClientState::Stopped)?;
        tracing::info!(target: "voxkit::client", "Client deinitialized");
        Ok(())
    }

    /// Route one inbound directive to its capability handler.
    ///
    /// A directive for an unregistered capability type is reported
    /// upstream and returned as `UnknownCapability`; handler failures are
    /// reported and absorbed. Neither stops the client from serving the
    /// next directive.
    pub async fn dispatch(&self, directive: Directive) -> ClientResult<()> {
        self.metrics.mark_directive();
        let kind = directive.capability;
        tracing::debug!(
            target: "voxkit::client",
            capability = %kind,
            directive = %directive.name,
            "Inbound directive"
        );

        let handler = match self.builder.build(kind) {
            Ok(handler) => handler,
            Err(ClientError::UnknownCapability(kind)) => {
                self.metrics
                    .directives_unknown
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "voxkit::client",
                    capability = %kind,
                    "Directive for unsupported capability"
                );
                self.report_exception(kind, "UNSUPPORTED_CAPABILITY", &directive.name);
                return Err(ClientError::UnknownCapability(kind));
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = handler.handle_directive(directive.clone()).await {
            self.metrics
                .directives_failed
                .fetch_add(1, Ordering::Relaxed);
            self.hub.notify_signal(
                kind,
                CapabilitySignal::DirectiveFailed {
                    name: directive.name.clone(),
                    error: e.to_string(),
                },
            );
            self.report_exception(kind, "UNABLE_TO_PROCESS", &directive.name);
        }
        Ok(())
    }

    /// Build-or-lookup a capability handler.
    pub fn capability(&self, kind: CapabilityKind) -> ClientResult<Arc<dyn CapabilityHandler>> {
        self.builder.build(kind)
    }

    /// Typed access to a built agent (e.g. `capability_as::<TtsAgent>`).
    pub fn capability_as<T: Send + Sync + 'static>(&self, kind: CapabilityKind) -> Option<Arc<T>> {
        self.builder.get(kind)?.as_any().downcast::<T>().ok()
    }

    pub fn add_listener(&self, kind: CapabilityKind, listener: Arc<dyn CapabilityListener>) {
        self.hub.add_listener(kind, listener);
    }

    pub fn remove_listener(
        &self,
        kind: CapabilityKind,
        listener: &Arc<dyn CapabilityListener>,
    ) -> bool {
        self.hub.remove_listener(kind, listener)
    }

    pub fn add_observer(&self, observer: Arc<dyn CapabilityObserver>) {
        self.hub.add_observer(observer);
    }

    /// Registry for driver plugins; populate before `initialize`.
    pub fn driver_registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    pub fn player_engine(&self) -> &Arc<PlayerEngine> {
        &self.engine
    }

    pub fn capability_builder(&self) -> &CapabilityBuilder {
        &self.builder
    }

    pub fn network(&self) -> &Arc<dyn NetworkManager> {
        &self.network
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    pub fn lifecycle_state(&self) -> ClientState {
        self.lifecycle.current()
    }

    fn report_exception(&self, kind: CapabilityKind, code: &str, directive_name: &str) {
        let payload = json!({
            "code": code,
            "capability": kind.as_str(),
            "directive": directive_name,
        });
        if let Err(e) = self
            .network
            .send_event(CapabilityKind::System, "Exception", payload)
        {
            tracing::warn!(
                target: "voxkit::client",
                "Exception report failed: {}",
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{AsrAgent, AsrState, AudioPlayerFactory};
    use crate::error::ClientResult;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use voxkit_media::drivers::register_null_drivers;

    #[derive(Default)]
    struct RecordingNetwork {
        connected: AtomicBool,
        events: Mutex<Vec<(CapabilityKind, String, serde_json::Value)>>,
    }

    impl RecordingNetwork {
        fn event_names(&self) -> Vec<String> {
            self.events
                .lock()
                .iter()
                .map(|(_, name, _)| name.clone())
                .collect()
        }
    }

    impl NetworkManager for RecordingNetwork {
        fn connect(&self) -> ClientResult<()> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn disconnect(&self) -> ClientResult<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
        fn send_event(
            &self,
            capability: CapabilityKind,
            name: &str,
            payload: serde_json::Value,
        ) -> ClientResult<()> {
            self.events
                .lock()
                .push((capability, name.to_string(), payload));
            Ok(())
        }
    }

    fn client_with(
        network: Arc<RecordingNetwork>,
        factories: Vec<Arc<dyn CapabilityFactory>>,
    ) -> Arc<VoxClient> {
        let client = VoxClient::with_factories(ClientConfig::default(), network, factories);
        register_null_drivers(client.driver_registry()).unwrap();
        client
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within deadline");
    }

    #[tokio::test]
    async fn build_is_idempotent_per_kind() {
        let network = Arc::new(RecordingNetwork::default());
        let client = client_with(network, default_factories());

        let first = client.capability(CapabilityKind::AudioPlayer).unwrap();
        let second = client.capability(CapabilityKind::AudioPlayer).unwrap();
        assert!(std::ptr::eq(
            Arc::as_ptr(&first) as *const (),
            Arc::as_ptr(&second) as *const (),
        ));
    }

    #[tokio::test]
    async fn unknown_capability_is_reported_and_non_fatal() {
        let network = Arc::new(RecordingNetwork::default());
        let client = client_with(network.clone(), vec![Arc::new(AudioPlayerFactory)]);

        let err = client
            .dispatch(Directive::new(
                CapabilityKind::Display,
                "Render",
                json!({ "template_id": "t" }),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::UnknownCapability(_)));
        assert_eq!(network.event_names(), vec!["Exception"]);

        // the client keeps serving
        client
            .dispatch(Directive::new(
                CapabilityKind::AudioPlayer,
                "Play",
                json!({ "url": "https://cdn/a.mp3" }),
            ))
            .await
            .unwrap();
        wait_for(|| network.event_names().contains(&"PlaybackStarted".to_string())).await;
    }

    #[tokio::test]
    async fn capability_events_forwarded_upstream() {
        let network = Arc::new(RecordingNetwork::default());
        let client = client_with(network.clone(), default_factories());

        client
            .dispatch(Directive::new(
                CapabilityKind::System,
                "Ping",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(network.event_names(), vec!["Pong"]);
    }

    #[tokio::test]
    async fn handler_failure_reported_but_absorbed() {
        let network = Arc::new(RecordingNetwork::default());
        let client = client_with(network.clone(), default_factories());

        // malformed payload: Play without url
        client
            .dispatch(Directive::new(
                CapabilityKind::AudioPlayer,
                "Play",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(network.event_names(), vec!["Exception"]);
        assert_eq!(
            client.metrics().directives_failed.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn registered_factory_overrides_builtin_agent() {
        struct Echo;
        #[async_trait::async_trait]
        impl CapabilityHandler for Echo {
            fn kind(&self) -> CapabilityKind {
                CapabilityKind::Text
            }
            async fn handle_directive(
                &self,
                _directive: Directive,
            ) -> voxkit_capability::error::CapabilityResult<()> {
                Ok(())
            }
            fn state(&self) -> serde_json::Value {
                json!({ "echo": true })
            }
            fn as_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
                self
            }
        }
        struct EchoFactory;
        impl CapabilityFactory for EchoFactory {
            fn kind(&self) -> CapabilityKind {
                CapabilityKind::Text
            }
            fn create(
                &self,
                _ctx: &CapabilityContext,
            ) -> ClientResult<Arc<dyn CapabilityHandler>> {
                Ok(Arc::new(Echo))
            }
        }

        let network = Arc::new(RecordingNetwork::default());
        let client = client_with(network, default_factories());
        client
            .capability_builder()
            .register_factory(Arc::new(EchoFactory));

        let handler = client.capability(CapabilityKind::Text).unwrap();
        assert_eq!(handler.state(), json!({ "echo": true }));
    }

    #[tokio::test]
    async fn observers_see_lifecycle_signals() {
        #[derive(Default)]
        struct SignalProbe {
            created: Mutex<Vec<CapabilityKind>>,
            failures: Mutex<Vec<String>>,
        }
        impl CapabilityObserver for SignalProbe {
            fn on_signal(&self, capability: CapabilityKind, signal: CapabilitySignal) {
                match signal {
                    CapabilitySignal::Created => self.created.lock().push(capability),
                    CapabilitySignal::DirectiveFailed { name, .. } => {
                        self.failures.lock().push(name)
                    }
                    CapabilitySignal::StateUpdated(_) => {}
                }
            }
        }

        let network = Arc::new(RecordingNetwork::default());
        let client = client_with(network, default_factories());
        let probe = Arc::new(SignalProbe::default());
        client.add_observer(probe.clone());

        client.capability(CapabilityKind::Tts).unwrap();
        assert_eq!(*probe.created.lock(), vec![CapabilityKind::Tts]);

        client
            .dispatch(Directive::new(CapabilityKind::Tts, "Speak", json!({})))
            .await
            .unwrap();
        assert_eq!(*probe.failures.lock(), vec!["Speak".to_string()]);
    }

    #[tokio::test]
    async fn initialize_and_deinitialize_lifecycle() {
        let network = Arc::new(RecordingNetwork::default());
        let client = client_with(network.clone(), default_factories());

        assert_eq!(client.lifecycle_state(), ClientState::Created);
        client.initialize().unwrap();
        assert_eq!(client.lifecycle_state(), ClientState::Running);
        assert!(network.connected.load(Ordering::SeqCst));
        // every registered capability was built eagerly
        assert_eq!(client.capability_builder().built_kinds().len(), 7);

        client.deinitialize().unwrap();
        assert_eq!(client.lifecycle_state(), ClientState::Stopped);
        assert!(!network.connected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wakeup_starts_a_recognition_turn() {
        struct FakeWakeup {
            listener: Mutex<Option<Arc<dyn WakeupListener>>>,
            started: AtomicBool,
        }
        impl WakeupHandler for FakeWakeup {
            fn set_listener(&self, listener: Arc<dyn WakeupListener>) {
                *self.listener.lock() = Some(listener);
            }
            fn start_wakeup(&self) -> ClientResult<()> {
                self.started.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let network = Arc::new(RecordingNetwork::default());
        let client = client_with(network, default_factories());
        let wakeup = Arc::new(FakeWakeup {
            listener: Mutex::new(None),
            started: AtomicBool::new(false),
        });

        struct WakeupProxy(Arc<FakeWakeup>);
        impl WakeupHandler for WakeupProxy {
            fn set_listener(&self, listener: Arc<dyn WakeupListener>) {
                self.0.set_listener(listener);
            }
            fn start_wakeup(&self) -> ClientResult<()> {
                self.0.start_wakeup()
            }
        }

        client.set_wakeup_handler(Box::new(WakeupProxy(wakeup.clone())));
        client.initialize().unwrap();
        assert!(wakeup.started.load(Ordering::SeqCst));

        let listener = wakeup.listener.lock().clone().unwrap();
        listener.on_wakeup_state(WakeupDetectState::Detected);

        let client2 = client.clone();
        wait_for(move || {
            client2
                .capability_as::<AsrAgent>(CapabilityKind::Asr)
                .map(|asr| asr.asr_state() == AsrState::Listening)
                .unwrap_or(false)
        })
        .await;
    }
}
