//! Capability builder
//!
//! Registry-plus-factory for capability handlers: factories are registered
//! per kind (built-ins by default, replaceable at runtime), and `build` is
//! idempotent — exactly one live handler per capability type.

use crate::error::{ClientError, ClientResult};
use crate::hub::{CapabilityEmitter, CapabilityHub};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use voxkit_capability::{CapabilityHandler, CapabilityKind, CapabilitySignal};
use voxkit_foundation::ClientConfig;
use voxkit_media::{DriverRegistry, PlayerEngine};
use voxkit_telemetry::ClientMetrics;

/// Everything a factory needs to wire an agent.
#[derive(Clone)]
pub struct CapabilityContext {
    pub config: Arc<ClientConfig>,
    pub registry: Arc<DriverRegistry>,
    pub engine: Arc<PlayerEngine>,
    pub metrics: ClientMetrics,
    pub hub: Arc<CapabilityHub>,
}

impl CapabilityContext {
    pub fn emitter(&self, kind: CapabilityKind) -> CapabilityEmitter {
        self.hub.emitter(kind)
    }
}

/// Creates one capability handler on demand. Applications may register
/// their own factory for a kind to override the built-in agent.
pub trait CapabilityFactory: Send + Sync {
    fn kind(&self) -> CapabilityKind;

    fn create(&self, ctx: &CapabilityContext) -> ClientResult<Arc<dyn CapabilityHandler>>;
}

pub struct CapabilityBuilder {
    ctx: CapabilityContext,
    factories: Mutex<HashMap<CapabilityKind, Arc<dyn CapabilityFactory>>>,
    built: Mutex<HashMap<CapabilityKind, Arc<dyn CapabilityHandler>>>,
}

impl CapabilityBuilder {
    pub fn new(ctx: CapabilityContext) -> Self {
        Self {
            ctx,
            factories: Mutex::new(HashMap::new()),
            built: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or replace) the factory for a kind. An already-built
    /// handler keeps running; the override applies from the next build
    /// after a teardown.
    pub fn register_factory(&self, factory: Arc<dyn CapabilityFactory>) {
        let kind = factory.kind();
        self.factories.lock().insert(kind, factory);
        tracing::debug!(
            target: "voxkit::client",
            capability = %kind,
            "Capability factory registered"
        );
    }

    /// Kinds a factory is registered for.
    pub fn supported_kinds(&self) -> Vec<CapabilityKind> {
        self.factories.lock().keys().copied().collect()
    }

    /// Build-or-lookup the handler for a kind. A second call returns the
    /// existing instance.
    pub fn build(&self, kind: CapabilityKind) -> ClientResult<Arc<dyn CapabilityHandler>> {
        let mut built = self.built.lock();
        if let Some(handler) = built.get(&kind) {
            return Ok(handler.clone());
        }

        let factory = self
            .factories
            .lock()
            .get(&kind)
            .cloned()
            .ok_or(ClientError::UnknownCapability(kind))?;

        let handler = factory.create(&self.ctx)?;
        built.insert(kind, handler.clone());
        drop(built);

        tracing::info!(target: "voxkit::client", capability = %kind, "Capability built");
        self.ctx.hub.notify_signal(kind, CapabilitySignal::Created);
        Ok(handler)
    }

    /// Already-built handler, without building.
    pub fn get(&self, kind: CapabilityKind) -> Option<Arc<dyn CapabilityHandler>> {
        self.built.lock().get(&kind).cloned()
    }

    pub fn built_kinds(&self) -> Vec<CapabilityKind> {
        self.built.lock().keys().copied().collect()
    }

    /// Drop every built handler (client teardown).
    pub fn teardown(&self) {
        self.built.lock().clear();
    }

    pub fn context(&self) -> &CapabilityContext {
        &self.ctx
    }
}
