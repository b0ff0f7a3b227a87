//! System agent
//!
//! Housekeeping directives from the service: connection handoff, state
//! synchronization, revocation, liveness.

use crate::builder::{CapabilityContext, CapabilityFactory};
use crate::error::ClientResult;
use crate::hub::CapabilityEmitter;
use async_trait::async_trait;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use voxkit_capability::{
    CapabilityError, CapabilityHandler, CapabilityKind, CapabilityResult, Directive,
};

pub struct SystemAgent {
    emitter: CapabilityEmitter,
}

impl SystemAgent {
    pub fn new(ctx: &CapabilityContext) -> Self {
        Self {
            emitter: ctx.emitter(CapabilityKind::System),
        }
    }
}

#[async_trait]
impl CapabilityHandler for SystemAgent {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::System
    }

    async fn handle_directive(&self, directive: Directive) -> CapabilityResult<()> {
        match directive.name.as_str() {
            "HandoffConnection" => {
                tracing::info!(target: "voxkit::client", "Connection handoff requested");
                self.emitter.event("Disconnect", json!({}));
                Ok(())
            }
            "UpdateState" => {
                self.emitter.event("SynchronizeState", json!({}));
                Ok(())
            }
            "Revoke" => {
                let reason = directive
                    .payload
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("UNKNOWN");
                tracing::warn!(target: "voxkit::client", reason, "Device revoked");
                self.emitter.event("Revoked", json!({ "reason": reason }));
                Ok(())
            }
            "Ping" => {
                self.emitter.event("Pong", json!({}));
                Ok(())
            }
            other => Err(CapabilityError::UnknownDirective {
                capability: self.kind(),
                name: other.to_string(),
            }),
        }
    }

    fn state(&self) -> serde_json::Value {
        json!({ "version": env!("CARGO_PKG_VERSION") })
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub struct SystemFactory;

impl CapabilityFactory for SystemFactory {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::System
    }

    fn create(&self, ctx: &CapabilityContext) -> ClientResult<Arc<dyn CapabilityHandler>> {
        Ok(Arc::new(SystemAgent::new(ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::testutil::test_context;
    use parking_lot::Mutex;
    use voxkit_capability::CapabilityListener;

    #[derive(Default)]
    struct EventProbe {
        names: Mutex<Vec<String>>,
    }

    impl CapabilityListener for EventProbe {
        fn on_status(&self, _capability: CapabilityKind, _status: serde_json::Value) {}
        fn on_event(&self, _capability: CapabilityKind, name: &str, _payload: serde_json::Value) {
            self.names.lock().push(name.to_string());
        }
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let ctx = test_context();
        let probe = Arc::new(EventProbe::default());
        ctx.hub.add_listener(CapabilityKind::System, probe.clone());

        let agent = SystemAgent::new(&ctx);
        agent
            .handle_directive(Directive::new(CapabilityKind::System, "Ping", json!({})))
            .await
            .unwrap();
        agent
            .handle_directive(Directive::new(
                CapabilityKind::System,
                "UpdateState",
                json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(*probe.names.lock(), vec!["Pong", "SynchronizeState"]);
    }
}
