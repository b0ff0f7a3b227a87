//! Extension agent
//!
//! Escape hatch for service-specific actions: the payload is opaque to the
//! core and handed to the application listener, which reports whether it
//! could act on it.

use crate::builder::{CapabilityContext, CapabilityFactory};
use crate::error::ClientResult;
use crate::hub::CapabilityEmitter;
use async_trait::async_trait;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use voxkit_capability::{
    CapabilityError, CapabilityHandler, CapabilityKind, CapabilityResult, Directive, ListenerSet,
};

pub trait ExtensionListener: Send + Sync {
    /// Execute an application-defined action. Return `false` to report
    /// failure upstream.
    fn on_action(&self, data: &serde_json::Value) -> bool;
}

pub struct ExtensionAgent {
    emitter: CapabilityEmitter,
    listeners: ListenerSet<dyn ExtensionListener>,
}

impl ExtensionAgent {
    pub fn new(ctx: &CapabilityContext) -> Self {
        Self {
            emitter: ctx.emitter(CapabilityKind::Extension),
            listeners: ListenerSet::new(),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ExtensionListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ExtensionListener>) -> bool {
        self.listeners.remove(listener)
    }

    fn action(&self, directive: &Directive) -> CapabilityResult<()> {
        let data = directive
            .payload
            .get("data")
            .cloned()
            .ok_or_else(|| CapabilityError::Payload("Action requires data".into()))?;

        let targets = self.listeners.snapshot();
        let handled = !targets.is_empty() && targets.iter().all(|l| l.on_action(&data));
        if handled {
            self.emitter.event("ActionSucceeded", json!({}));
        } else {
            self.emitter.event("ActionFailed", json!({}));
        }
        Ok(())
    }
}

#[async_trait]
impl CapabilityHandler for ExtensionAgent {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Extension
    }

    async fn handle_directive(&self, directive: Directive) -> CapabilityResult<()> {
        match directive.name.as_str() {
            "Action" => self.action(&directive),
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

pub struct ExtensionFactory;

impl CapabilityFactory for ExtensionFactory {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Extension
    }

    fn create(&self, ctx: &CapabilityContext) -> ClientResult<Arc<dyn CapabilityHandler>> {
        Ok(Arc::new(ExtensionAgent::new(ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::testutil::test_context;
    use parking_lot::Mutex;

    struct Acceptor {
        seen: Mutex<Vec<serde_json::Value>>,
    }

    impl ExtensionListener for Acceptor {
        fn on_action(&self, data: &serde_json::Value) -> bool {
            self.seen.lock().push(data.clone());
            true
        }
    }

    #[tokio::test]
    async fn action_reaches_listener() {
        let ctx = test_context();
        let agent = ExtensionAgent::new(&ctx);
        let listener = Arc::new(Acceptor {
            seen: Mutex::new(Vec::new()),
        });
        agent.add_listener(listener.clone());

        agent
            .handle_directive(Directive::new(
                CapabilityKind::Extension,
                "Action",
                json!({ "data": { "command": "open_window" } }),
            ))
            .await
            .unwrap();

        assert_eq!(listener.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn action_without_listener_reports_failure() {
        let ctx = test_context();
        let agent = ExtensionAgent::new(&ctx);
        // no listener registered: still Ok, failure goes upstream as event
        agent
            .handle_directive(Directive::new(
                CapabilityKind::Extension,
                "Action",
                json!({ "data": {} }),
            ))
            .await
            .unwrap();
    }
}
