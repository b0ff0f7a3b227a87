//! Display agent
//!
//! Rendering itself is application territory; the agent tracks which
//! template is on screen, forwards render payloads to the listener, and
//! reports back upstream.

use crate::builder::{CapabilityContext, CapabilityFactory};
use crate::error::ClientResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use voxkit_capability::{
    CapabilityError, CapabilityHandler, CapabilityKind, CapabilityResult, Directive, ListenerSet,
};

use crate::hub::CapabilityEmitter;

pub trait DisplayListener: Send + Sync {
    /// A template should be put on screen.
    fn on_render(&self, template_id: &str, content: &serde_json::Value);

    /// The named template should be taken down.
    fn on_clear(&self, template_id: &str) {
        let _ = template_id;
    }
}

pub struct DisplayAgent {
    emitter: CapabilityEmitter,
    current_template: Mutex<Option<String>>,
    listeners: ListenerSet<dyn DisplayListener>,
}

impl DisplayAgent {
    pub fn new(ctx: &CapabilityContext) -> Self {
        Self {
            emitter: ctx.emitter(CapabilityKind::Display),
            current_template: Mutex::new(None),
            listeners: ListenerSet::new(),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn DisplayListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DisplayListener>) -> bool {
        self.listeners.remove(listener)
    }

    pub fn displayed_template(&self) -> Option<String> {
        self.current_template.lock().clone()
    }

    fn render(&self, directive: &Directive) -> CapabilityResult<()> {
        let template_id = directive
            .payload
            .get("template_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CapabilityError::Payload("Render requires template_id".into()))?
            .to_string();
        let content = directive
            .payload
            .get("content")
            .cloned()
            .unwrap_or(json!({}));

        *self.current_template.lock() = Some(template_id.clone());
        self.listeners.notify(|l| l.on_render(&template_id, &content));
        self.emitter
            .event("Rendered", json!({ "template_id": template_id }));
        Ok(())
    }

    fn clear(&self) -> CapabilityResult<()> {
        let template_id = self.current_template.lock().take();
        if let Some(template_id) = template_id {
            self.listeners.notify(|l| l.on_clear(&template_id));
            self.emitter
                .event("Cleared", json!({ "template_id": template_id }));
        }
        Ok(())
    }
}

#[async_trait]
impl CapabilityHandler for DisplayAgent {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Display
    }

    async fn handle_directive(&self, directive: Directive) -> CapabilityResult<()> {
        match directive.name.as_str() {
            "Render" => self.render(&directive),
            "Clear" => self.clear(),
            other => Err(CapabilityError::UnknownDirective {
                capability: self.kind(),
                name: other.to_string(),
            }),
        }
    }

    fn state(&self) -> serde_json::Value {
        json!({ "displayedTemplate": self.displayed_template() })
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub struct DisplayFactory;

impl CapabilityFactory for DisplayFactory {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Display
    }

    fn create(&self, ctx: &CapabilityContext) -> ClientResult<Arc<dyn CapabilityHandler>> {
        Ok(Arc::new(DisplayAgent::new(ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::testutil::test_context;

    #[tokio::test]
    async fn render_then_clear_tracks_template() {
        let ctx = test_context();
        let agent = DisplayAgent::new(&ctx);

        agent
            .handle_directive(Directive::new(
                CapabilityKind::Display,
                "Render",
                json!({ "template_id": "weather-1", "content": { "temp": 21 } }),
            ))
            .await
            .unwrap();
        assert_eq!(agent.displayed_template().as_deref(), Some("weather-1"));

        agent
            .handle_directive(Directive::new(
                CapabilityKind::Display,
                "Clear",
                json!({}),
            ))
            .await
            .unwrap();
        assert!(agent.displayed_template().is_none());
    }
}
