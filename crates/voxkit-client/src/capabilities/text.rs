//! Text agent
//!
//! Typed interaction path: the service pushes `TextSource` directives, the
//! application submits typed input upstream via `request_text_input`.

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

pub trait TextListener: Send + Sync {
    fn on_text_source(&self, text: &str, token: Option<&str>);
}

pub struct TextAgent {
    emitter: CapabilityEmitter,
    listeners: ListenerSet<dyn TextListener>,
}

impl TextAgent {
    pub fn new(ctx: &CapabilityContext) -> Self {
        Self {
            emitter: ctx.emitter(CapabilityKind::Text),
            listeners: ListenerSet::new(),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn TextListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn TextListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Submit typed user input upstream, bypassing speech recognition.
    pub fn request_text_input(&self, text: &str) {
        self.emitter.event("TextInput", json!({ "text": text }));
    }
}

#[async_trait]
impl CapabilityHandler for TextAgent {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Text
    }

    async fn handle_directive(&self, directive: Directive) -> CapabilityResult<()> {
        match directive.name.as_str() {
            "TextSource" => {
                let text = directive
                    .payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CapabilityError::Payload("TextSource requires text".into()))?;
                let token = directive.payload.get("token").and_then(|v| v.as_str());

                self.listeners.notify(|l| l.on_text_source(text, token));
                self.emitter
                    .event("TextSourceConsumed", json!({ "token": token }));
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

pub struct TextFactory;

impl CapabilityFactory for TextFactory {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Text
    }

    fn create(&self, ctx: &CapabilityContext) -> ClientResult<Arc<dyn CapabilityHandler>> {
        Ok(Arc::new(TextAgent::new(ctx)))
    }
}
