//! The base contract every capability agent satisfies

use crate::error::CapabilityResult;
use crate::types::{CapabilityKind, Directive};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// A capability handler receives directives addressed to its kind and
/// exposes its current state for context reporting.
///
/// Handlers are shared behind `Arc` and use interior mutability; directive
/// processing is serialized per handler by the orchestrator's control flow,
/// never by a global lock.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// The capability type this handler serves.
    fn kind(&self) -> CapabilityKind;

    /// Process one directive. Errors are reported upstream by the
    /// orchestrator and never terminate the client.
    async fn handle_directive(&self, directive: Directive) -> CapabilityResult<()>;

    /// Current capability state, as reported to the cloud context.
    fn state(&self) -> serde_json::Value;

    /// Typed access for application code. Implementations return `self`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}
