//! Generic lifecycle observation, independent of capability type

use crate::types::CapabilityKind;

/// Lifecycle signals delivered to observers for every capability uniformly.
#[derive(Debug, Clone)]
pub enum CapabilitySignal {
    /// The handler instance was built and wired.
    Created,
    /// The handler's reported state changed.
    StateUpdated(serde_json::Value),
    /// Directive processing failed; the client keeps running.
    DirectiveFailed { name: String, error: String },
}

/// Observes lifecycle signals from every built handler. The orchestrator
/// itself is always implicitly registered as an observer.
pub trait CapabilityObserver: Send + Sync {
    fn on_signal(&self, capability: CapabilityKind, signal: CapabilitySignal);
}
