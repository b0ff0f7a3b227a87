//! Outward-facing capability listener API

use crate::types::CapabilityKind;

/// A registered callback target for a handler's status and event streams.
///
/// Many listeners may observe one handler; a listener holds no ownership
/// over it and must be removed explicitly. Delivery uses snapshot
/// semantics: listeners added during a notification do not receive that
/// same notification.
pub trait CapabilityListener: Send + Sync {
    /// Coarse status report for the given capability.
    fn on_status(&self, capability: CapabilityKind, status: serde_json::Value);

    /// Free-form domain event emitted by the given capability.
    fn on_event(&self, capability: CapabilityKind, name: &str, payload: serde_json::Value);
}
