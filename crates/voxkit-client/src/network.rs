//! Network manager seam
//!
//! The transport is an external collaborator. The core calls it to submit
//! upstream events and receives inbound directives from it through
//! [`VoxClient::dispatch`](crate::client::VoxClient::dispatch); no wire
//! format lives here.

use crate::error::ClientResult;
use std::sync::Arc;
use voxkit_capability::CapabilityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// The issued token expired
    TokenExpired,
    Unknown,
}

/// Connection status callbacks.
pub trait NetworkManagerListener: Send + Sync {
    fn on_connected(&self) {}

    fn on_disconnected(&self) {}

    fn on_error(&self, error: NetworkError) {
        let _ = error;
    }
}

/// Server connection control and upstream event submission.
pub trait NetworkManager: Send + Sync {
    fn connect(&self) -> ClientResult<()>;

    fn disconnect(&self) -> ClientResult<()>;

    /// Submit a capability-originated event upstream.
    fn send_event(
        &self,
        capability: CapabilityKind,
        name: &str,
        payload: serde_json::Value,
    ) -> ClientResult<()>;

    fn add_listener(&self, listener: Arc<dyn NetworkManagerListener>) {
        let _ = listener;
    }

    fn remove_listener(&self, listener: &Arc<dyn NetworkManagerListener>) {
        let _ = listener;
    }
}

/// Transport that goes nowhere. For tests and offline operation.
#[derive(Debug, Default)]
pub struct NoopNetworkManager;

impl NetworkManager for NoopNetworkManager {
    fn connect(&self) -> ClientResult<()> {
        Ok(())
    }

    fn disconnect(&self) -> ClientResult<()> {
        Ok(())
    }

    fn send_event(
        &self,
        capability: CapabilityKind,
        name: &str,
        _payload: serde_json::Value,
    ) -> ClientResult<()> {
        tracing::debug!(
            target: "voxkit::client",
            capability = %capability,
            event = name,
            "Event discarded by noop transport"
        );
        Ok(())
    }
}
