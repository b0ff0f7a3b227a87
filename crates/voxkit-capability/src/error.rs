//! Error types for capability agents

use crate::types::CapabilityKind;
use thiserror::Error;

/// Errors a capability handler can return from directive processing.
/// None of these are fatal to the client; the orchestrator reports them
/// upstream and keeps serving.
#[derive(Error, Debug)]
pub enum CapabilityError {
    /// The directive name is not part of this capability's vocabulary
    #[error("{capability} does not handle directive '{name}'")]
    UnknownDirective {
        capability: CapabilityKind,
        name: String,
    },

    /// The directive payload is missing or malformed
    #[error("Invalid payload: {0}")]
    Payload(String),

    /// Operation invalid in the agent's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The media/driver layer rejected the request
    #[error("Backend error: {0}")]
    Backend(String),
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;
