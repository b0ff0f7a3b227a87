//! Client-level error type

use thiserror::Error;
use voxkit_capability::{CapabilityError, CapabilityKind};
use voxkit_foundation::CoreError;
use voxkit_media::MediaError;

/// Orchestrator failures. Reported upstream where it makes sense; never
/// fatal to the client process.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The directive names a capability type with no registered factory
    #[error("No capability registered for type: {0}")]
    UnknownCapability(CapabilityKind),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Network error: {0}")]
    Network(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
