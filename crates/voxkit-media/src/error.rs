//! Error types for the driver registry and media engines

use crate::driver::DriverCategory;
use crate::signal::PlaybackState;
use thiserror::Error;

/// Synchronous rejections from the registry and the engines. Asynchronous
/// driver failures never surface here; they are normalized into the
/// `Error` playback state before reaching any listener.
#[derive(Error, Debug)]
pub enum MediaError {
    /// A driver with this name/category is already registered
    #[error("Driver already registered: {category}/{name}")]
    DuplicateName {
        category: DriverCategory,
        name: String,
    },

    /// The driver still has live instances bound to it
    #[error("Driver '{name}' in use by {bindings} bound instance(s)")]
    InUse { name: String, bindings: usize },

    /// Driver or player lookup failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation invalid in the instance's current state
    #[error("Operation '{operation}' invalid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: PlaybackState,
    },

    /// No driver accepts the source
    #[error("No driver accepts source: {uri}")]
    UnsupportedSource { uri: String },

    /// Seek past the reported duration
    #[error("Seek to {position_ms}ms past duration {duration_ms}ms")]
    OutOfRange { position_ms: u64, duration_ms: u64 },

    /// Instance allocation limit reached
    #[error("Player limit reached: {limit}")]
    Exhausted { limit: usize },

    /// Bad driver/source binding
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The driver rejected a request on the calling thread
    #[error("Driver error: {0}")]
    Driver(String),
}

pub type MediaResult<T> = Result<T, MediaError>;
