//! Built-in capability agents
//!
//! One agent per capability type. Each implements the base handler
//! contract, publishes through its [`CapabilityEmitter`], and exposes a
//! domain listener interface for application code.

pub mod asr;
pub mod audio_player;
pub mod display;
pub mod extension;
pub mod system;
pub mod text;
pub mod tts;

pub use asr::{AsrAgent, AsrFactory, AsrListener, AsrState};
pub use audio_player::{AudioPlayerAgent, AudioPlayerFactory, AudioPlayerListener, PlayerActivity};
pub use display::{DisplayAgent, DisplayFactory, DisplayListener};
pub use extension::{ExtensionAgent, ExtensionFactory, ExtensionListener};
pub use system::{SystemAgent, SystemFactory};
pub use text::{TextAgent, TextFactory, TextListener};
pub use tts::{TtsAgent, TtsFactory, TtsListener, TtsState};

use crate::builder::CapabilityFactory;
use std::sync::Arc;
use voxkit_capability::CapabilityError;
use voxkit_media::MediaError;

/// Synchronous media-layer rejections surface to the orchestrator as
/// capability backend errors.
pub(crate) fn media_err(e: MediaError) -> CapabilityError {
    CapabilityError::Backend(e.to_string())
}

/// Factories for the seven built-in agents.
pub fn default_factories() -> Vec<Arc<dyn CapabilityFactory>> {
    vec![
        Arc::new(AsrFactory),
        Arc::new(TtsFactory),
        Arc::new(AudioPlayerFactory),
        Arc::new(SystemFactory),
        Arc::new(DisplayFactory),
        Arc::new(ExtensionFactory),
        Arc::new(TextFactory),
    ]
}
