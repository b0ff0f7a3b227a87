//! Wakeup handler seam
//!
//! Wake-word detection is an external collaborator; the core only consumes
//! a simple wake signal and routes it to the ASR agent.

use crate::error::ClientResult;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupDetectState {
    Detecting,
    Detected,
    Fail,
}

pub trait WakeupListener: Send + Sync {
    fn on_wakeup_state(&self, state: WakeupDetectState);
}

pub trait WakeupHandler: Send + Sync {
    fn set_listener(&self, listener: Arc<dyn WakeupListener>);

    /// Start the detection engine.
    fn start_wakeup(&self) -> ClientResult<()>;
}
