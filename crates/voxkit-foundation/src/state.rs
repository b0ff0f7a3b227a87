use crate::error::CoreError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Client session lifecycle. One session per process, created at startup
/// and torn down at shutdown.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientState {
    Created,
    Initializing,
    Running,
    Recovering { from_error: String },
    Stopping,
    Stopped,
}

impl ClientState {
    fn name(&self) -> &'static str {
        match self {
            ClientState::Created => "Created",
            ClientState::Initializing => "Initializing",
            ClientState::Running => "Running",
            ClientState::Recovering { .. } => "Recovering",
            ClientState::Stopping => "Stopping",
            ClientState::Stopped => "Stopped",
        }
    }
}

pub struct LifecycleManager {
    state: Arc<RwLock<ClientState>>,
    state_tx: Sender<ClientState>,
    state_rx: Receiver<ClientState>,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(ClientState::Created)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: ClientState) -> Result<(), CoreError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (ClientState::Created, ClientState::Initializing)
                | (ClientState::Initializing, ClientState::Running)
                | (ClientState::Initializing, ClientState::Stopping)
                | (ClientState::Running, ClientState::Recovering { .. })
                | (ClientState::Running, ClientState::Stopping)
                | (ClientState::Recovering { .. }, ClientState::Running)
                | (ClientState::Recovering { .. }, ClientState::Stopping)
                | (ClientState::Stopping, ClientState::Stopped)
        );

        if !valid {
            return Err(CoreError::InvalidTransition {
                from: current.name().into(),
                to: new_state.name().into(),
            });
        }

        tracing::info!(
            target: "voxkit::lifecycle",
            "State transition: {:?} -> {:?}",
            *current,
            new_state
        );
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> ClientState {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> Receiver<ClientState> {
        self.state_rx.clone()
    }
}
