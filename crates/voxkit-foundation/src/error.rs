use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone)]
pub enum RecoveryStrategy {
    Retry { max_attempts: u32 },
    Restart,
    Ignore,
    Fatal,
}

impl CoreError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            CoreError::Config(_) => RecoveryStrategy::Ignore,
            CoreError::InvalidTransition { .. } => RecoveryStrategy::Ignore,
            CoreError::ShutdownRequested | CoreError::Fatal(_) => RecoveryStrategy::Fatal,
        }
    }
}
