use flexlogic_core::LogicError;
use flexlogic_env::HostError;
use thiserror::Error;

/// Why a scenario or an export failed.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Engine error: {0}")]
    Engine(#[from] LogicError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Check failed: {0}")]
    Check(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    pub fn check(msg: impl Into<String>) -> Self {
        SimError::Check(msg.into())
    }
}
