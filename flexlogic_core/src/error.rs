//! Error types for the logic engine.

use flexlogic_env::NetId;
use thiserror::Error;

/// Recoverable failures returned by engine operations.
///
/// None of these leave the engine in an inconsistent state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogicError {
    #[error("Unknown net: {0}")]
    UnknownNet(NetId),

    #[error("Net already registered: {0}")]
    DuplicateNet(NetId),

    #[error("Invalid state value {value} at lane {lane}")]
    InvalidStateValue { lane: usize, value: i32 },

    #[error("Invalid solver id {solver} ({registered} solvers registered)")]
    InvalidSolverId { solver: u16, registered: usize },

    #[error("State vector has {actual} lanes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A step from `start` invoked more solvers than the configured bound.
    /// Usually a feedback loop in the driver graph.
    #[error("Propagation from {start} exceeded {limit} events")]
    PropagationLimit { start: NetId, limit: usize },
}

/// A lane that was rejected during a state write and forced to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidLane {
    pub lane: usize,
    pub value: i32,
}

impl From<InvalidLane> for LogicError {
    fn from(bad: InvalidLane) -> Self {
        LogicError::InvalidStateValue {
            lane: bad.lane,
            value: bad.value,
        }
    }
}

impl std::fmt::Display for InvalidLane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lane {} = {}", self.lane, self.value)
    }
}
