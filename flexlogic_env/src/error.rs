//! Error types for the FlexLogic host abstraction.

use thiserror::Error;

/// Errors raised by host-side bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    /// The net is not known to this host
    #[error("Unknown net: {0}")]
    UnknownNet(String),

    /// The identity is already registered with this host
    #[error("Duplicate net: {0}")]
    DuplicateNet(String),

    /// Another net already answers to this path
    #[error("Duplicate path: {0}")]
    DuplicatePath(String),
}

impl HostError {
    /// Creates an unknown-net error.
    pub fn unknown(net: impl std::fmt::Display) -> Self {
        Self::UnknownNet(net.to_string())
    }
}
