//! Change notifications emitted toward the host.

use crate::types::NetId;
use serde::{Deserialize, Serialize};

/// Receiver of fire-and-forget change notifications.
///
/// Lane values are passed as ordinals (`0..=4`) so hosts need not depend
/// on the engine's state type.
pub trait ChangeSink: Send + Sync {
    /// A net's state vector was written or changed during a step.
    fn state_changed(&self, net: NetId, lanes: &[u8]);

    /// `from` started driving `to`.
    fn connection_added(&self, _from: NetId, _to: NetId) {}

    /// `from` stopped driving `to`.
    fn connection_removed(&self, _from: NetId, _to: NetId) {}
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ChangeSink for NullSink {
    fn state_changed(&self, _net: NetId, _lanes: &[u8]) {}
}

/// A recorded notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    StateChanged { net: NetId, lanes: Vec<u8> },
    ConnectionAdded { from: NetId, to: NetId },
    ConnectionRemoved { from: NetId, to: NetId },
}
