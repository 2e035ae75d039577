//! Persisted engine state.

use flexlogic_env::NetId;
use serde::{Deserialize, Serialize};

/// Whole-engine state in slot order: one identity and one vector of lane
/// ordinals (`0..=4`) per net.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub nets: Vec<NetId>,
    pub states: Vec<Vec<u8>>,
}

impl EngineSnapshot {
    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Lane ordinals recorded for `net`.
    pub fn state_of(&self, net: &NetId) -> Option<&[u8]> {
        self.nets
            .iter()
            .position(|n| n == net)
            .and_then(|i| self.states.get(i))
            .map(Vec::as_slice)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
