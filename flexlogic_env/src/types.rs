//! Common types for the FlexLogic host abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a net, owned by the host.
///
/// The engine stores and compares these but never derives meaning from
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetId(pub Uuid);

impl NetId {
    /// A fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// A reproducible identity for seeded runs.
    ///
    /// The seed occupies the low half verbatim, so distinct seeds never
    /// collide; the high half is a mixed copy that spreads the short
    /// display form.
    pub fn from_seed(seed: u64) -> Self {
        let mut mixed = seed ^ (seed >> 33);
        mixed = mixed.wrapping_mul(0xff51afd7ed558ccd);
        mixed ^= mixed >> 33;
        Self(Uuid::from_u64_pair(mixed, seed))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Leading 32 bits, as shown in logs.
    pub fn short(&self) -> u32 {
        (self.0.as_u128() >> 96) as u32
    }
}

impl Default for NetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.short())
    }
}

/// An authored reference to a peer net, as written by a human or a tool.
///
/// May be stale or point at nothing; resolution is the host's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRef(pub String);

impl PeerRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for PeerRef {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl std::fmt::Display for PeerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
