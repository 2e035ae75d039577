//! The host graph owner, as seen from the engine.

use crate::types::{NetId, PeerRef};

/// The external owner of net identities and authored topology.
///
/// The engine consumes this interface while rebuilding fanout; it never
/// mutates the host through it.
///
/// # Implementations
///
/// - **In-memory**: `MemoryHost` - a flat path table, used by the CLI and tests
/// - **Embedded**: a scene graph whose nodes carry peer paths
pub trait NetHost {
    /// Returns the peers `net` declares, in authored order.
    ///
    /// Unknown nets declare no peers.
    fn declared_peers(&self, net: &NetId) -> Vec<PeerRef>;

    /// Resolves a peer reference authored on `from` into a live identity.
    ///
    /// # Returns
    /// * `Some(id)` - The reference points at a live net
    /// * `None` - The reference is stale, malformed or empty
    fn resolve(&self, from: &NetId, peer: &PeerRef) -> Option<NetId>;

    /// Whether `net` is currently active in its host context.
    ///
    /// While this is false the engine leaves the net's fanout as it was.
    fn is_ready(&self, net: &NetId) -> bool;

    /// The solver id `net` should start with when registered.
    fn declared_solver(&self, _net: &NetId) -> u16 {
        0
    }
}

impl<H: NetHost + ?Sized> NetHost for &H {
    fn declared_peers(&self, net: &NetId) -> Vec<PeerRef> {
        (**self).declared_peers(net)
    }

    fn resolve(&self, from: &NetId, peer: &PeerRef) -> Option<NetId> {
        (**self).resolve(from, peer)
    }

    fn is_ready(&self, net: &NetId) -> bool {
        (**self).is_ready(net)
    }

    fn declared_solver(&self, net: &NetId) -> u16 {
        (**self).declared_solver(net)
    }
}
