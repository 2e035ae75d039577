//! In-memory implementation of the host traits.

use crate::error::HostError;
use crate::host::NetHost;
use crate::notify::{ChangeEvent, ChangeSink};
use crate::types::{NetId, PeerRef};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct HostNet {
    path: String,
    peers: Vec<PeerRef>,
    solver: u16,
    ready: bool,
}

/// A flat, path-addressed net table.
///
/// Peer references are absolute paths. Removing a net leaves references to
/// it in place; they simply stop resolving, as a deleted scene node would.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    nets: HashMap<NetId, HostNet>,
    paths: HashMap<String, NetId>,
    next_seed: u64,
}

impl MemoryHost {
    /// Creates an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a net at `path` with a deterministic identity.
    pub fn insert(&mut self, path: &str) -> Result<NetId, HostError> {
        let mut id = NetId::from_seed(self.next_seed);
        while self.nets.contains_key(&id) {
            self.next_seed += 1;
            id = NetId::from_seed(self.next_seed);
        }
        self.next_seed += 1;
        self.insert_with_id(id, path)
    }

    /// Adds a net at `path` under a caller-chosen identity.
    pub fn insert_with_id(&mut self, id: NetId, path: &str) -> Result<NetId, HostError> {
        if self.nets.contains_key(&id) {
            return Err(HostError::DuplicateNet(id.to_string()));
        }
        if self.paths.contains_key(path) {
            return Err(HostError::DuplicatePath(path.to_string()));
        }

        self.paths.insert(path.to_string(), id);
        self.nets.insert(
            id,
            HostNet {
                path: path.to_string(),
                peers: Vec::new(),
                solver: 0,
                ready: true,
            },
        );
        Ok(id)
    }

    /// Removes a net. Peer references to it become stale.
    pub fn remove(&mut self, net: &NetId) -> Result<(), HostError> {
        let entry = self.nets.remove(net).ok_or_else(|| HostError::unknown(net))?;
        self.paths.remove(&entry.path);
        Ok(())
    }

    /// Looks up a net by path.
    pub fn lookup(&self, path: &str) -> Option<NetId> {
        self.paths.get(path).copied()
    }

    /// Returns the path a net was registered under.
    pub fn path_of(&self, net: &NetId) -> Option<&str> {
        self.nets.get(net).map(|n| n.path.as_str())
    }

    /// Declares `to` as a peer of `from`.
    ///
    /// Returns false if `to` was already declared.
    pub fn connect(&mut self, from: NetId, to: NetId) -> Result<bool, HostError> {
        let path = self.path_of(&to).ok_or_else(|| HostError::unknown(to))?;
        let peer = PeerRef::new(path);
        let entry = self.entry_mut(&from)?;
        if entry.peers.contains(&peer) {
            return Ok(false);
        }
        entry.peers.push(peer);
        Ok(true)
    }

    /// Withdraws `to` from the peers of `from`.
    ///
    /// Returns false if `to` was not declared.
    pub fn disconnect(&mut self, from: NetId, to: NetId) -> Result<bool, HostError> {
        let path = self.path_of(&to).ok_or_else(|| HostError::unknown(to))?;
        let peer = PeerRef::new(path);
        let entry = self.entry_mut(&from)?;
        let before = entry.peers.len();
        entry.peers.retain(|p| *p != peer);
        Ok(entry.peers.len() != before)
    }

    /// Appends a raw peer reference, which may be stale or duplicated.
    pub fn declare_peer(&mut self, from: NetId, peer: PeerRef) -> Result<(), HostError> {
        self.entry_mut(&from)?.peers.push(peer);
        Ok(())
    }

    /// Marks a net active or inactive in the host.
    pub fn set_ready(&mut self, net: NetId, ready: bool) -> Result<(), HostError> {
        self.entry_mut(&net)?.ready = ready;
        Ok(())
    }

    /// Sets the solver a net declares for itself.
    pub fn set_solver(&mut self, net: NetId, solver: u16) -> Result<(), HostError> {
        self.entry_mut(&net)?.solver = solver;
        Ok(())
    }

    /// Number of nets in the host.
    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    fn entry_mut(&mut self, net: &NetId) -> Result<&mut HostNet, HostError> {
        self.nets.get_mut(net).ok_or_else(|| HostError::unknown(net))
    }
}

impl NetHost for MemoryHost {
    fn declared_peers(&self, net: &NetId) -> Vec<PeerRef> {
        self.nets
            .get(net)
            .map(|n| n.peers.clone())
            .unwrap_or_default()
    }

    fn resolve(&self, _from: &NetId, peer: &PeerRef) -> Option<NetId> {
        if peer.is_empty() {
            return None;
        }
        self.lookup(peer.as_str())
    }

    fn is_ready(&self, net: &NetId) -> bool {
        self.nets.get(net).map(|n| n.ready).unwrap_or(false)
    }

    fn declared_solver(&self, net: &NetId) -> u16 {
        self.nets.get(net).map(|n| n.solver).unwrap_or(0)
    }
}

/// A sink that keeps every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drains the recorded notifications.
    pub fn take(&self) -> Vec<ChangeEvent> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    fn push(&self, event: ChangeEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

impl ChangeSink for RecordingSink {
    fn state_changed(&self, net: NetId, lanes: &[u8]) {
        self.push(ChangeEvent::StateChanged {
            net,
            lanes: lanes.to_vec(),
        });
    }

    fn connection_added(&self, from: NetId, to: NetId) {
        self.push(ChangeEvent::ConnectionAdded { from, to });
    }

    fn connection_removed(&self, from: NetId, to: NetId) {
        self.push(ChangeEvent::ConnectionRemoved { from, to });
    }
}
