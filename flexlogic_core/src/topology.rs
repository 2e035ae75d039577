//! Topology registry: per-slot fanout and fan-in lists.
//!
//! Fanout is never patched incrementally from host events. Any change is
//! answered with a full rebuild from the host's declared peer lists, which
//! is O(nets x average fanout). That is a ceiling for very large graphs,
//! but topology changes are rare next to simulation steps.

use crate::store::{NetStore, Slot};
use flexlogic_env::NetHost;
use tracing::{debug, info, warn};

/// Driver/load adjacency between slots.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Slots each slot drives, in declared order
    fanout: Vec<Vec<Slot>>,

    /// Slots driving each slot, in driver slot order
    fanin: Vec<Vec<Slot>>,
}

/// Outcome of a `restore` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Nets whose fanout was rebuilt
    pub rebuilt: usize,

    /// Nets skipped because the host reported them not ready
    pub skipped: usize,

    /// Peer references the host could not resolve
    pub unresolved: usize,

    /// Peers that resolved to a net the engine does not hold
    pub unregistered: usize,

    /// Edges present after the rebuild but not before, as (driver, load)
    pub added: Vec<(Slot, Slot)>,

    /// Edges present before the rebuild but not after, as (driver, load)
    pub removed: Vec<(Slot, Slot)>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots tracked.
    pub fn len(&self) -> usize {
        self.fanout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fanout.is_empty()
    }

    /// Appends an empty entry for a newly allocated slot.
    pub fn insert_slot(&mut self) -> Slot {
        self.fanout.push(Vec::new());
        self.fanin.push(Vec::new());
        Slot(self.fanout.len() - 1)
    }

    /// Drops `removed` and renumbers every reference to match a compacted
    /// store.
    ///
    /// Lists of nets that will not be rebuilt (host not ready) must stay
    /// valid, so references are remapped rather than left dangling.
    pub fn remove_slot(&mut self, removed: Slot) {
        self.fanout.remove(removed.0);
        self.fanin.remove(removed.0);

        for list in self.fanout.iter_mut().chain(self.fanin.iter_mut()) {
            list.retain(|s| *s != removed);
            for s in list.iter_mut() {
                if s.0 > removed.0 {
                    s.0 -= 1;
                }
            }
        }
    }

    /// Slots driven by `slot`.
    pub fn fanout(&self, slot: Slot) -> &[Slot] {
        &self.fanout[slot.0]
    }

    /// Slots driving `slot`.
    pub fn fanin(&self, slot: Slot) -> &[Slot] {
        &self.fanin[slot.0]
    }

    /// Total number of driver/load edges.
    pub fn edge_count(&self) -> usize {
        self.fanout.iter().map(Vec::len).sum()
    }

    /// Rebuilds every ready net's fanout from the host's declared peers.
    ///
    /// Per net, peers are resolved in declared order. Unresolved peers,
    /// peers the store does not hold and repeats are skipped. A net naming
    /// itself keeps that edge and drives itself like any other loop. Nets
    /// the host reports as not ready keep their current fanout.
    pub fn restore<H: NetHost>(&mut self, store: &NetStore, host: &H) -> RestoreReport {
        debug_assert_eq!(self.len(), store.len());
        let mut report = RestoreReport::default();

        for (i, id) in store.ids().iter().enumerate() {
            let slot = Slot(i);
            if !host.is_ready(id) {
                debug!(net = %id, "Host not ready, keeping fanout");
                report.skipped += 1;
                continue;
            }

            let mut rebuilt: Vec<Slot> = Vec::new();
            for peer in host.declared_peers(id) {
                let Some(peer_id) = host.resolve(id, &peer) else {
                    warn!(net = %id, peer = %peer, "Skipping unresolved peer");
                    report.unresolved += 1;
                    continue;
                };
                let Ok(target) = store.slot_of(&peer_id) else {
                    debug!(net = %id, peer = %peer_id, "Skipping unregistered peer");
                    report.unregistered += 1;
                    continue;
                };
                if rebuilt.contains(&target) {
                    continue;
                }
                rebuilt.push(target);
            }

            let previous = std::mem::replace(&mut self.fanout[i], rebuilt);
            let current = &self.fanout[i];
            report.removed.extend(
                previous
                    .iter()
                    .filter(|s| !current.contains(s))
                    .map(|s| (slot, *s)),
            );
            report.added.extend(
                current
                    .iter()
                    .filter(|s| !previous.contains(s))
                    .map(|s| (slot, *s)),
            );
            report.rebuilt += 1;
        }

        self.rebuild_fanin();

        info!(
            nets = store.len(),
            rebuilt = report.rebuilt,
            skipped = report.skipped,
            edges = self.edge_count(),
            "Restored connections"
        );
        report
    }

    fn rebuild_fanin(&mut self) {
        for list in self.fanin.iter_mut() {
            list.clear();
        }
        for (driver, loads) in self.fanout.iter().enumerate() {
            for load in loads {
                self.fanin[load.0].push(Slot(driver));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolverId;
    use flexlogic_env::{MemoryHost, NetId, PeerRef};

    fn setup(paths: &[&str]) -> (MemoryHost, NetStore, Topology, Vec<NetId>) {
        let mut host = MemoryHost::new();
        let mut store = NetStore::new();
        let mut topology = Topology::new();
        let mut ids = Vec::new();
        for path in paths {
            let id = host.insert(path).unwrap();
            store.allocate(id, SolverId::WIRE).unwrap();
            topology.insert_slot();
            ids.push(id);
        }
        (host, store, topology, ids)
    }

    #[test]
    fn test_restore_builds_fanout_and_fanin() {
        let (mut host, store, mut topology, ids) = setup(&["a", "b", "c"]);
        host.connect(ids[0], ids[2]).unwrap();
        host.connect(ids[0], ids[1]).unwrap();
        host.connect(ids[1], ids[2]).unwrap();

        let report = topology.restore(&store, &host);

        assert_eq!(report.rebuilt, 3);
        assert_eq!(topology.fanout(Slot(0)), &[Slot(2), Slot(1)]);
        assert_eq!(topology.fanin(Slot(2)), &[Slot(0), Slot(1)]);
        assert_eq!(topology.edge_count(), 3);
        assert_eq!(report.added.len(), 3);
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_restore_skips_bad_peers() {
        let (mut host, store, mut topology, ids) = setup(&["a", "b"]);
        host.declare_peer(ids[0], PeerRef::new("missing")).unwrap();
        host.declare_peer(ids[0], PeerRef::new("a")).unwrap();
        host.declare_peer(ids[0], PeerRef::new("b")).unwrap();
        host.declare_peer(ids[0], PeerRef::new("b")).unwrap();
        // resolves in the host but was never registered with the store
        host.insert("ghost").unwrap();
        host.declare_peer(ids[0], PeerRef::new("ghost")).unwrap();

        let report = topology.restore(&store, &host);

        assert_eq!(topology.fanout(Slot(0)), &[Slot(0), Slot(1)]);
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.unregistered, 1);
    }

    #[test]
    fn test_restore_leaves_unready_net_alone() {
        let (mut host, store, mut topology, ids) = setup(&["a", "b", "c"]);
        host.connect(ids[0], ids[1]).unwrap();
        topology.restore(&store, &host);

        host.set_ready(ids[0], false).unwrap();
        host.disconnect(ids[0], ids[1]).unwrap();
        host.connect(ids[0], ids[2]).unwrap();
        let report = topology.restore(&store, &host);

        assert_eq!(report.skipped, 1);
        assert_eq!(topology.fanout(Slot(0)), &[Slot(1)]);
        assert_eq!(topology.fanin(Slot(1)), &[Slot(0)]);
    }

    #[test]
    fn test_restore_reports_removed_edges() {
        let (mut host, store, mut topology, ids) = setup(&["a", "b"]);
        host.connect(ids[0], ids[1]).unwrap();
        topology.restore(&store, &host);

        host.disconnect(ids[0], ids[1]).unwrap();
        let report = topology.restore(&store, &host);

        assert_eq!(report.removed, vec![(Slot(0), Slot(1))]);
        assert!(topology.fanout(Slot(0)).is_empty());
        assert!(topology.fanin(Slot(1)).is_empty());
    }

    #[test]
    fn test_remove_slot_remaps_references() {
        let (mut host, store, mut topology, ids) = setup(&["a", "b", "c", "d"]);
        host.connect(ids[0], ids[1]).unwrap();
        host.connect(ids[0], ids[3]).unwrap();
        host.connect(ids[3], ids[2]).unwrap();
        topology.restore(&store, &host);

        topology.remove_slot(Slot(1));

        assert_eq!(topology.len(), 3);
        assert_eq!(topology.fanout(Slot(0)), &[Slot(2)]);
        assert_eq!(topology.fanout(Slot(2)), &[Slot(1)]);
        assert_eq!(topology.fanin(Slot(1)), &[Slot(2)]);
    }

    #[test]
    fn test_restore_keeps_self_reference() {
        let (mut host, store, mut topology, ids) = setup(&["a", "b"]);
        host.connect(ids[0], ids[0]).unwrap();
        host.connect(ids[0], ids[1]).unwrap();

        let report = topology.restore(&store, &host);

        assert_eq!(topology.fanout(Slot(0)), &[Slot(0), Slot(1)]);
        assert_eq!(topology.fanin(Slot(0)), &[Slot(0)]);
        assert_eq!(report.added, vec![(Slot(0), Slot(0)), (Slot(0), Slot(1))]);

        topology.remove_slot(Slot(1));
        assert_eq!(topology.fanout(Slot(0)), &[Slot(0)]);
    }
}
