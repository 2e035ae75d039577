//! Seeded circuit generation and engine consistency checks.
//!
//! All randomness comes from a `ChaCha8Rng` seeded from the run seed, so a
//! failing seed reproduces the exact same circuit and edit sequence.

use flexlogic_core::{LogicEngine, WireState, WIDTH};
use flexlogic_env::{HostError, MemoryHost, NetHost, NetId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

use crate::error::SimError;

/// A generated tree: one root driving every other net through its subtree.
#[derive(Debug, Clone)]
pub struct Tree {
    pub root: NetId,

    /// Every net, root first, in creation order
    pub nets: Vec<NetId>,

    /// Nets with no loads
    pub leaves: Vec<NetId>,
}

/// Deterministic source of circuits and stimulus.
pub struct CircuitGen {
    rng: ChaCha8Rng,
}

impl CircuitGen {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Builds a random tree of `nets` nets in `host`, each driver having at
    /// most `degree` loads.
    pub fn random_tree(
        &mut self,
        host: &mut MemoryHost,
        nets: usize,
        degree: usize,
    ) -> Result<Tree, HostError> {
        let nets = nets.max(1);
        let degree = degree.max(1);

        let mut ids = Vec::with_capacity(nets);
        let mut children = vec![0usize; nets];
        ids.push(host.insert("tree/0")?);

        for i in 1..nets {
            let open: Vec<usize> = (0..i).filter(|j| children[*j] < degree).collect();
            let parent = open[self.rng.gen_range(0..open.len())];
            let id = host.insert(&format!("tree/{}", i))?;
            host.connect(ids[parent], id)?;
            children[parent] += 1;
            ids.push(id);
        }

        let leaves = ids
            .iter()
            .zip(&children)
            .filter(|(_, c)| **c == 0)
            .map(|(id, _)| *id)
            .collect();

        Ok(Tree {
            root: ids[0],
            nets: ids,
            leaves,
        })
    }

    /// A random bit pattern, one bit per lane.
    pub fn random_value(&mut self) -> u32 {
        self.rng.gen()
    }

    /// Random raw lane ordinals. Each lane is out of range with probability
    /// `invalid_ratio`.
    pub fn random_lanes(&mut self, invalid_ratio: f64) -> Vec<i32> {
        (0..WIDTH)
            .map(|_| {
                if self.rng.gen_bool(invalid_ratio) {
                    self.rng.gen_range(5..100)
                } else {
                    self.rng.gen_range(0..WireState::COUNT as i32)
                }
            })
            .collect()
    }

    /// Picks one element, or `None` from an empty slice.
    pub fn pick<T: Copy>(&mut self, items: &[T]) -> Option<T> {
        if items.is_empty() {
            None
        } else {
            Some(items[self.rng.gen_range(0..items.len())])
        }
    }
}

/// Verifies the engine's registry, storage and topology agree.
///
/// Every registered net has a state of full width, every fanout entry names
/// a registered net exactly once, and fan-in mirrors fanout.
pub fn check_consistency<H: NetHost>(engine: &LogicEngine<H>) -> Result<(), SimError> {
    let nets = engine.get_nets();
    let registered: HashSet<NetId> = nets.iter().copied().collect();

    if registered.len() != nets.len() {
        return Err(SimError::check("duplicate identity in net list"));
    }
    if engine.net_count() != nets.len() {
        return Err(SimError::check(format!(
            "net_count {} disagrees with {} listed nets",
            engine.net_count(),
            nets.len()
        )));
    }

    let states = engine.get_state_snapshot();
    if states.len() != nets.len() || states.iter().any(|s| s.len() != WIDTH) {
        return Err(SimError::check("state snapshot does not match net list"));
    }

    for net in &nets {
        let fanout = engine.fanout_of(net)?;
        let mut seen = HashSet::new();
        for load in &fanout {
            if !registered.contains(load) {
                return Err(SimError::check(format!("{} drives unregistered {}", net, load)));
            }
            if !seen.insert(*load) {
                return Err(SimError::check(format!("{} drives {} twice", net, load)));
            }
            if !engine.fanin_of(load)?.contains(net) {
                return Err(SimError::check(format!("fan-in of {} is missing {}", load, net)));
            }
        }

        for driver in engine.fanin_of(net)? {
            if !engine.fanout_of(&driver)?.contains(net) {
                return Err(SimError::check(format!(
                    "fan-in of {} lists {} which does not drive it",
                    net, driver
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_shape() {
        let mut host = MemoryHost::new();
        let tree = CircuitGen::new(7).random_tree(&mut host, 20, 2).unwrap();

        assert_eq!(tree.nets.len(), 20);
        assert_eq!(host.len(), 20);
        assert!(!tree.leaves.is_empty());
        assert!(!tree.leaves.contains(&tree.root));
        for net in &tree.nets {
            assert!(host.declared_peers(net).len() <= 2);
        }
    }

    #[test]
    fn test_tree_is_deterministic() {
        let mut host_a = MemoryHost::new();
        let mut host_b = MemoryHost::new();
        let a = CircuitGen::new(99).random_tree(&mut host_a, 30, 3).unwrap();
        let b = CircuitGen::new(99).random_tree(&mut host_b, 30, 3).unwrap();

        assert_eq!(a.nets, b.nets);
        assert_eq!(a.leaves, b.leaves);
    }

    #[test]
    fn test_single_net_tree() {
        let mut host = MemoryHost::new();
        let tree = CircuitGen::new(1).random_tree(&mut host, 0, 0).unwrap();
        assert_eq!(tree.nets, vec![tree.root]);
        assert_eq!(tree.leaves, vec![tree.root]);
    }

    #[test]
    fn test_random_lanes_range() {
        let mut gen = CircuitGen::new(3);
        let clean = gen.random_lanes(0.0);
        assert_eq!(clean.len(), WIDTH);
        assert!(clean.iter().all(|v| (0..5).contains(v)));

        let dirty = gen.random_lanes(1.0);
        assert!(dirty.iter().all(|v| *v >= 5));
    }

    #[test]
    fn test_consistency_on_fresh_engine() {
        let mut host = MemoryHost::new();
        let tree = CircuitGen::new(5).random_tree(&mut host, 10, 3).unwrap();
        let mut engine = LogicEngine::new(host);
        for id in &tree.nets {
            engine.add_net(*id, None).unwrap();
        }
        engine.restore_connections();

        assert!(check_consistency(&engine).is_ok());
    }

    #[test]
    fn test_consistency_accepts_self_loop() {
        let mut host = MemoryHost::new();
        let a = host.insert("a").unwrap();
        let b = host.insert("b").unwrap();
        host.connect(a, a).unwrap();
        host.connect(a, b).unwrap();
        let mut engine = LogicEngine::new(host);
        engine.add_net(a, None).unwrap();
        engine.add_net(b, None).unwrap();
        engine.restore_connections();

        assert_eq!(engine.fanout_of(&a).unwrap(), vec![a, b]);
        assert!(check_consistency(&engine).is_ok());
    }
}
