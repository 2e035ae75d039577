//! The simulation engine: the one component hosts talk to.
//!
//! `LogicEngine` composes the state store, the topology registry, the
//! solver registry and the stepper, and keeps them consistent with the
//! host's graph of identities. All methods take `&mut self` or `&self`, so
//! a step can never be re-entered while it drains.

use crate::config::{CyclePolicy, EngineConfig};
use crate::error::{InvalidLane, LogicError};
use crate::snapshot::EngineSnapshot;
use crate::solver::{Solver, SolverId, SolverRegistry};
use crate::stepper::Stepper;
use crate::store::{self, NetStore, Slot};
use crate::topology::{RestoreReport, Topology};
use crate::wire::{self, StateVector, WireState, WIDTH};
use flexlogic_env::{ChangeSink, NetHost, NetId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a successful `step_from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Net the step started from
    pub start: NetId,

    /// Solver invocations, counting repeats
    pub events: usize,

    /// Nets whose state differs from before the step, in slot order
    pub changed: Vec<NetId>,
}

/// Delay-free, single-threaded logic resolver over a host-owned net graph.
pub struct LogicEngine<H: NetHost> {
    config: EngineConfig,
    host: H,
    store: NetStore,
    topology: Topology,
    solvers: SolverRegistry,
    stepper: Stepper,
    sink: Option<Arc<dyn ChangeSink>>,
}

impl<H: NetHost> LogicEngine<H> {
    /// Creates an engine with the default configuration.
    pub fn new(host: H) -> Self {
        Self::with_config(host, EngineConfig::default())
    }

    pub fn with_config(host: H, config: EngineConfig) -> Self {
        let solvers = if config.builtin_gates {
            SolverRegistry::with_builtin_gates()
        } else {
            SolverRegistry::new()
        };

        Self {
            stepper: Stepper::new(config.cycle_policy),
            config,
            host,
            store: NetStore::new(),
            topology: Topology::new(),
            solvers,
            sink: None,
        }
    }

    /// Attaches a receiver for change notifications.
    pub fn with_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_cycle_policy(&mut self, policy: CyclePolicy) {
        self.config.cycle_policy = policy;
        self.stepper.set_policy(policy);
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host. Topology edits made here take effect at
    /// the next `restore_connections`.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Lanes per net.
    pub fn width(&self) -> usize {
        WIDTH
    }

    pub fn net_count(&self) -> usize {
        self.store.len()
    }

    pub fn contains(&self, id: &NetId) -> bool {
        self.store.contains(id)
    }

    // ------------------------------------------------------------------
    // Solvers
    // ------------------------------------------------------------------

    /// Registers an additional behavior and returns its id.
    pub fn register_solver(&mut self, solver: Box<dyn Solver>) -> Result<SolverId, LogicError> {
        let id = self.solvers.register(solver)?;
        debug!(solver = %id, "Registered solver");
        Ok(id)
    }

    pub fn solver_count(&self) -> usize {
        self.solvers.len()
    }

    pub fn get_solver(&self, id: &NetId) -> Result<SolverId, LogicError> {
        let slot = self.store.slot_of(id)?;
        Ok(self.store.solver(slot))
    }

    pub fn set_solver(&mut self, id: &NetId, solver: SolverId) -> Result<(), LogicError> {
        let slot = self.store.slot_of(id)?;
        self.store.set_solver(slot, solver, self.solvers.len())
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Registers `id` at the next slot.
    ///
    /// The net starts with every lane `Unknown` and the solver its host
    /// declares, then `initial` is laid over it lane by lane. Fanout stays
    /// empty until the next `restore_connections`.
    ///
    /// # Returns
    /// * `Ok(corrected)` - Lanes of `initial` that were out of range and
    ///   forced to `Unknown`
    /// * `Err(DuplicateNet | SizeMismatch | InvalidSolverId | InvalidStateValue)` -
    ///   Nothing was registered
    pub fn add_net(
        &mut self,
        id: NetId,
        initial: Option<&[i32]>,
    ) -> Result<Vec<InvalidLane>, LogicError> {
        if self.store.contains(&id) {
            return Err(LogicError::DuplicateNet(id));
        }

        let parsed = initial
            .map(|lanes| store::parse_lanes(lanes, self.config.strict_lanes))
            .transpose()?;
        let solver = self
            .solvers
            .validate(SolverId(self.host.declared_solver(&id)))?;

        let slot = self.store.allocate(id, solver)?;
        let topo_slot = self.topology.insert_slot();
        debug_assert_eq!(slot, topo_slot);

        let corrected = match parsed {
            Some((states, corrected)) => {
                self.store.write(slot, states);
                self.report_corrections(&id, &corrected);
                self.notify_state(slot);
                corrected
            }
            None => Vec::new(),
        };

        debug!(net = %id, slot = %slot, solver = %solver, "Added net");
        Ok(corrected)
    }

    /// Unregisters `id`, compacts the store and rebuilds all fanout.
    pub fn remove_net(&mut self, id: &NetId) -> Result<RestoreReport, LogicError> {
        let slot = self.store.slot_of(id)?;

        let dropped: Vec<(NetId, NetId)> = self
            .topology
            .fanin(slot)
            .iter()
            .map(|driver| (self.store.id_at(*driver), *id))
            .chain(
                self.topology
                    .fanout(slot)
                    .iter()
                    .filter(|load| **load != slot)
                    .map(|load| (*id, self.store.id_at(*load))),
            )
            .collect();

        self.store.remove(id)?;
        self.topology.remove_slot(slot);
        debug!(net = %id, slot = %slot, "Removed net");

        if let Some(sink) = &self.sink {
            for (from, to) in dropped {
                sink.connection_removed(from, to);
            }
        }

        Ok(self.restore_connections())
    }

    /// Rebuilds every ready net's fanout from the host's declared peers.
    pub fn restore_connections(&mut self) -> RestoreReport {
        let report = self.topology.restore(&self.store, &self.host);

        if let Some(sink) = &self.sink {
            for (from, to) in &report.removed {
                sink.connection_removed(self.store.id_at(*from), self.store.id_at(*to));
            }
            for (from, to) in &report.added {
                sink.connection_added(self.store.id_at(*from), self.store.id_at(*to));
            }
        }
        report
    }

    /// Identities of the nets `id` drives, in fanout order.
    pub fn fanout_of(&self, id: &NetId) -> Result<Vec<NetId>, LogicError> {
        let slot = self.store.slot_of(id)?;
        Ok(self.ids_of(self.topology.fanout(slot)))
    }

    /// Identities of the nets driving `id`.
    pub fn fanin_of(&self, id: &NetId) -> Result<Vec<NetId>, LogicError> {
        let slot = self.store.slot_of(id)?;
        Ok(self.ids_of(self.topology.fanin(slot)))
    }

    // ------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------

    /// Propagates breadth-first from `id` until the queue empties.
    ///
    /// On `PropagationLimit` the state reached so far is kept and changed
    /// nets are still reported to the sink.
    pub fn step_from(&mut self, id: &NetId) -> Result<StepReport, LogicError> {
        let start = self.store.slot_of(id)?;
        let before = self.store.states().to_vec();

        let result = self
            .stepper
            .run(start, &mut self.store, &self.topology, &self.solvers);

        let changed: Vec<Slot> = before
            .iter()
            .zip(self.store.states())
            .enumerate()
            .filter(|(_, (old, new))| old != new)
            .map(|(i, _)| Slot(i))
            .collect();
        for slot in &changed {
            self.notify_state(*slot);
        }

        match result {
            Ok(events) => {
                debug!(net = %id, events, changed = changed.len(), "Step complete");
                Ok(StepReport {
                    start: *id,
                    events,
                    changed: self.ids_of(&changed),
                })
            }
            Err(err) => {
                warn!(net = %id, error = %err, "Step abandoned");
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // State access
    // ------------------------------------------------------------------

    pub fn get_state(&self, id: &NetId) -> Result<StateVector, LogicError> {
        let slot = self.store.slot_of(id)?;
        Ok(*self.store.state(slot))
    }

    /// Writes raw lane ordinals to `id`.
    ///
    /// Out-of-range lanes become `Unknown` and are returned (or, with
    /// `strict_lanes`, fail the write). A slice that is not exactly `WIDTH`
    /// long is rejected.
    pub fn set_state(&mut self, id: &NetId, lanes: &[i32]) -> Result<Vec<InvalidLane>, LogicError> {
        let slot = self.store.slot_of(id)?;
        let corrected = self
            .store
            .write_lanes(slot, lanes, self.config.strict_lanes)?;
        self.report_corrections(id, &corrected);
        self.notify_state(slot);
        Ok(corrected)
    }

    /// Drives every lane from a bit pattern, lane 0 from bit 0.
    pub fn set_value(&mut self, id: &NetId, bits: u32) -> Result<(), LogicError> {
        let slot = self.store.slot_of(id)?;
        self.store.write(slot, wire::from_value_bits(bits));
        self.notify_state(slot);
        Ok(())
    }

    /// Bit mask of the lanes of `id` holding `which`.
    pub fn mask(&self, id: &NetId, which: WireState) -> Result<u32, LogicError> {
        let slot = self.store.slot_of(id)?;
        Ok(wire::lane_mask(self.store.state(slot), which))
    }

    /// Registered identities in slot order.
    pub fn get_nets(&self) -> Vec<NetId> {
        self.store.ids().to_vec()
    }

    /// Lane ordinals of every net in slot order.
    pub fn get_state_snapshot(&self) -> Vec<Vec<u8>> {
        self.store.states().iter().map(wire::ordinals).collect()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            nets: self.get_nets(),
            states: self.get_state_snapshot(),
        }
    }

    /// Writes every vector in `snapshot` to its net.
    ///
    /// Everything is validated before the first write: an unregistered
    /// identity, a wrong-width vector or mismatched list lengths leave the
    /// engine untouched.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &EngineSnapshot,
    ) -> Result<Vec<(NetId, InvalidLane)>, LogicError> {
        if snapshot.nets.len() != snapshot.states.len() {
            return Err(LogicError::SizeMismatch {
                expected: snapshot.nets.len(),
                actual: snapshot.states.len(),
            });
        }

        let mut staged = Vec::with_capacity(snapshot.len());
        for (id, lanes) in snapshot.nets.iter().zip(&snapshot.states) {
            let slot = self.store.slot_of(id)?;
            let raw: Vec<i32> = lanes.iter().map(|v| i32::from(*v)).collect();
            let (states, corrected) = store::parse_lanes(&raw, self.config.strict_lanes)?;
            staged.push((*id, slot, states, corrected));
        }

        let mut report = Vec::new();
        for (id, slot, states, corrected) in staged {
            self.store.write(slot, states);
            self.report_corrections(&id, &corrected);
            self.notify_state(slot);
            report.extend(corrected.into_iter().map(|bad| (id, bad)));
        }
        Ok(report)
    }

    fn ids_of(&self, slots: &[Slot]) -> Vec<NetId> {
        slots.iter().map(|s| self.store.id_at(*s)).collect()
    }

    fn notify_state(&self, slot: Slot) {
        if let Some(sink) = &self.sink {
            sink.state_changed(self.store.id_at(slot), &wire::ordinals(self.store.state(slot)));
        }
    }

    fn report_corrections(&self, id: &NetId, corrected: &[InvalidLane]) {
        for bad in corrected {
            warn!(net = %id, lane = bad.lane, value = bad.value, "Invalid lane value, forced to Unknown");
        }
    }
}

impl<H: NetHost + std::fmt::Debug> std::fmt::Debug for LogicEngine<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicEngine")
            .field("config", &self.config)
            .field("host", &self.host)
            .field("nets", &self.store.len())
            .field("edges", &self.topology.edge_count())
            .field("solvers", &self.solvers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CyclePolicy;
    use crate::solver::{GateOp, GateSolver};
    use flexlogic_env::{ChangeEvent, MemoryHost, RecordingSink};
    use proptest::prelude::*;

    fn lanes(state: WireState) -> Vec<i32> {
        vec![i32::from(state.ordinal()); WIDTH]
    }

    fn engine_with(paths: &[&str]) -> (LogicEngine<MemoryHost>, Vec<NetId>) {
        let mut host = MemoryHost::new();
        let ids = paths.iter().map(|p| host.insert(p).unwrap()).collect();
        (LogicEngine::new(host), ids)
    }

    #[test]
    fn test_buffer_scenario() {
        let (mut engine, ids) = engine_with(&["x", "y"]);
        let (x, y) = (ids[0], ids[1]);
        engine.host_mut().connect(x, y).unwrap();

        engine.add_net(x, Some(&lanes(WireState::DrivenHigh))).unwrap();
        engine.add_net(y, Some(&lanes(WireState::Floating))).unwrap();
        engine.restore_connections();

        let report = engine.step_from(&x).unwrap();

        assert_eq!(engine.get_state(&y).unwrap(), wire::uniform(WireState::DrivenHigh));
        assert_eq!(report.changed, vec![y]);
        assert_eq!(report.events, 2);
    }

    #[test]
    fn test_conflict_scenario() {
        let (mut engine, ids) = engine_with(&["x", "y", "z"]);
        let (x, y, z) = (ids[0], ids[1], ids[2]);
        engine.host_mut().connect(x, y).unwrap();
        engine.host_mut().connect(z, y).unwrap();

        engine.add_net(x, Some(&lanes(WireState::DrivenHigh))).unwrap();
        engine.add_net(y, Some(&lanes(WireState::Floating))).unwrap();
        engine.add_net(z, Some(&lanes(WireState::DrivenLow))).unwrap();
        engine.restore_connections();

        engine.step_from(&x).unwrap();
        assert_eq!(engine.get_state(&y).unwrap(), wire::uniform(WireState::DrivenHigh));
        engine.step_from(&z).unwrap();
        assert_eq!(engine.get_state(&y).unwrap(), wire::uniform(WireState::Conflict));

        // conflict does not clear when the winner drives again
        engine.step_from(&x).unwrap();
        assert_eq!(engine.get_state(&y).unwrap(), wire::uniform(WireState::Conflict));
    }

    #[test]
    fn test_step_touches_only_fanout() {
        let (mut engine, ids) = engine_with(&["a", "b", "c"]);
        engine.host_mut().connect(ids[0], ids[1]).unwrap();
        for id in &ids {
            engine.add_net(*id, Some(&lanes(WireState::Floating))).unwrap();
        }
        engine.set_value(&ids[0], 0xFFFF_0000).unwrap();
        engine.restore_connections();

        engine.step_from(&ids[0]).unwrap();

        assert_eq!(engine.mask(&ids[1], WireState::DrivenHigh).unwrap(), 0xFFFF_0000);
        assert_eq!(engine.mask(&ids[1], WireState::DrivenLow).unwrap(), 0x0000_FFFF);
        assert_eq!(engine.get_state(&ids[2]).unwrap(), wire::uniform(WireState::Floating));
    }

    #[test]
    fn test_removal_reindexing() {
        let (mut engine, ids) = engine_with(&["a", "b", "c"]);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        engine.host_mut().connect(a, b).unwrap();
        engine.host_mut().connect(a, c).unwrap();
        engine.host_mut().connect(c, a).unwrap();
        for id in &ids {
            engine.add_net(*id, None).unwrap();
        }
        engine.restore_connections();

        engine.remove_net(&b).unwrap();

        assert_eq!(engine.get_nets(), vec![a, c]);
        assert_eq!(engine.fanout_of(&a).unwrap(), vec![c]);
        assert_eq!(engine.fanout_of(&c).unwrap(), vec![a]);
        assert_eq!(engine.get_state(&b), Err(LogicError::UnknownNet(b)));
        assert_eq!(engine.step_from(&b), Err(LogicError::UnknownNet(b)));
    }

    #[test]
    fn test_removal_steps_ignore_removed_net() {
        let (mut engine, ids) = engine_with(&["a", "b", "c"]);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        engine.host_mut().connect(a, b).unwrap();
        engine.add_net(a, Some(&lanes(WireState::DrivenLow))).unwrap();
        engine.add_net(b, None).unwrap();
        engine.add_net(c, Some(&lanes(WireState::Floating))).unwrap();
        engine.restore_connections();

        engine.remove_net(&b).unwrap();
        let report = engine.step_from(&a).unwrap();

        assert_eq!(report.events, 1);
        assert!(report.changed.is_empty());
        assert_eq!(engine.get_state(&c).unwrap(), wire::uniform(WireState::Floating));
    }

    #[test]
    fn test_add_net_duplicate_and_size_errors() {
        let (mut engine, ids) = engine_with(&["a"]);
        engine.add_net(ids[0], None).unwrap();

        assert_eq!(engine.add_net(ids[0], None), Err(LogicError::DuplicateNet(ids[0])));

        let other = NetId::from_seed(500);
        assert_eq!(
            engine.add_net(other, Some(&[0, 1, 2])),
            Err(LogicError::SizeMismatch {
                expected: WIDTH,
                actual: 3
            })
        );
        assert!(!engine.contains(&other));
        assert_eq!(engine.net_count(), 1);
    }

    #[test]
    fn test_add_net_uses_declared_solver() {
        let (mut engine, ids) = engine_with(&["g", "bad"]);
        engine.host_mut().set_solver(ids[0], 2).unwrap();
        engine.host_mut().set_solver(ids[1], 42).unwrap();

        engine.add_net(ids[0], None).unwrap();
        assert_eq!(engine.get_solver(&ids[0]).unwrap(), SolverId::OR);

        assert_eq!(
            engine.add_net(ids[1], None),
            Err(LogicError::InvalidSolverId {
                solver: 42,
                registered: 5
            })
        );
        assert!(!engine.contains(&ids[1]));
    }

    #[test]
    fn test_set_state_corrects_lanes() {
        let (mut engine, ids) = engine_with(&["a"]);
        engine.add_net(ids[0], None).unwrap();

        let mut raw = lanes(WireState::DrivenHigh);
        raw[4] = 17;
        let corrected = engine.set_state(&ids[0], &raw).unwrap();

        assert_eq!(corrected, vec![InvalidLane { lane: 4, value: 17 }]);
        let state = engine.get_state(&ids[0]).unwrap();
        assert_eq!(state[4], WireState::Unknown);
        assert_eq!(state[3], WireState::DrivenHigh);
    }

    #[test]
    fn test_set_state_rejects_wrong_width() {
        let (mut engine, ids) = engine_with(&["a"]);
        engine.add_net(ids[0], Some(&lanes(WireState::DrivenLow))).unwrap();

        let result = engine.set_state(&ids[0], &vec![1; WIDTH + 1]);

        assert!(matches!(result, Err(LogicError::SizeMismatch { .. })));
        assert_eq!(engine.get_state(&ids[0]).unwrap(), wire::uniform(WireState::DrivenLow));
    }

    #[test]
    fn test_strict_lanes_rejects() {
        let mut host = MemoryHost::new();
        let a = host.insert("a").unwrap();
        let mut engine =
            LogicEngine::with_config(host, EngineConfig::default().with_strict_lanes(true));
        engine.add_net(a, None).unwrap();

        let mut raw = lanes(WireState::DrivenLow);
        raw[0] = 5;

        assert_eq!(
            engine.set_state(&a, &raw),
            Err(LogicError::InvalidStateValue { lane: 0, value: 5 })
        );
        assert_eq!(engine.get_state(&a).unwrap(), wire::uniform(WireState::Unknown));
    }

    #[test]
    fn test_unknown_net_errors() {
        let (mut engine, _) = engine_with(&[]);
        let ghost = NetId::from_seed(77);

        assert_eq!(engine.step_from(&ghost), Err(LogicError::UnknownNet(ghost)));
        assert_eq!(engine.get_state(&ghost), Err(LogicError::UnknownNet(ghost)));
        assert_eq!(
            engine.set_state(&ghost, &lanes(WireState::DrivenLow)),
            Err(LogicError::UnknownNet(ghost))
        );
        assert_eq!(engine.get_solver(&ghost), Err(LogicError::UnknownNet(ghost)));
        assert!(matches!(engine.remove_net(&ghost), Err(LogicError::UnknownNet(_))));
    }

    #[test]
    fn test_set_solver_validation() {
        let (mut engine, ids) = engine_with(&["a"]);
        engine.add_net(ids[0], None).unwrap();

        assert!(engine.set_solver(&ids[0], SolverId::NOT).is_ok());
        assert_eq!(
            engine.set_solver(&ids[0], SolverId(9)),
            Err(LogicError::InvalidSolverId {
                solver: 9,
                registered: 5
            })
        );
        assert_eq!(engine.get_solver(&ids[0]).unwrap(), SolverId::NOT);
    }

    #[test]
    fn test_register_custom_solver() {
        let mut host = MemoryHost::new();
        let a = host.insert("a").unwrap();
        let b = host.insert("b").unwrap();
        let c = host.insert("c").unwrap();
        host.connect(a, c).unwrap();
        host.connect(b, c).unwrap();
        let config = EngineConfig {
            builtin_gates: false,
            ..Default::default()
        };
        let mut engine = LogicEngine::with_config(host, config);
        assert_eq!(engine.solver_count(), 1);

        let xor = engine
            .register_solver(Box::new(GateSolver::new(GateOp::Xor)))
            .unwrap();
        assert_eq!(xor, SolverId(1));

        for id in [a, b, c] {
            engine.add_net(id, None).unwrap();
        }
        engine.set_solver(&c, xor).unwrap();
        engine.set_value(&a, 0b0110).unwrap();
        engine.set_value(&b, 0b0011).unwrap();
        engine.restore_connections();

        engine.step_from(&b).unwrap();

        assert_eq!(engine.mask(&c, WireState::DrivenHigh).unwrap(), 0b0101);
    }

    #[test]
    fn test_gate_chain_and_then_not() {
        let mut host = MemoryHost::new();
        let a = host.insert("a").unwrap();
        let b = host.insert("b").unwrap();
        let and = host.insert("and").unwrap();
        let out = host.insert("out").unwrap();
        host.connect(a, and).unwrap();
        host.connect(b, and).unwrap();
        host.connect(and, out).unwrap();
        host.set_solver(and, 1).unwrap();
        host.set_solver(out, 4).unwrap();
        let mut engine = LogicEngine::new(host);

        for id in [a, b, and, out] {
            engine.add_net(id, None).unwrap();
        }
        engine.set_value(&a, 0b11).unwrap();
        engine.set_value(&b, 0b01).unwrap();
        engine.restore_connections();

        engine.step_from(&a).unwrap();

        assert_eq!(engine.mask(&and, WireState::DrivenHigh).unwrap(), 0b01);
        assert_eq!(engine.mask(&out, WireState::DrivenHigh).unwrap(), !0b01u32);
    }

    #[test]
    fn test_feedback_loop_reports_limit() {
        let (mut engine, ids) = engine_with(&["p", "q"]);
        engine.host_mut().connect(ids[0], ids[1]).unwrap();
        engine.host_mut().connect(ids[1], ids[0]).unwrap();
        engine.set_cycle_policy(CyclePolicy::EventLimit { max_events: 64 });
        engine.add_net(ids[0], Some(&lanes(WireState::DrivenHigh))).unwrap();
        engine.add_net(ids[1], Some(&lanes(WireState::DrivenLow))).unwrap();
        engine.restore_connections();

        let result = engine.step_from(&ids[0]);

        assert_eq!(
            result,
            Err(LogicError::PropagationLimit {
                start: ids[0],
                limit: 64
            })
        );
        // the partial propagation stays
        assert_eq!(engine.get_state(&ids[1]).unwrap(), wire::uniform(WireState::Conflict));
        // and the engine is usable afterwards
        assert!(engine.get_state(&ids[0]).is_ok());
    }

    #[test]
    fn test_self_peer_loops_until_limit() {
        let (mut engine, ids) = engine_with(&["x"]);
        let x = ids[0];
        engine.host_mut().connect(x, x).unwrap();
        engine.set_cycle_policy(CyclePolicy::EventLimit { max_events: 64 });
        engine.add_net(x, Some(&lanes(WireState::DrivenHigh))).unwrap();
        engine.restore_connections();

        assert_eq!(engine.fanout_of(&x).unwrap(), vec![x]);
        assert_eq!(engine.fanin_of(&x).unwrap(), vec![x]);
        assert_eq!(
            engine.step_from(&x),
            Err(LogicError::PropagationLimit { start: x, limit: 64 })
        );
        // a wire re-driving its own value never changes it
        assert_eq!(engine.get_state(&x).unwrap(), wire::uniform(WireState::DrivenHigh));
    }

    #[test]
    fn test_self_peer_gate_reads_itself() {
        let mut host = MemoryHost::new();
        let a = host.insert("a").unwrap();
        let g = host.insert("g").unwrap();
        host.connect(a, g).unwrap();
        host.connect(g, g).unwrap();
        host.set_solver(g, 1).unwrap();
        let mut engine = LogicEngine::new(host);
        engine.set_cycle_policy(CyclePolicy::EventLimit { max_events: 16 });
        engine.add_net(a, None).unwrap();
        engine.add_net(g, None).unwrap();
        engine.set_value(&a, u32::MAX).unwrap();
        engine.restore_connections();

        assert_eq!(engine.fanin_of(&g).unwrap(), vec![a, g]);
        let result = engine.step_from(&a);

        // the AND reads its own high output back and holds it
        assert!(matches!(result, Err(LogicError::PropagationLimit { .. })));
        assert_eq!(engine.get_state(&g).unwrap(), wire::uniform(WireState::DrivenHigh));
    }

    #[test]
    fn test_remove_net_reports_self_edge_once() {
        let sink = Arc::new(RecordingSink::new());
        let (engine, ids) = engine_with(&["x"]);
        let mut engine = engine.with_sink(sink.clone());
        let x = ids[0];
        engine.host_mut().connect(x, x).unwrap();
        engine.add_net(x, None).unwrap();
        engine.restore_connections();
        assert_eq!(
            sink.take(),
            vec![ChangeEvent::ConnectionAdded { from: x, to: x }]
        );

        engine.remove_net(&x).unwrap();

        assert_eq!(
            sink.take(),
            vec![ChangeEvent::ConnectionRemoved { from: x, to: x }]
        );
    }

    #[test]
    fn test_unready_net_keeps_fanout_across_removal() {
        let (mut engine, ids) = engine_with(&["a", "b", "c"]);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        engine.host_mut().connect(c, a).unwrap();
        for id in &ids {
            engine.add_net(*id, None).unwrap();
        }
        engine.restore_connections();

        engine.host_mut().set_ready(c, false).unwrap();
        engine.host_mut().disconnect(c, a).unwrap();
        let report = engine.remove_net(&b).unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(engine.fanout_of(&c).unwrap(), vec![a]);
        assert_eq!(engine.fanin_of(&a).unwrap(), vec![c]);
    }

    #[test]
    fn test_sink_receives_notifications() {
        let sink = Arc::new(RecordingSink::new());
        let (engine, ids) = engine_with(&["x", "y"]);
        let mut engine = engine.with_sink(sink.clone());
        let (x, y) = (ids[0], ids[1]);
        engine.host_mut().connect(x, y).unwrap();

        engine.add_net(x, Some(&lanes(WireState::DrivenHigh))).unwrap();
        engine.add_net(y, None).unwrap();
        engine.restore_connections();
        sink.take();

        engine.step_from(&x).unwrap();
        assert_eq!(
            sink.take(),
            vec![ChangeEvent::StateChanged {
                net: y,
                lanes: vec![1; WIDTH]
            }]
        );

        engine.remove_net(&y).unwrap();
        assert_eq!(
            sink.take(),
            vec![ChangeEvent::ConnectionRemoved { from: x, to: y }]
        );
    }

    #[test]
    fn test_restore_notifies_added_edges() {
        let sink = Arc::new(RecordingSink::new());
        let (engine, ids) = engine_with(&["x", "y"]);
        let mut engine = engine.with_sink(sink.clone());
        engine.host_mut().connect(ids[0], ids[1]).unwrap();
        engine.add_net(ids[0], None).unwrap();
        engine.add_net(ids[1], None).unwrap();

        engine.restore_connections();
        engine.restore_connections();

        assert_eq!(
            sink.events(),
            vec![ChangeEvent::ConnectionAdded {
                from: ids[0],
                to: ids[1]
            }]
        );
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (mut engine, ids) = engine_with(&["a", "b"]);
        engine.add_net(ids[0], Some(&lanes(WireState::Conflict))).unwrap();
        engine.add_net(ids[1], None).unwrap();
        engine.set_value(&ids[1], 0b101).unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.nets, ids);
        assert_eq!(snapshot.states[0], vec![2; WIDTH]);
        assert_eq!(engine.get_state_snapshot(), snapshot.states);

        engine.set_state(&ids[0], &lanes(WireState::Floating)).unwrap();
        engine.set_state(&ids[1], &lanes(WireState::Floating)).unwrap();
        let json = snapshot.to_json().unwrap();
        let restored = EngineSnapshot::from_json(&json).unwrap();
        assert!(engine.apply_snapshot(&restored).unwrap().is_empty());

        assert_eq!(engine.snapshot(), snapshot);
    }

    #[test]
    fn test_apply_snapshot_validates_first() {
        let (mut engine, ids) = engine_with(&["a"]);
        engine.add_net(ids[0], Some(&lanes(WireState::DrivenLow))).unwrap();
        let ghost = NetId::from_seed(404);

        let snapshot = EngineSnapshot {
            nets: vec![ids[0], ghost],
            states: vec![vec![1; WIDTH], vec![1; WIDTH]],
        };

        assert_eq!(engine.apply_snapshot(&snapshot), Err(LogicError::UnknownNet(ghost)));
        assert_eq!(engine.get_state(&ids[0]).unwrap(), wire::uniform(WireState::DrivenLow));
    }

    #[test]
    fn test_width_is_fixed() {
        let (engine, _) = engine_with(&[]);
        assert_eq!(engine.width(), 32);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_set_get_round_trip(raw in proptest::collection::vec(0i32..5, WIDTH)) {
            let (mut engine, ids) = engine_with(&["a"]);
            engine.add_net(ids[0], None).unwrap();

            let corrected = engine.set_state(&ids[0], &raw).unwrap();
            prop_assert!(corrected.is_empty());

            let back: Vec<i32> = engine
                .get_state(&ids[0])
                .unwrap()
                .iter()
                .map(|s| i32::from(s.ordinal()))
                .collect();
            prop_assert_eq!(back, raw);
        }

        #[test]
        fn prop_removal_keeps_fanout_registered(
            edges in proptest::collection::vec((0usize..6, 0usize..6), 0..20),
            victims in proptest::collection::vec(0usize..6, 1..4),
        ) {
            let paths = ["n0", "n1", "n2", "n3", "n4", "n5"];
            let (mut engine, ids) = engine_with(&paths);
            for (from, to) in &edges {
                engine.host_mut().connect(ids[*from], ids[*to]).unwrap();
            }
            for id in &ids {
                engine.add_net(*id, None).unwrap();
            }
            engine.restore_connections();

            for victim in victims {
                let id = ids[victim];
                if engine.contains(&id) {
                    engine.remove_net(&id).unwrap();
                }
            }

            let nets = engine.get_nets();
            for net in &nets {
                for load in engine.fanout_of(net).unwrap() {
                    prop_assert!(nets.contains(&load));
                    prop_assert!(engine.fanin_of(&load).unwrap().contains(net));
                }
            }
            let expected: Vec<NetId> = ids.iter().copied().filter(|id| engine.contains(id)).collect();
            prop_assert_eq!(nets, expected);
        }
    }
}
