//! Solver registry and the built-in propagation behaviors.
//!
//! Each net carries a `SolverId`. When the stepper reaches a net it looks
//! the id up here, at call time, and hands the solver a `SolveContext`:
//! the net's own slot, its fanout and fan-in, the state store and the
//! event queue. The only contract is that a solver enqueues every slot
//! whose state it touched.

use crate::error::LogicError;
use crate::stepper::EventQueue;
use crate::store::{NetStore, Slot};
use crate::topology::Topology;
use crate::wire::{self, StateVector, WireState};
use serde::{Deserialize, Serialize};

/// Index into the solver registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolverId(pub u16);

impl SolverId {
    pub const WIRE: SolverId = SolverId(0);
    pub const AND: SolverId = SolverId(1);
    pub const OR: SolverId = SolverId(2);
    pub const XOR: SolverId = SolverId(3);
    pub const NOT: SolverId = SolverId(4);
}

impl std::fmt::Display for SolverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a solver can see and touch while handling one net.
pub struct SolveContext<'a> {
    slot: Slot,
    store: &'a mut NetStore,
    topology: &'a Topology,
    queue: &'a mut EventQueue,
}

impl<'a> SolveContext<'a> {
    pub(crate) fn new(
        slot: Slot,
        store: &'a mut NetStore,
        topology: &'a Topology,
        queue: &'a mut EventQueue,
    ) -> Self {
        Self {
            slot,
            store,
            topology,
            queue,
        }
    }

    /// The net being solved.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Nets this net drives.
    pub fn fanout(&self) -> &'a [Slot] {
        self.topology.fanout(self.slot)
    }

    /// Nets driving this net.
    pub fn fanin(&self) -> &'a [Slot] {
        self.topology.fanin(self.slot)
    }

    pub fn state(&self, slot: Slot) -> &StateVector {
        self.store.state(slot)
    }

    /// Resolves `to` against `from` through the table.
    pub fn drive(&mut self, from: Slot, to: Slot) {
        self.store.drive(from, to);
    }

    /// Overwrites a state vector without resolution.
    pub fn write(&mut self, slot: Slot, states: StateVector) {
        self.store.write(slot, states);
    }

    pub fn enqueue(&mut self, slot: Slot) {
        self.queue.push(slot);
    }
}

/// A per-net propagation behavior.
pub trait Solver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Propagates from `ctx.slot()`.
    fn solve(&self, ctx: &mut SolveContext<'_>);
}

/// Drives every fanout target from the solved net, in fanout order, and
/// enqueues each one.
pub fn broadcast(ctx: &mut SolveContext<'_>) {
    let source = ctx.slot();
    for &target in ctx.fanout() {
        ctx.drive(source, target);
        ctx.enqueue(target);
    }
}

/// The default behavior: a plain wire.
#[derive(Debug, Default, Clone, Copy)]
pub struct WireSolver;

impl Solver for WireSolver {
    fn name(&self) -> &str {
        "wire"
    }

    fn solve(&self, ctx: &mut SolveContext<'_>) {
        broadcast(ctx);
    }
}

/// Boolean function computed by a `GateSolver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateOp {
    And,
    Or,
    Xor,
    Not,
}

impl GateOp {
    /// Evaluates one lane from the matching lane of every input.
    ///
    /// Only driven values carry logic; `Floating` inputs count as `Unknown`.
    pub fn lane(self, inputs: impl Iterator<Item = WireState>) -> WireState {
        use WireState::{DrivenHigh, DrivenLow, Unknown};

        match self {
            GateOp::And => {
                let mut all_high = true;
                for input in inputs {
                    match input {
                        DrivenLow => return DrivenLow,
                        DrivenHigh => {}
                        _ => all_high = false,
                    }
                }
                if all_high { DrivenHigh } else { Unknown }
            }
            GateOp::Or => {
                let mut all_low = true;
                for input in inputs {
                    match input {
                        DrivenHigh => return DrivenHigh,
                        DrivenLow => {}
                        _ => all_low = false,
                    }
                }
                if all_low { DrivenLow } else { Unknown }
            }
            GateOp::Xor => {
                let mut parity = false;
                for input in inputs {
                    match input {
                        DrivenHigh => parity = !parity,
                        DrivenLow => {}
                        _ => return Unknown,
                    }
                }
                if parity { DrivenHigh } else { DrivenLow }
            }
            GateOp::Not => {
                let combined = inputs.fold(WireState::Floating, wire::resolve);
                match combined {
                    DrivenLow => DrivenHigh,
                    DrivenHigh => DrivenLow,
                    _ => Unknown,
                }
            }
        }
    }

    /// Evaluates a full vector. `inputs` must not be empty.
    pub fn evaluate(self, inputs: &[StateVector]) -> StateVector {
        let mut out = wire::uniform(WireState::Unknown);
        for (lane, value) in out.iter_mut().enumerate() {
            *value = self.lane(inputs.iter().map(|input| input[lane]));
        }
        out
    }
}

/// A gate: recomputes its own state from its fan-in, then acts as a wire.
///
/// With no drivers the net keeps whatever state it holds.
#[derive(Debug, Clone, Copy)]
pub struct GateSolver {
    op: GateOp,
}

impl GateSolver {
    pub fn new(op: GateOp) -> Self {
        Self { op }
    }

    pub fn op(&self) -> GateOp {
        self.op
    }
}

impl Solver for GateSolver {
    fn name(&self) -> &str {
        match self.op {
            GateOp::And => "and",
            GateOp::Or => "or",
            GateOp::Xor => "xor",
            GateOp::Not => "not",
        }
    }

    fn solve(&self, ctx: &mut SolveContext<'_>) {
        let inputs = ctx.fanin();
        if !inputs.is_empty() {
            let states: Vec<StateVector> = inputs.iter().map(|s| *ctx.state(*s)).collect();
            let own = ctx.slot();
            ctx.write(own, self.op.evaluate(&states));
        }
        broadcast(ctx);
    }
}

/// Table of solvers keyed by `SolverId`. Slot 0 is always the wire.
pub struct SolverRegistry {
    solvers: Vec<Box<dyn Solver>>,
}

impl SolverRegistry {
    /// A registry holding only the wire solver.
    pub fn new() -> Self {
        Self {
            solvers: vec![Box::new(WireSolver)],
        }
    }

    /// Wire plus AND, OR, XOR and NOT at their fixed ids.
    pub fn with_builtin_gates() -> Self {
        let mut registry = Self::new();
        for op in [GateOp::And, GateOp::Or, GateOp::Xor, GateOp::Not] {
            registry.solvers.push(Box::new(GateSolver::new(op)));
        }
        registry
    }

    /// Adds a solver and returns the id assigned to it.
    pub fn register(&mut self, solver: Box<dyn Solver>) -> Result<SolverId, LogicError> {
        let id = u16::try_from(self.solvers.len()).map_err(|_| LogicError::InvalidSolverId {
            solver: u16::MAX,
            registered: self.solvers.len(),
        })?;
        self.solvers.push(solver);
        Ok(SolverId(id))
    }

    pub fn get(&self, id: SolverId) -> Option<&dyn Solver> {
        self.solvers.get(usize::from(id.0)).map(|s| s.as_ref())
    }

    pub fn contains(&self, id: SolverId) -> bool {
        usize::from(id.0) < self.solvers.len()
    }

    /// Checks that `id` is registered.
    pub fn validate(&self, id: SolverId) -> Result<SolverId, LogicError> {
        if self.contains(id) {
            Ok(id)
        } else {
            Err(LogicError::InvalidSolverId {
                solver: id.0,
                registered: self.solvers.len(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    /// Solver names in id order.
    pub fn names(&self) -> Vec<&str> {
        self.solvers.iter().map(|s| s.name()).collect()
    }
}

impl Default for SolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverRegistry")
            .field("solvers", &self.names())
            .finish()
    }
}
