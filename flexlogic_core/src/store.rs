//! The NetState store: a dense structure-of-arrays keyed by slot.
//!
//! Slots are positions in the arrays. They are dense and stable only until
//! the next removal, which compacts everything after the removed slot down
//! by one.

use crate::error::{InvalidLane, LogicError};
use crate::solver::SolverId;
use crate::wire::{self, StateVector, WireState, WIDTH};
use flexlogic_env::NetId;
use std::collections::HashMap;

/// Internal address of a net's simulation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub usize);

impl Slot {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-net simulation state, one array per field.
///
/// Indexing with a slot that is not live panics; slots only come from this
/// store.
#[derive(Debug, Clone, Default)]
pub struct NetStore {
    ids: Vec<NetId>,
    index: HashMap<NetId, Slot>,
    states: Vec<StateVector>,
    solvers: Vec<SolverId>,
}

impl NetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Appends a record for `id` with every lane `Unknown`.
    pub fn allocate(&mut self, id: NetId, solver: SolverId) -> Result<Slot, LogicError> {
        if self.index.contains_key(&id) {
            return Err(LogicError::DuplicateNet(id));
        }

        let slot = Slot(self.ids.len());
        self.ids.push(id);
        self.states.push(wire::uniform(WireState::Unknown));
        self.solvers.push(solver);
        self.index.insert(id, slot);
        Ok(slot)
    }

    /// Deletes the record for `id` and shifts every later slot down by one.
    ///
    /// Returns the slot the net occupied.
    pub fn remove(&mut self, id: &NetId) -> Result<Slot, LogicError> {
        let slot = self.slot_of(id)?;

        self.ids.remove(slot.0);
        self.states.remove(slot.0);
        self.solvers.remove(slot.0);
        self.index.remove(id);

        for (i, moved) in self.ids.iter().enumerate().skip(slot.0) {
            self.index.insert(*moved, Slot(i));
        }
        Ok(slot)
    }

    /// Looks up the slot currently holding `id`.
    pub fn slot_of(&self, id: &NetId) -> Result<Slot, LogicError> {
        self.index
            .get(id)
            .copied()
            .ok_or(LogicError::UnknownNet(*id))
    }

    pub fn contains(&self, id: &NetId) -> bool {
        self.index.contains_key(id)
    }

    /// Identity at `slot`.
    pub fn id_at(&self, slot: Slot) -> NetId {
        self.ids[slot.0]
    }

    /// All identities in slot order.
    pub fn ids(&self) -> &[NetId] {
        &self.ids
    }

    pub fn state(&self, slot: Slot) -> &StateVector {
        &self.states[slot.0]
    }

    /// All state vectors in slot order.
    pub fn states(&self) -> &[StateVector] {
        &self.states
    }

    /// Replaces the state vector at `slot`.
    pub fn write(&mut self, slot: Slot, states: StateVector) {
        self.states[slot.0] = states;
    }

    /// Validates raw lane ordinals and writes them to `slot`.
    ///
    /// See [`parse_lanes`] for the validation rules. Nothing is written on
    /// error.
    pub fn write_lanes(
        &mut self,
        slot: Slot,
        lanes: &[i32],
        strict: bool,
    ) -> Result<Vec<InvalidLane>, LogicError> {
        let (states, corrected) = parse_lanes(lanes, strict)?;
        self.states[slot.0] = states;
        Ok(corrected)
    }

    /// Resolves every lane of `to` against `from` through the table.
    pub fn drive(&mut self, from: Slot, to: Slot) {
        let driver = self.states[from.0];
        wire::drive(&driver, &mut self.states[to.0]);
    }

    pub fn solver(&self, slot: Slot) -> SolverId {
        self.solvers[slot.0]
    }

    /// Assigns a solver, rejecting ids at or beyond `registered`.
    pub fn set_solver(
        &mut self,
        slot: Slot,
        solver: SolverId,
        registered: usize,
    ) -> Result<(), LogicError> {
        if usize::from(solver.0) >= registered {
            return Err(LogicError::InvalidSolverId {
                solver: solver.0,
                registered,
            });
        }
        self.solvers[slot.0] = solver;
        Ok(())
    }
}

/// Converts raw lane ordinals into a state vector.
///
/// A slice whose length differs from `WIDTH` is rejected outright. Lanes
/// outside `0..=4` become `Unknown` and are reported back, unless `strict`
/// is set, in which case the first one fails the whole conversion.
pub fn parse_lanes(
    lanes: &[i32],
    strict: bool,
) -> Result<(StateVector, Vec<InvalidLane>), LogicError> {
    if lanes.len() != WIDTH {
        return Err(LogicError::SizeMismatch {
            expected: WIDTH,
            actual: lanes.len(),
        });
    }

    let mut states = wire::uniform(WireState::Unknown);
    let mut corrected = Vec::new();
    for (lane, (&value, slot)) in lanes.iter().zip(states.iter_mut()).enumerate() {
        match WireState::try_from(value) {
            Ok(state) => *slot = state,
            Err(value) => {
                let bad = InvalidLane { lane, value };
                if strict {
                    return Err(bad.into());
                }
                corrected.push(bad);
            }
        }
    }
    Ok((states, corrected))
}
