//! Event queue and the breadth-first stepper.

use crate::config::CyclePolicy;
use crate::error::LogicError;
use crate::solver::{SolveContext, SolverRegistry};
use crate::store::{NetStore, Slot};
use crate::topology::Topology;
use std::collections::VecDeque;
use tracing::{trace, warn};

/// Whether a step is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Draining,
}

/// FIFO of slots waiting to be solved.
///
/// No deduplication: a slot pushed twice is solved twice.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    pending: VecDeque<Slot>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, slot: Slot) {
        self.pending.push_back(slot);
    }

    pub fn pop(&mut self) -> Option<Slot> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn state(&self) -> QueueState {
        if self.pending.is_empty() {
            QueueState::Idle
        } else {
            QueueState::Draining
        }
    }
}

/// Drains propagation from one starting net until the queue empties.
#[derive(Debug, Clone, Default)]
pub struct Stepper {
    queue: EventQueue,
    policy: CyclePolicy,
}

impl Stepper {
    pub fn new(policy: CyclePolicy) -> Self {
        Self {
            queue: EventQueue::new(),
            policy,
        }
    }

    pub fn policy(&self) -> CyclePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: CyclePolicy) {
        self.policy = policy;
    }

    /// Idle between steps; a step never returns while draining.
    pub fn state(&self) -> QueueState {
        self.queue.state()
    }

    /// Runs one step from `start` and returns the number of solver
    /// invocations.
    ///
    /// Solvers run in enqueue order. A net reached along several paths is
    /// solved once per arrival. Under `CyclePolicy::EventLimit` the step is
    /// abandoned once the bound is spent and work is still pending; state
    /// written up to that point is kept.
    pub fn run(
        &mut self,
        start: Slot,
        store: &mut NetStore,
        topology: &Topology,
        solvers: &SolverRegistry,
    ) -> Result<usize, LogicError> {
        self.queue.clear();
        self.queue.push(start);

        let limit = self.policy.limit();
        let mut events = 0usize;

        while let Some(slot) = self.queue.pop() {
            if let Some(max_events) = limit {
                if events >= max_events {
                    self.queue.clear();
                    return Err(LogicError::PropagationLimit {
                        start: store.id_at(start),
                        limit: max_events,
                    });
                }
            }
            events += 1;

            let solver_id = store.solver(slot);
            let Some(solver) = solvers.get(solver_id) else {
                warn!(slot = %slot, solver = %solver_id, "No solver registered, skipping");
                continue;
            };
            trace!(slot = %slot, solver = solver.name(), pending = self.queue.len(), "Solving");

            let mut ctx = SolveContext::new(slot, store, topology, &mut self.queue);
            solver.solve(&mut ctx);
        }

        Ok(events)
    }
}
