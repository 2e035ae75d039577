//! FlexLogic Core - Five-Valued Discrete-Event Logic Simulation
//!
//! Every net carries 32 independent lanes. Each lane holds one of five
//! states, and a step pushes a change breadth-first through the nets it
//! drives until nothing is left to evaluate:
//! 1. **Resolution**: `wire` holds the five-valued Buckwell table, where a
//!    conflict is sticky and unknown only yields to a real driver
//! 2. **Storage**: `store` and `topology` keep dense, slot-indexed state
//!    and fanout that are rebuilt from the host whenever it changes
//! 3. **Evaluation**: `solver` and `stepper` run pluggable per-net
//!    behaviors off a FIFO work queue with a configurable event budget

pub mod config;
pub mod engine;
pub mod error;
pub mod snapshot;
pub mod solver;
pub mod stepper;
pub mod store;
pub mod topology;
pub mod wire;

// Re-export key types for convenience
pub use config::{CyclePolicy, EngineConfig};
pub use engine::{LogicEngine, StepReport};
pub use error::{InvalidLane, LogicError};
pub use snapshot::EngineSnapshot;
pub use solver::{GateOp, GateSolver, SolveContext, Solver, SolverId, SolverRegistry, WireSolver};
pub use stepper::{EventQueue, QueueState, Stepper};
pub use store::{NetStore, Slot};
pub use topology::{RestoreReport, Topology};
pub use wire::{StateVector, WireState, WIDTH};
