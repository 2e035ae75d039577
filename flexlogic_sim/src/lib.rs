//! FlexLogic Deterministic Scenario Harness
//!
//! Each scenario builds a circuit in an in-memory host, drives it through a
//! fresh `LogicEngine` and checks the result. All randomness is derived
//! from a single 64-bit seed, so any failing run can be replayed exactly.
//!
//! # Usage
//!
//! ```ignore
//! use flexlogic_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 64).with_steps(500);
//! let result = runner.run(ScenarioId::Churn);
//! assert!(result.passed);
//! ```

mod circuits;
mod config;
mod error;
mod exporter;
mod runner;
pub mod scenarios;

pub use circuits::{check_consistency, CircuitGen, Tree};
pub use config::{load_engine_config, SimConfig};
pub use error::SimError;
pub use exporter::{SimExport, StepFrame};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
