//! Engine configuration.

use serde::{Deserialize, Serialize};

/// What to do when a single step keeps propagating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Drain the queue no matter how long it takes. A feedback loop in the
    /// driver graph makes `step_from` never return.
    Unbounded,

    /// Stop after `max_events` solver invocations and report
    /// `LogicError::PropagationLimit`.
    EventLimit { max_events: usize },
}

impl Default for CyclePolicy {
    fn default() -> Self {
        CyclePolicy::EventLimit { max_events: 65_536 }
    }
}

impl CyclePolicy {
    /// The event bound, if any.
    pub fn limit(&self) -> Option<usize> {
        match self {
            CyclePolicy::Unbounded => None,
            CyclePolicy::EventLimit { max_events } => Some(*max_events),
        }
    }
}

/// Configuration for a `LogicEngine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound on propagation within one step
    pub cycle_policy: CyclePolicy,

    /// Reject writes containing out-of-range lanes instead of forcing them
    /// to `Unknown`
    pub strict_lanes: bool,

    /// Register the AND/OR/XOR/NOT gate solvers at construction
    pub builtin_gates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_policy: CyclePolicy::default(),
            strict_lanes: false,
            builtin_gates: true,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    pub fn with_strict_lanes(mut self, strict: bool) -> Self {
        self.strict_lanes = strict;
        self
    }
}
