//! Scenario catalogue for the harness.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// A single driver pushing into a floating load
    Buffer,

    /// Two drivers fighting over one load
    BusConflict,

    /// Removing a net compacts storage and keeps the others wired
    Removal,

    /// Seeded random tree; every net ends up with the root's value
    FanoutTree,

    /// Truth tables of the built-in gate solvers
    Gates,

    /// Two nets driving each other until the event budget runs out
    FeedbackLoop,

    /// Seeded random edits with consistency checks after each one
    Churn,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Buffer,
            ScenarioId::BusConflict,
            ScenarioId::Removal,
            ScenarioId::FanoutTree,
            ScenarioId::Gates,
            ScenarioId::FeedbackLoop,
            ScenarioId::Churn,
        ]
    }

    /// Scenarios with a fixed circuit, independent of the seed.
    pub fn fixed() -> Vec<ScenarioId> {
        Self::all().into_iter().filter(|s| !s.is_randomized()).collect()
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Buffer => "buffer",
            ScenarioId::BusConflict => "bus_conflict",
            ScenarioId::Removal => "removal",
            ScenarioId::FanoutTree => "fanout_tree",
            ScenarioId::Gates => "gates",
            ScenarioId::FeedbackLoop => "feedback_loop",
            ScenarioId::Churn => "churn",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Buffer => "X drives floating Y; Y reads DrivenHigh on every lane",
            ScenarioId::BusConflict => "X high and Z low both drive Y; Y latches Conflict",
            ScenarioId::Removal => "Remove B from A, B, C; A and C stay wired and ordered",
            ScenarioId::FanoutTree => "Random tree of --nets nets; one step reaches every leaf",
            ScenarioId::Gates => "AND, OR, XOR and NOT over four lane patterns",
            ScenarioId::FeedbackLoop => "P and Q drive each other; the step hits the event limit",
            ScenarioId::Churn => "Random add, remove, rewire and step with invariant checks",
        }
    }

    /// Returns true if the circuit depends on the seed.
    pub fn is_randomized(&self) -> bool {
        matches!(self, ScenarioId::FanoutTree | ScenarioId::Churn)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "buffer" => Ok(ScenarioId::Buffer),
            "bus_conflict" | "busconflict" | "conflict" => Ok(ScenarioId::BusConflict),
            "removal" | "remove" => Ok(ScenarioId::Removal),
            "fanout_tree" | "fanouttree" | "tree" => Ok(ScenarioId::FanoutTree),
            "gates" => Ok(ScenarioId::Gates),
            "feedback_loop" | "feedbackloop" | "feedback" => Ok(ScenarioId::FeedbackLoop),
            "churn" => Ok(ScenarioId::Churn),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
