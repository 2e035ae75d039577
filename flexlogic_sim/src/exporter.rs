//! JSON export of a scenario run.
//!
//! Captures every step the runner took plus the final lane states, so a
//! failing seed can be inspected without rerunning it.

use flexlogic_core::{EngineSnapshot, LogicError, StepReport};
use flexlogic_env::NetId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::SimError;
use crate::runner::{ScenarioMetrics, ScenarioResult};

/// One `step_from` call as the runner saw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFrame {
    /// Position in the run, from 0
    pub index: usize,

    /// Net the step started from
    pub start: NetId,

    /// Solver invocations (0 if the step failed)
    pub events: usize,

    /// Nets whose state changed
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub changed: Vec<NetId>,

    /// Error, if the step failed
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl StepFrame {
    pub fn completed(index: usize, report: &StepReport) -> Self {
        Self {
            index,
            start: report.start,
            events: report.events,
            changed: report.changed.clone(),
            error: None,
        }
    }

    pub fn failed(index: usize, start: NetId, err: &LogicError) -> Self {
        Self {
            index,
            start,
            events: 0,
            changed: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

/// Complete scenario export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failure_reason: Option<String>,

    pub metrics: ScenarioMetrics,

    /// Every step, in order
    pub frames: Vec<StepFrame>,

    /// Lane states of every registered net when the scenario ended
    pub final_snapshot: EngineSnapshot,
}

impl SimExport {
    /// Builds an export from a finished run.
    pub fn from_result(result: &ScenarioResult) -> Self {
        Self {
            scenario: result.scenario.name().to_string(),
            seed: result.seed,
            passed: result.passed,
            failure_reason: result.failure_reason.clone(),
            metrics: result.metrics.clone(),
            frames: result.frames.clone(),
            final_snapshot: result.final_snapshot.clone(),
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Reads an export written by `write_to_file`.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
