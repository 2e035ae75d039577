//! Harness configuration.

use flexlogic_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SimError;

/// Knobs shared by every scenario in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Nets generated by the randomized scenarios
    pub num_nets: usize,

    /// Maximum loads per driver in generated trees
    pub fanout_degree: usize,

    /// Operations performed by the churn scenario
    pub steps: usize,

    /// Engine settings applied to every scenario
    pub engine: EngineConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_nets: 64,
            fanout_degree: 3,
            steps: 200,
            engine: EngineConfig::default(),
        }
    }
}

impl SimConfig {
    /// Seed for an independent random stream, derived from the master seed.
    pub fn derived_seed(&self, salt: u64) -> u64 {
        self.seed
            .wrapping_add(salt)
            .wrapping_mul(0x9e3779b97f4a7c15)
    }
}

/// Reads an `EngineConfig` from a JSON file.
pub fn load_engine_config(path: impl AsRef<Path>) -> Result<EngineConfig, SimError> {
    let text = std::fs::read_to_string(path)?;
    Ok(EngineConfig::from_json(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_derived_seeds_differ() {
        let config = SimConfig::default();
        assert_ne!(config.derived_seed(1), config.derived_seed(2));
        assert_eq!(config.derived_seed(7), config.derived_seed(7));
    }
}
