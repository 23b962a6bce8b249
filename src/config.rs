//! TOML configuration for the planner.

use crate::errors::{Error, Result};
use crate::planner::{EngineKind, Planner};
use crate::search::RunOrder;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_threshold() -> u32 {
    15
}

fn default_max_evaluations() -> u64 {
    100_000
}

fn default_node_limit() -> u64 {
    1_000_000
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Complexity ceiling for the main method and every extracted one.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub engine: EngineKind,
    /// Evaluation cap for the exhaustive engine.
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: u64,
    /// Node cap for the bundled pool solver.
    #[serde(default = "default_node_limit")]
    pub node_limit: u64,
    #[serde(default)]
    pub run_order: RunOrder,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            engine: EngineKind::default(),
            max_evaluations: default_max_evaluations(),
            node_limit: default_node_limit(),
            run_order: RunOrder::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Config> {
        let config: Config =
            toml::from_str(text).map_err(|e| Error::config(e.to_string()))?;
        config.validate().map_err(Error::Config)?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.threshold == 0 {
            return Err("threshold must be at least 1".to_string());
        }
        if self.max_evaluations == 0 {
            return Err("max_evaluations must be at least 1".to_string());
        }
        if self.node_limit == 0 {
            return Err("node_limit must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn planner(&self) -> Planner {
        Planner {
            threshold: self.threshold,
            engine: self.engine,
            max_evaluations: self.max_evaluations,
            node_limit: self.node_limit,
            order: self.run_order,
        }
    }
}
