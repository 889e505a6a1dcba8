//! Run configuration for the curation pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AtomError, Result};

/// How to pick a winner when two sources declare the same priority for a
/// species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The source declared later in the ingestion order wins.
    #[default]
    LastDeclared,
    /// Abort the run with `AtomError::PriorityTie`.
    Error,
}

/// Temperature grid for collisional factors, in K. `stop` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureGrid {
    pub start: u32,
    pub stop: u32,
    pub step: u32,
}

impl Default for TemperatureGrid {
    fn default() -> Self {
        Self {
            start: 2000,
            stop: 50000,
            step: 2000,
        }
    }
}

impl TemperatureGrid {
    pub fn temperatures(&self) -> Vec<u32> {
        if self.step == 0 {
            return Vec::new();
        }
        (self.start..self.stop).step_by(self.step as usize).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Lines with `loggf <= threshold` are culled. `None` keeps every line.
    pub lines_loggf_threshold: Option<f64>,
    /// Lines with `loggf > threshold` make their upper level non-metastable.
    pub levels_metastable_loggf_threshold: f64,
    pub priority_tie_break: TieBreak,
    pub collision_temperatures: TemperatureGrid,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lines_loggf_threshold: Some(-3.0),
            levels_metastable_loggf_threshold: -3.0,
            priority_tie_break: TieBreak::default(),
            collision_temperatures: TemperatureGrid::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| AtomError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| AtomError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let grid = &self.collision_temperatures;
        if grid.step == 0 {
            return Err(AtomError::Config(
                "collision_temperatures.step must be positive".into(),
            ));
        }
        if grid.start == 0 || grid.start >= grid.stop {
            return Err(AtomError::Config(format!(
                "collision_temperatures must satisfy 0 < start < stop, got {}..{}",
                grid.start, grid.stop
            )));
        }
        if grid.stop > 1_000_000 {
            // column names are t{T:06}
            return Err(AtomError::Config(format!(
                "collision temperatures above 999999 K are not supported, got stop={}",
                grid.stop
            )));
        }
        Ok(())
    }
}
