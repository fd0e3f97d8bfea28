//! Tuning knobs for level generation, the solver budget and star thresholds.
//!
//! [`Config::default`] carries the built-in tuning. A JSON file can override any subset of it:
//!
//! ```json
//! { "generator": { "repair_attempts": 500 }, "hints_per_level": 5 }
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub solver: SolverConfig,
    pub scoring: ScoringConfig,
    /// Hints available at the start of each level.
    pub hints_per_level: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            solver: SolverConfig::default(),
            scoring: ScoringConfig::default(),
            hints_per_level: 3,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let generator = &self.generator;
        if !(2..=u8::MAX as usize).contains(&generator.max_colors) {
            return Err(ConfigError::Invalid(format!(
                "max_colors must be between 2 and {}, got {}",
                u8::MAX,
                generator.max_colors
            )));
        }
        if generator.empty_bottles.is_empty() {
            return Err(ConfigError::Invalid("empty_bottles needs at least one band".into()));
        }
        for band in &generator.empty_bottles {
            if band.fewest == 0 || band.fewest > band.most {
                return Err(ConfigError::Invalid(format!(
                    "empty bottle band {band:?} must satisfy 1 <= fewest <= most"
                )));
            }
        }
        if !is_ascending(generator.empty_bottles.iter().map(|b| b.up_to_colors)) {
            return Err(ConfigError::Invalid("empty_bottles bands must be ascending".into()));
        }
        if !is_ascending(self.solver.budgets.iter().map(|b| Some(b.up_to_bottles))) {
            return Err(ConfigError::Invalid("solver budgets must be ascending".into()));
        }
        Ok(())
    }
}

/// Bands are ascending when their bounds increase and only the last one is open-ended.
fn is_ascending(bounds: impl Iterator<Item = Option<usize>>) -> bool {
    let bounds: Vec<Option<usize>> = bounds.collect();
    bounds.windows(2).all(|w| match (w[0], w[1]) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        (None, _) => false,
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Upper bound on the number of colors of any level.
    pub max_colors: usize,
    /// First level with hidden segments.
    pub hidden_from_level: u32,
    /// Bound on hidden-conflict repair iterations before accepting the board as it is.
    pub repair_attempts: u32,
    /// Empty bottle ranges keyed by color count. The first band whose bound is not exceeded
    /// applies, the last band catches everything larger.
    pub empty_bottles: Vec<EmptyBottleBand>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_colors: 24,
            hidden_from_level: 30,
            repair_attempts: 200,
            empty_bottles: vec![
                EmptyBottleBand { up_to_colors: Some(8), fewest: 2, most: 3 },
                EmptyBottleBand { up_to_colors: Some(20), fewest: 2, most: 4 },
                EmptyBottleBand { up_to_colors: None, fewest: 3, most: 5 },
            ],
        }
    }
}

impl GeneratorConfig {
    pub fn band_for(&self, num_colors: usize) -> &EmptyBottleBand {
        self.empty_bottles
            .iter()
            .find(|b| b.up_to_colors.is_none_or(|max| num_colors <= max))
            .or(self.empty_bottles.last())
            .expect("validated configuration has at least one band")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyBottleBand {
    pub up_to_colors: Option<usize>,
    /// Empty bottles on hard levels.
    pub fewest: usize,
    /// Empty bottles on easy levels.
    pub most: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Visited-state budgets keyed by the number of non-empty bottles. Boards with more
    /// bottles than the last entry are not searched.
    pub budgets: Vec<SolverBudget>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            budgets: vec![
                SolverBudget { up_to_bottles: 5, max_states: 80_000 },
                SolverBudget { up_to_bottles: 7, max_states: 50_000 },
                SolverBudget { up_to_bottles: 9, max_states: 25_000 },
                SolverBudget { up_to_bottles: 12, max_states: 10_000 },
            ],
        }
    }
}

impl SolverConfig {
    /// Visited-state budget for a board with `filled` non-empty bottles, 0 when too large.
    pub fn budget_for(&self, filled: usize) -> usize {
        self.budgets
            .iter()
            .find(|b| filled <= b.up_to_bottles)
            .map_or(0, |b| b.max_states)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverBudget {
    pub up_to_bottles: usize,
    pub max_states: usize,
}

/// Extra moves allowed over the optimum for each star grade: `ceil(percent% * optimal) + slack`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub three_star_percent: u32,
    pub three_star_slack: u32,
    pub two_star_percent: u32,
    pub two_star_slack: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            three_star_percent: 10,
            three_star_slack: 2,
            two_star_percent: 25,
            two_star_slack: 5,
        }
    }
}
