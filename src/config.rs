//! Configuration for the songmap engine.

use crate::error::{Result, SongmapError};
use crate::som::{AttributeDomain, GridType};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Training schedule for the map.
    pub training: TrainingSchedule,

    /// Recommendation search settings.
    pub search: SearchConfig,

    /// Attribute domains, index-aligned with record features.
    /// Empty means "infer from the catalog".
    pub attributes: Vec<AttributeDomain>,
}

impl Config {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.search.validate()?;
        for domain in &self.attributes {
            domain.validate()?;
        }
        Ok(())
    }
}

/// Immutable parameters of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSchedule {
    /// Number of training iterations.
    /// Default: 10.
    pub iter_max: usize,

    /// Learning rate at iteration 1.
    /// Default: 0.9.
    pub learn_init_rate: f64,

    /// Base of the power-law learning rate decay, in (0, 1).
    /// Default: 0.9.
    pub learning_decay_base: f64,

    /// Neighbourhood radius (in units) at iteration 0.
    /// Default: 7.
    pub neighbourhood_init_size: f64,

    /// Grid width.
    /// Default: 10.
    pub grid_width: usize,

    /// Grid height.
    /// Default: 10.
    pub grid_height: usize,

    /// Neighbourhood shape.
    /// Default: rectangular.
    pub grid_type: GridType,

    /// Random seed for unit initialisation.
    /// Default: None (random).
    pub seed: Option<u64>,

    /// Search BMUs in parallel when assigning records.
    /// Default: true.
    pub parallel: bool,
}

impl Default for TrainingSchedule {
    fn default() -> Self {
        Self {
            iter_max: 10,
            learn_init_rate: 0.9,
            learning_decay_base: 0.9,
            neighbourhood_init_size: 7.0,
            grid_width: 10,
            grid_height: 10,
            grid_type: GridType::Rectangular,
            seed: None,
            parallel: true,
        }
    }
}

impl TrainingSchedule {
    /// Returns the total number of units.
    #[inline]
    pub fn total_units(&self) -> usize {
        self.grid_width * self.grid_height
    }

    /// Checks that the schedule describes a runnable training.
    pub fn validate(&self) -> Result<()> {
        if self.iter_max == 0 {
            return Err(SongmapError::Config("iter_max must be at least 1".to_string()));
        }
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(SongmapError::Config(format!(
                "grid must have non-zero sides, got {}x{}",
                self.grid_width, self.grid_height
            )));
        }
        if !(self.learning_decay_base > 0.0 && self.learning_decay_base < 1.0) {
            return Err(SongmapError::Config(format!(
                "learning_decay_base must lie in (0, 1), got {}",
                self.learning_decay_base
            )));
        }
        if !self.learn_init_rate.is_finite() || self.learn_init_rate <= 0.0 {
            return Err(SongmapError::Config(format!(
                "learn_init_rate must be positive and finite, got {}",
                self.learn_init_rate
            )));
        }
        if !self.neighbourhood_init_size.is_finite() || self.neighbourhood_init_size < 0.0 {
            return Err(SongmapError::Config(format!(
                "neighbourhood_init_size must be non-negative and finite, got {}",
                self.neighbourhood_init_size
            )));
        }
        Ok(())
    }

    /// Random generator for unit initialisation, seeded when `seed` is set.
    pub fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

/// Recommendation search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of recommendations to aim for.
    /// Default: 10.
    pub target_count: usize,

    /// Last ring scanned around the anchor cell.
    /// Default: None (the larger grid side).
    pub max_rings: Option<usize>,

    /// When no same-category record is found, return the anchor cell's
    /// other members regardless of category.
    /// Default: true.
    pub anchor_fallback: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            target_count: 10,
            max_rings: None,
            anchor_fallback: true,
        }
    }
}

impl SearchConfig {
    /// Checks the search settings.
    pub fn validate(&self) -> Result<()> {
        if self.target_count == 0 {
            return Err(SongmapError::Config(
                "target_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
