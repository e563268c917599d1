// src/optimizer/config.rs

use std::env;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// GA knobs. Every field has a default and most can be overridden from the
/// environment with [`OptimizerConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub iterations:          usize,
    pub restarts:            usize,
    pub population_size:     usize,
    pub max_population_size: usize,
    pub train_window:        f64,   // fraction of bars
    pub validation_window:   f64,   // fraction of bars, right after train
    pub validation_interval: usize, // 0 disables periodic validation
    pub validation_keep:     f64,   // share kept by validation score
    pub elect_count:         usize,
    pub destroy_probability: f64,
    pub seed:                Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            iterations:          1000,
            restarts:            3,
            population_size:     200,
            max_population_size: 250,
            train_window:        0.7,
            validation_window:   0.3,
            validation_interval: 100,
            validation_keep:     0.25,
            elect_count:         1,
            destroy_probability: 0.001,
            seed:                None,
        }
    }
}

impl OptimizerConfig {
    /// Defaults overlaid with any of `OPTIMIZATION_ITERATIONS`,
    /// `OPTIMIZATION_RUNS`, `POPULATION_SIZE`, `MAX_POPULATION_SIZE`,
    /// `TRAIN_WINDOW`, `TEST_WINDOW`, `VALIDATION_INTERVAL`,
    /// `OPTIMIZATION_SEED`.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply environment overrides on top of `self`. Unparsable values are
    /// logged and ignored.
    pub fn with_env(mut self) -> Self {
        override_from_env("OPTIMIZATION_ITERATIONS", &mut self.iterations);
        override_from_env("OPTIMIZATION_RUNS", &mut self.restarts);
        override_from_env("POPULATION_SIZE", &mut self.population_size);
        override_from_env("MAX_POPULATION_SIZE", &mut self.max_population_size);
        override_from_env("TRAIN_WINDOW", &mut self.train_window);
        override_from_env("TEST_WINDOW", &mut self.validation_window);
        override_from_env("VALIDATION_INTERVAL", &mut self.validation_interval);
        if let Ok(raw) = env::var("OPTIMIZATION_SEED") {
            match raw.trim().parse() {
                Ok(seed) => self.seed = Some(seed),
                Err(_) => warn!("ignoring OPTIMIZATION_SEED={raw:?}: not an integer"),
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(invalid("population_size", "must be at least 2"));
        }
        if self.max_population_size < self.population_size {
            return Err(invalid("max_population_size", "must be >= population_size"));
        }
        if self.restarts == 0 {
            return Err(invalid("restarts", "must be at least 1"));
        }
        if !(self.train_window > 0.0 && self.train_window < 1.0) {
            return Err(invalid("train_window", "must be in (0, 1)"));
        }
        if !(self.validation_window > 0.0 && self.train_window + self.validation_window <= 1.0 + 1e-9) {
            return Err(invalid("validation_window", "must be positive and fit after train_window"));
        }
        if !(self.validation_keep > 0.0 && self.validation_keep <= 1.0) {
            return Err(invalid("validation_keep", "must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.destroy_probability) {
            return Err(invalid("destroy_probability", "must be in [0, 1]"));
        }
        if self.elect_count == 0 {
            return Err(invalid("elect_count", "must be at least 1"));
        }
        Ok(())
    }
}

fn override_from_env<T: FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = env::var(key) {
        match raw.trim().parse() {
            Ok(v) => *slot = v,
            Err(_) => warn!("ignoring {key}={raw:?}: cannot parse"),
        }
    }
}

fn invalid(name: &'static str, reason: &str) -> BacktestError {
    BacktestError::InvalidSetting { name, reason: reason.to_string() }
}
