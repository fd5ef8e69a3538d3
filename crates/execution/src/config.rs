//! Run configuration.

use std::path::Path;

use genflow_evolution::CrossoverPoint;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the generation scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Candidates per generation
    pub population_size: usize,
    /// Generation ceiling; the run ends once the index passes it
    pub max_generations: u64,
    /// Chance that a surviving candidate's child is mutated
    pub mutation_probability: f64,
    /// Crossover cut policy
    pub crossover: CrossoverPoint,
    /// Record creations allowed per repair loop (None = ten per slot)
    pub max_repair_attempts: Option<usize>,
    /// Generations kept behind the current one before pruning
    pub keep_generations: u64,
    /// Max passes per worker before stopping (None = until done)
    pub max_passes: Option<usize>,
    /// Concurrent workers
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            max_generations: 1000,
            mutation_probability: 0.5,
            crossover: CrossoverPoint::Midpoint,
            max_repair_attempts: None,
            keep_generations: 2,
            max_passes: None,
            workers: 1,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::Invalid(format!(
                "population_size must be at least 2, got {}",
                self.population_size
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_probability) {
            return Err(ConfigError::Invalid(format!(
                "mutation_probability must be within [0, 1], got {}",
                self.mutation_probability
            )));
        }
        if self.keep_generations < 2 {
            return Err(ConfigError::Invalid(format!(
                "keep_generations must be at least 2, got {}",
                self.keep_generations
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Record creations a repair loop may attempt.
    pub fn repair_budget(&self) -> usize {
        self.max_repair_attempts
            .unwrap_or(self.population_size.saturating_mul(10))
    }

    /// Set the population size.
    pub fn with_population_size(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    /// Set the generation ceiling.
    pub fn with_max_generations(mut self, max_generations: u64) -> Self {
        self.max_generations = max_generations;
        self
    }

    /// Set the mutation probability.
    pub fn with_mutation_probability(mut self, probability: f64) -> Self {
        self.mutation_probability = probability;
        self
    }

    /// Set the crossover policy.
    pub fn with_crossover(mut self, crossover: CrossoverPoint) -> Self {
        self.crossover = crossover;
        self
    }

    /// Set the repair budget.
    pub fn with_max_repair_attempts(mut self, attempts: usize) -> Self {
        self.max_repair_attempts = Some(attempts);
        self
    }

    /// Set the pass limit per worker.
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = Some(passes);
        self
    }

    /// Set the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_generations, 1000);
        assert_eq!(config.repair_budget(), 200);
    }

    #[test]
    fn test_invalid_values() {
        assert!(EngineConfig::new().with_population_size(1).validate().is_err());
        assert!(EngineConfig::new().with_mutation_probability(1.5).validate().is_err());
        assert!(EngineConfig::new().with_workers(0).validate().is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genflow.json");
        std::fs::write(&path, r#"{"population_size": 8, "crossover": "random"}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.population_size, 8);
        assert_eq!(config.crossover, CrossoverPoint::Random);
        assert_eq!(config.mutation_probability, 0.5);
    }
}
