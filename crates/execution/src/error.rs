//! Scheduler errors.

use genflow_core::{CoreError, RecordId};
use genflow_evolution::EvolutionError;
use genflow_storage::StorageError;

use crate::ConfigError;

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors that abort a scheduler pass or a run.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The job store failed; the pass is aborted
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    /// The repair loop could not restore the population size
    #[error("Repair livelock in generation {generation}: {placed}/{target} placed after {attempts} attempts")]
    RepairLivelock {
        /// Generation being filled
        generation: u64,
        /// Candidates present when giving up
        placed: usize,
        /// Required population size
        target: usize,
        /// Creations attempted
        attempts: usize,
    },

    /// A generation holds more candidates than the population size
    #[error("Generation {generation} holds {actual} candidates, expected {expected}")]
    PopulationOverflow {
        /// Offending generation
        generation: u64,
        /// Required population size
        expected: usize,
        /// Candidates found
        actual: usize,
    },

    /// No master record in the store
    #[error("No master record found")]
    MissingMaster,

    /// More than one master record in the store
    #[error("Found {0} master records, expected one")]
    MultipleMasters(usize),

    /// The store already holds a different run
    #[error("Store already holds a run with master {0}")]
    RunExists(RecordId),

    /// Compare-and-swap kept losing against other writers
    #[error("Gave up writing {0} after repeated version conflicts")]
    Contention(RecordId),

    /// Record could not be decoded
    #[error("Record error: {0}")]
    Record(#[from] CoreError),

    /// Genetic operator or ranking failure
    #[error("Evolution error: {0}")]
    Evolution(#[from] EvolutionError),

    /// Configuration error
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A worker task panicked or was cancelled
    #[error("Worker failed: {0}")]
    Worker(String),
}
