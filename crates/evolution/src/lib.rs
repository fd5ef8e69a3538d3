//! Evolution layer - fitness, genetic operators, and ranking.

#![warn(missing_docs, unused_crate_dependencies)]

pub mod fitness;
pub mod operators;
pub mod ranker;

pub use fitness::evaluate;
pub use operators::{crossover_at, mutate_at, CodeRng, CrossoverPoint, Direction, MAX_CHAR, MIN_CHAR};
pub use ranker::rank;

/// Result type for evolution operations.
pub type Result<T> = std::result::Result<T, EvolutionError>;

/// Errors raised by fitness, operators, and ranking.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    /// Candidate length does not match
    #[error("Invalid candidate: expected length {expected}, got {actual}")]
    InvalidCandidate {
        /// Required length
        expected: usize,
        /// Length supplied
        actual: usize,
    },

    /// Ranking attempted before every candidate has a cost
    #[error("Incomplete generation: {missing} candidates without a cost")]
    IncompleteGeneration {
        /// Candidates still missing a cost
        missing: usize,
    },

    /// Record could not be decoded
    #[error("Record error: {0}")]
    Record(#[from] genflow_core::CoreError),
}
