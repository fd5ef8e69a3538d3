//! Execution layer - generation scheduling, breeding, and pruning.
//!
//! [`GenerationScheduler`] drives a run stored in a [`genflow_storage::JobStore`]
//! through its generations; [`WorkerPool`] runs several schedulers over the
//! same store.

#![warn(missing_docs)]

pub mod bootstrap;
pub mod breeding;
pub mod config;
pub mod engine;
pub mod error;
pub mod operation;
pub mod pruner;
pub mod state;
pub mod termination;
pub mod worker;

pub use bootstrap::bootstrap_run;
pub use breeding::{breed_generation, BreedReport, Placement};
pub use config::{ConfigError, EngineConfig};
pub use engine::{GenerationScheduler, PassOutcome, PassReport, RunSummary};
pub use error::{Result, SchedulerError};
pub use operation::{eligible_operations, Census, Operation};
pub use pruner::prune_stale;
pub use state::{find_master, load_master, MasterHandle};
pub use termination::TerminationDetector;
pub use worker::WorkerPool;
