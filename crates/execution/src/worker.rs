//! Concurrent schedulers over one store.

use std::sync::Arc;

use genflow_core::RecordId;
use genflow_storage::JobStore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::{EngineConfig, GenerationScheduler, Result, RunSummary, SchedulerError};

/// Runs `workers` schedulers side by side until each one stops.
pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    config: EngineConfig,
    master_id: RecordId,
}

impl WorkerPool {
    /// Create a pool for the run whose master is `master_id`.
    pub fn new(store: Arc<dyn JobStore>, config: EngineConfig, master_id: RecordId) -> Self {
        Self {
            store,
            config,
            master_id,
        }
    }

    /// Run every worker to completion and merge their summaries.
    ///
    /// The first worker error is returned after all workers have stopped.
    pub async fn run(&self, workers: usize) -> Result<RunSummary> {
        let workers = workers.max(1);
        info!("Starting {} workers", workers);

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let scheduler = GenerationScheduler::new(self.store.clone(), self.config.clone(), self.master_id.clone());
            set.spawn(async move {
                let summary = scheduler.run().await;
                debug!("Worker {} stopped: {:?}", worker, summary);
                summary
            });
        }

        let mut merged = RunSummary::default();
        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(summary)) => {
                    merged.passes += summary.passes;
                    merged.evaluated += summary.evaluated;
                    merged.failed += summary.failed;
                    merged.generation = merged.generation.max(summary.generation);
                    merged.terminated |= summary.terminated;
                    merged.optimized |= summary.optimized;
                }
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(SchedulerError::Worker(e.to_string()));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(merged),
        }
    }
}
