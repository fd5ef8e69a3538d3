//! The generation scheduler - drives a run one pass at a time.
//!
//! A pass takes one snapshot of the store, evaluates every operation
//! predicate against it, and dispatches the eligible operations:
//! ```text
//! Evaluate costs → Rank → Breed → Advance → Prune
//! ```
//! Generation-level operations re-read the master before acting and write it
//! with compare-and-swap, so any number of schedulers may share a store.

use std::sync::Arc;

use genflow_core::{fields, RecordId, Time};
use genflow_evolution::{evaluate, rank, EvolutionError};
use genflow_storage::{JobStore, RecordFilter};
use tracing::{debug, info, warn};

use crate::breeding::breed_generation;
use crate::operation::{eligible_operations, Census, Operation};
use crate::pruner::prune_stale;
use crate::state::{find_master, generation_filter, load_master, update_candidate, update_master};
use crate::{EngineConfig, Result, SchedulerError, TerminationDetector};

/// How a pass ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassOutcome {
    /// Something changed; another pass may find more work
    Progress,
    /// Nothing was eligible, or every attempt failed
    #[default]
    Idle,
    /// The run is finished
    Terminated,
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Generation index after the pass
    pub generation: u64,
    /// Costs written
    pub evaluated: usize,
    /// Cost evaluations that failed
    pub failed: usize,
    /// Rank fields written
    pub ranked: usize,
    /// Candidates placed in the next generation
    pub placed: usize,
    /// Whether this pass advanced the generation
    pub advanced: bool,
    /// Candidates pruned
    pub pruned: usize,
    /// How the pass ended
    pub outcome: PassOutcome,
}

impl PassReport {
    fn did_work(&self) -> bool {
        self.evaluated + self.ranked + self.placed + self.pruned > 0 || self.advanced
    }
}

/// Totals over a run of passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Passes executed
    pub passes: usize,
    /// Generation index when the run stopped
    pub generation: u64,
    /// Costs written
    pub evaluated: usize,
    /// Cost evaluations that failed
    pub failed: usize,
    /// Whether the run reached a terminal state
    pub terminated: bool,
    /// Whether the optimized flag is set: the goal was reached or the
    /// generation ceiling passed
    pub optimized: bool,
}

/// Drives one run stored in a job store.
pub struct GenerationScheduler {
    store: Arc<dyn JobStore>,
    config: EngineConfig,
    master_id: RecordId,
    detector: TerminationDetector,
}

impl GenerationScheduler {
    /// Create a scheduler for the run whose master is `master_id`.
    pub fn new(store: Arc<dyn JobStore>, config: EngineConfig, master_id: RecordId) -> Self {
        let detector = TerminationDetector::new(config.max_generations);
        Self {
            store,
            config,
            master_id,
            detector,
        }
    }

    /// Create a scheduler for the single run in `store`.
    pub async fn open(store: Arc<dyn JobStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let master_id = find_master(store.as_ref()).await?;
        Ok(Self::new(store, config, master_id))
    }

    /// Master record id of the run.
    pub fn master_id(&self) -> &RecordId {
        &self.master_id
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn store(&self) -> &dyn JobStore {
        self.store.as_ref()
    }

    /// Run one pass.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let master = load_master(self.store(), &self.master_id).await?;
        let mut report = PassReport {
            generation: master.generation(),
            ..Default::default()
        };
        if self.detector.is_terminated(&master.state) {
            report.outcome = PassOutcome::Terminated;
            return Ok(report);
        }

        let records = self.store().find_records(&RecordFilter::all()).await?;
        let census = Census::take(&records, master.generation(), self.config.keep_generations)?;
        if census.next > self.config.population_size && master.state.generation.pending_rank_map.is_some() {
            return Err(SchedulerError::PopulationOverflow {
                generation: master.generation() + 1,
                expected: self.config.population_size,
                actual: census.next,
            });
        }

        let ops = eligible_operations(&records, &master.state, &census, &self.config);
        debug!(
            "Pass over generation {}: [{}] ({:?})",
            master.generation(),
            ops.iter().map(Operation::name).collect::<Vec<_>>().join(", "),
            census
        );

        let mut goal_reached = false;
        for op in ops {
            match op {
                Operation::EvaluateCost(id) => {
                    if goal_reached {
                        continue;
                    }
                    match self.evaluate_cost(&id, master.generation()).await {
                        Ok(Some(cost)) => {
                            report.evaluated += 1;
                            goal_reached = cost == 0;
                        }
                        Ok(None) => {}
                        Err(e @ SchedulerError::StoreUnavailable(_)) => return Err(e),
                        Err(e) => {
                            warn!("Failed to evaluate {}: {}", id, e);
                            report.failed += 1;
                        }
                    }
                }
                Operation::RankGeneration { generation } => {
                    report.ranked += self.rank_generation(generation).await?;
                }
                Operation::BreedGeneration { generation } => {
                    report.placed += self.breed(generation).await?;
                }
                Operation::AdvanceGeneration { generation } => {
                    report.advanced |= self.advance(generation).await?;
                }
                Operation::PruneStale { below } => {
                    report.pruned += prune_stale(self.store(), &self.master_id, below, self.config.keep_generations).await?;
                }
            }
        }

        let after = load_master(self.store(), &self.master_id).await?;
        report.generation = after.generation();
        report.outcome = if self.detector.is_terminated(&after.state) {
            PassOutcome::Terminated
        } else if report.did_work() || after.version != master.version {
            PassOutcome::Progress
        } else {
            PassOutcome::Idle
        };
        Ok(report)
    }

    /// Run passes until the run terminates, a pass finds nothing to do, or
    /// `max_passes` is reached.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        loop {
            if let Some(max) = self.config.max_passes {
                if summary.passes >= max {
                    info!("Reached max passes ({})", max);
                    break;
                }
            }

            let report = self.run_pass().await?;
            summary.passes += 1;
            summary.generation = report.generation;
            summary.evaluated += report.evaluated;
            summary.failed += report.failed;

            match report.outcome {
                PassOutcome::Progress => continue,
                PassOutcome::Idle => {
                    info!("No eligible operations in generation {}", report.generation);
                    break;
                }
                PassOutcome::Terminated => {
                    summary.terminated = true;
                    break;
                }
            }
        }

        let master = load_master(self.store(), &self.master_id).await?;
        summary.generation = master.generation();
        summary.optimized = master.state.is_optimized();
        if summary.terminated {
            info!(
                "Run finished at generation {} (optimized: {})",
                summary.generation, summary.optimized
            );
        }
        Ok(summary)
    }

    /// Compute and store one candidate's cost.
    ///
    /// Returns the cost if this call wrote it. A cost of zero marks the run
    /// optimized.
    pub async fn evaluate_cost(&self, id: &RecordId, generation: u64) -> Result<Option<u64>> {
        let Some(record) = self.store().open_record(id).await? else {
            return Ok(None);
        };
        let current = record.candidate()?;
        if current.cost.is_some() || current.generation_index != Some(generation) {
            debug!("Skipping cost of {}: already costed or moved on", id);
            return Ok(None);
        }
        let cost = evaluate(record.state_point.code(), &record.state_point.goal)?;

        let updated = update_candidate(self.store(), id, |candidate| {
            if candidate.cost.is_some() || candidate.generation_index != Some(generation) {
                return false;
            }
            candidate.cost = Some(cost);
            true
        })
        .await?;
        if !matches!(updated, Some((_, true))) {
            debug!("Cost of {} already present, skipping", id);
            return Ok(None);
        }

        if cost == 0 {
            update_master(self.store(), &self.master_id, |state| {
                if state.is_optimized() {
                    return false;
                }
                state.optimized = Some(true);
                true
            })
            .await?;
            info!("Goal reached by {} ({:?})", id, record.state_point.code());
        }
        Ok(Some(cost))
    }

    /// Rank `generation`, cache the ranking on the master, and copy ranks
    /// onto the candidates.
    ///
    /// A racer that loses the cache write reuses the winner's ranking, and a
    /// scheduler that stopped after the cache write finishes the rank fields
    /// from the cache. Returns the number of rank fields written.
    pub async fn rank_generation(&self, generation: u64) -> Result<usize> {
        let master = load_master(self.store(), &self.master_id).await?;
        if master.generation() != generation || self.detector.is_terminated(&master.state) {
            return Ok(0);
        }

        let ranking = match master.state.generation.ranking() {
            Some(cached) => cached,
            None => {
                let members = self.store().find_records(&generation_filter(generation)).await?;
                let ranked = match rank(&members) {
                    Ok(ranked) => ranked,
                    Err(EvolutionError::IncompleteGeneration { missing }) => {
                        debug!("Generation {} not ready to rank: {} uncosted", generation, missing);
                        return Ok(0);
                    }
                    Err(e) => return Err(e.into()),
                };

                let handle = update_master(self.store(), &self.master_id, |state| {
                    if state.generation.index != generation || state.generation.pending_rank_map.is_some() {
                        return false;
                    }
                    state.generation.set_ranking(&ranked);
                    true
                })
                .await?;
                if handle.generation() != generation {
                    return Ok(0);
                }
                handle.state.generation.ranking().unwrap_or(ranked)
            }
        };

        // The artifact goes first: once every rank field is written the
        // generation may be bred and advanced at any moment.
        let artifact = serde_json::to_value(&ranking).map_err(genflow_core::CoreError::from)?;
        self.store()
            .save_artifact(&format!("ranking-{}", generation), &artifact)
            .await?;

        let mut written = 0;
        for entry in &ranking {
            let updated = update_candidate(self.store(), &entry.id, |candidate| {
                if candidate.generation_index != Some(generation) || candidate.rank == Some(entry.rank) {
                    return false;
                }
                candidate.rank = Some(entry.rank);
                true
            })
            .await?;
            if matches!(updated, Some((_, true))) {
                written += 1;
            }
        }

        if let Some(best) = ranking.first() {
            info!(
                "Ranked generation {}: {} candidates, best cost {} ({})",
                generation,
                ranking.len(),
                best.cost,
                best.id
            );
        }
        Ok(written)
    }

    async fn breed(&self, generation: u64) -> Result<usize> {
        let master = load_master(self.store(), &self.master_id).await?;
        if master.generation() != generation
            || self.detector.is_terminated(&master.state)
            || master.state.generation.pending_rank_map.is_none()
        {
            return Ok(0);
        }

        let present = self.store().count_records(&generation_filter(generation + 1)).await?;
        if present > self.config.population_size {
            return Err(SchedulerError::PopulationOverflow {
                generation: generation + 1,
                expected: self.config.population_size,
                actual: present,
            });
        }
        if present == self.config.population_size {
            return Ok(0);
        }
        let unranked = self
            .store()
            .count_records(&generation_filter(generation).exists(fields::RANK, false))
            .await?;
        if unranked > 0 {
            debug!("Generation {} has {} candidates without a rank, not breeding", generation, unranked);
            return Ok(0);
        }

        Ok(breed_generation(self.store(), &master, &self.config).await?.placed())
    }

    /// Move the run from `generation` to the next one.
    ///
    /// Requires a cached ranking and a full next generation. Passing the
    /// generation ceiling sets the optimized flag. Returns whether this call
    /// performed the advance.
    pub async fn advance(&self, generation: u64) -> Result<bool> {
        let master = load_master(self.store(), &self.master_id).await?;
        if master.generation() != generation
            || self.detector.is_terminated(&master.state)
            || master.state.generation.pending_rank_map.is_none()
        {
            return Ok(false);
        }

        let next = generation + 1;
        let present = self.store().count_records(&generation_filter(next)).await?;
        if present > self.config.population_size {
            return Err(SchedulerError::PopulationOverflow {
                generation: next,
                expected: self.config.population_size,
                actual: present,
            });
        }
        if present < self.config.population_size {
            return Ok(false);
        }

        let job_count = self.store().count_records(&RecordFilter::candidates()).await?;
        let now: Time = chrono::Utc::now();
        let mut advanced = false;
        update_master(self.store(), &self.master_id, |state| {
            advanced = false;
            if state.generation.index != generation || state.generation.pending_rank_map.is_none() {
                return false;
            }
            state.generation.index = next;
            state.generation.pending_rank_map = None;
            state.time.insert(next.to_string(), now);
            state.job_count.insert(next.to_string(), job_count);
            if self.detector.past_ceiling(next) {
                state.optimized = Some(true);
            }
            advanced = true;
            true
        })
        .await?;

        if advanced {
            info!("Advanced to generation {} ({} candidates stored)", next, job_count);
        }
        Ok(advanced)
    }
}
