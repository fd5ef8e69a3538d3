//! Operation kinds and their eligibility predicates.
//!
//! Every operation the scheduler can run is a variant of [`Operation`]. Each
//! has a predicate over a snapshot of the records and the master state; the
//! scheduler evaluates all of them once per pass and dispatches the eligible
//! ones.

use genflow_core::{CoreError, MasterDocument, Record, RecordId};

use crate::{EngineConfig, TerminationDetector};

/// An operation the scheduler may apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Compute and store the cost of one candidate
    EvaluateCost(RecordId),
    /// Rank a fully costed generation and cache the ranking
    RankGeneration {
        /// Generation to rank
        generation: u64,
    },
    /// Produce the next generation from a ranked one
    BreedGeneration {
        /// Ranked parent generation
        generation: u64,
    },
    /// Move the generation counter past a ranked, fully bred generation
    AdvanceGeneration {
        /// Generation being left
        generation: u64,
    },
    /// Delete candidates older than the kept window
    PruneStale {
        /// Candidates with a generation index below this are deleted
        below: u64,
    },
}

impl Operation {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::EvaluateCost(_) => "evaluate_cost",
            Operation::RankGeneration { .. } => "rank_generation",
            Operation::BreedGeneration { .. } => "breed_generation",
            Operation::AdvanceGeneration { .. } => "advance_generation",
            Operation::PruneStale { .. } => "prune_stale",
        }
    }
}

/// Counts taken from one scan of the candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    /// Current generation index
    pub generation: u64,
    /// Candidates in the current generation
    pub current: usize,
    /// Candidates in the current generation without a cost
    pub uncosted: usize,
    /// Candidates in the current generation without a rank
    pub unranked: usize,
    /// Candidates already placed in the next generation
    pub next: usize,
    /// Candidates old enough to prune
    pub stale: usize,
}

impl Census {
    /// Count candidates relative to `generation`.
    pub fn take(records: &[Record], generation: u64, keep_generations: u64) -> Result<Self, CoreError> {
        let threshold = prune_threshold(generation, keep_generations);
        let mut census = Census {
            generation,
            ..Default::default()
        };
        for record in records.iter().filter(|r| !r.is_master()) {
            let candidate = record.candidate()?;
            let Some(index) = candidate.generation_index else {
                continue;
            };
            if index == generation {
                census.current += 1;
                if candidate.cost.is_none() {
                    census.uncosted += 1;
                }
                if candidate.rank.is_none() {
                    census.unranked += 1;
                }
            } else if index == generation + 1 {
                census.next += 1;
            } else if threshold.is_some_and(|t| index < t) {
                census.stale += 1;
            }
        }
        Ok(census)
    }
}

/// Generation index below which candidates are pruned, if any.
pub fn prune_threshold(generation: u64, keep_generations: u64) -> Option<u64> {
    generation.checked_sub(keep_generations).filter(|t| *t > 0)
}

/// A candidate of the current, not yet ranked generation still needs its
/// cost.
pub fn can_evaluate_cost(record: &Record, master: &MasterDocument, detector: &TerminationDetector) -> bool {
    if record.is_master() || detector.is_terminated(master) || master.generation.pending_rank_map.is_some() {
        return false;
    }
    if !detector.is_in_current_generation(record, master) {
        return false;
    }
    record.candidate().is_ok_and(|c| c.cost.is_none())
}

/// The current generation is fully costed and either not yet ranked or
/// still missing some rank fields.
pub fn can_rank(master: &MasterDocument, census: &Census, detector: &TerminationDetector) -> bool {
    !detector.is_terminated(master)
        && census.current > 0
        && census.uncosted == 0
        && (master.generation.pending_rank_map.is_none() || census.unranked > 0)
}

/// The current generation is ranked down to every rank field and the next
/// one is not yet full.
pub fn can_breed(master: &MasterDocument, census: &Census, config: &EngineConfig, detector: &TerminationDetector) -> bool {
    !detector.is_terminated(master)
        && master.generation.pending_rank_map.is_some()
        && census.unranked == 0
        && census.next < config.population_size
}

/// The current generation is ranked and the next one is exactly full.
pub fn can_advance(master: &MasterDocument, census: &Census, config: &EngineConfig, detector: &TerminationDetector) -> bool {
    !detector.is_terminated(master)
        && master.generation.pending_rank_map.is_some()
        && census.next == config.population_size
}

/// Some candidate is older than the kept window and no generation is
/// being bred.
pub fn can_prune(master: &MasterDocument, census: &Census, detector: &TerminationDetector) -> bool {
    !detector.is_terminated(master) && master.generation.pending_rank_map.is_none() && census.stale > 0
}

/// Evaluate every predicate against one snapshot.
///
/// Cost evaluations come first, then generation-level operations in state
/// machine order, then pruning.
pub fn eligible_operations(
    records: &[Record],
    master: &MasterDocument,
    census: &Census,
    config: &EngineConfig,
) -> Vec<Operation> {
    let detector = TerminationDetector::new(config.max_generations);
    let generation = master.generation.index;

    let mut ops: Vec<Operation> = records
        .iter()
        .filter(|r| can_evaluate_cost(r, master, &detector))
        .map(|r| Operation::EvaluateCost(r.id.clone()))
        .collect();

    if can_rank(master, census, &detector) {
        ops.push(Operation::RankGeneration { generation });
    }
    if can_breed(master, census, config, &detector) {
        ops.push(Operation::BreedGeneration { generation });
    }
    if can_advance(master, census, config, &detector) {
        ops.push(Operation::AdvanceGeneration { generation });
    }
    if can_prune(master, census, &detector) {
        if let Some(below) = prune_threshold(generation, config.keep_generations) {
            ops.push(Operation::PruneStale { below });
        }
    }
    ops
}
