//! Breeding the next generation from a ranked one.
//!
//! The two best candidates are crossed, every candidate except the worst four
//! leaves one mutated child, and random candidates fill whatever is missing.
//! The random stream is derived from the run seed and the generation being
//! filled, so replaying an interrupted breeding proposes the same candidates
//! and every placement becomes a no-op.

use genflow_core::{CandidateDocument, StatePoint};
use genflow_evolution::{CodeRng, EvolutionError};
use genflow_storage::{JobStore, StorageError};
use tracing::{debug, info};

use crate::state::{generation_filter, load_master, update_candidate, MasterHandle};
use crate::{EngineConfig, Result, SchedulerError};

/// Candidates at the bottom of the ranking that leave no descendant.
pub const TRUNCATED: usize = 4;

/// What happened when a candidate was placed in a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A new record was created in the generation
    Created,
    /// An existing record from the previous generation moved up
    Promoted,
    /// The record was already in the generation
    AlreadyPlaced,
    /// The record exists in an unrelated generation and was left alone
    Collision,
}

/// Summary of one breeding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreedReport {
    /// Generation that was filled
    pub generation: u64,
    /// Descendants created
    pub created: usize,
    /// Parents carried over unchanged
    pub promoted: usize,
    /// Descendants skipped because they collided with unrelated records
    pub collisions: usize,
    /// Random candidates added by the repair loop
    pub repaired: usize,
}

impl BreedReport {
    /// Records this pass added to the generation.
    pub fn placed(&self) -> usize {
        self.created + self.promoted + self.repaired
    }
}

/// Codes of the descendants of a ranked generation, in placement order.
///
/// `parents` holds the parent codes ordered best first.
pub fn plan_descendants(
    parents: &[String],
    rng: &mut CodeRng,
    config: &EngineConfig,
) -> std::result::Result<Vec<String>, EvolutionError> {
    let mut descendants = Vec::with_capacity(parents.len());

    if let [first, second, ..] = parents {
        let (a, b) = rng.crossover(first, second, config.crossover)?;
        descendants.push(a);
        descendants.push(b);
    }

    let survivors = parents.len().saturating_sub(TRUNCATED);
    for code in &parents[..survivors] {
        descendants.push(rng.mutate(code, config.mutation_probability));
    }

    Ok(descendants)
}

/// Place a candidate in `generation`.
///
/// Creation is deduplicated by the store. An existing record is moved up
/// only from the generation directly below, or when it has no generation;
/// it keeps its cost and loses its rank.
pub async fn place(store: &dyn JobStore, state_point: &StatePoint, generation: u64) -> Result<Placement> {
    let document = CandidateDocument::in_generation(generation).to_document()?;
    let (id, created) = store.create_record(state_point, document).await?;
    if created {
        return Ok(Placement::Created);
    }

    let mut outcome = Placement::Collision;
    let updated = update_candidate(store, &id, |candidate| match candidate.generation_index {
        Some(g) if g == generation => {
            outcome = Placement::AlreadyPlaced;
            false
        }
        Some(g) if g + 1 == generation => {
            candidate.generation_index = Some(generation);
            candidate.rank = None;
            outcome = Placement::Promoted;
            true
        }
        None => {
            candidate.generation_index = Some(generation);
            candidate.rank = None;
            outcome = Placement::Promoted;
            true
        }
        Some(_) => {
            outcome = Placement::Collision;
            false
        }
    })
    .await?;

    if updated.is_none() {
        // Deleted between create and update.
        return Ok(Placement::Collision);
    }
    debug!("Placed existing record {} in generation {}: {:?}", id, generation, outcome);
    Ok(outcome)
}

/// Top `generation` up to `target` candidates with random codes.
///
/// Gives up with [`SchedulerError::RepairLivelock`] after `budget` creation
/// attempts. Returns the number of candidates this call added.
pub async fn fill_generation(
    store: &dyn JobStore,
    master: &StatePoint,
    generation: u64,
    target: usize,
    rng: &mut CodeRng,
    budget: usize,
) -> Result<usize> {
    let length = master.goal.chars().count();
    let filter = generation_filter(generation);
    let mut attempts = 0;
    let mut added = 0;

    loop {
        let present = store.count_records(&filter).await?;
        if present >= target {
            return Ok(added);
        }
        if attempts >= budget {
            return Err(SchedulerError::RepairLivelock {
                generation,
                placed: present,
                target,
                attempts,
            });
        }
        attempts += 1;

        let code = rng.random_candidate(length);
        let state_point = StatePoint::candidate(master.goal.clone(), code, master.seed);
        if matches!(
            place(store, &state_point, generation).await?,
            Placement::Created | Placement::Promoted
        ) {
            added += 1;
        }
    }
}

/// Breed the generation after the master's current one.
///
/// Requires a cached ranking. Stops placing as soon as the next generation
/// holds `population_size` candidates. Concurrent breeders of one generation
/// propose the same sequence of candidates, so together they place a prefix
/// of it and never more than the target. A breeder whose snapshot went stale
/// (the run advanced and pruned its parents) returns an empty report.
pub async fn breed_generation(store: &dyn JobStore, master: &MasterHandle, config: &EngineConfig) -> Result<BreedReport> {
    let target = master.generation() + 1;
    let mut report = BreedReport {
        generation: target,
        ..Default::default()
    };
    let Some(ranking) = master.state.generation.ranking() else {
        return Ok(report);
    };

    let mut parents = Vec::with_capacity(ranking.len());
    for ranked in &ranking {
        let Some(record) = store.open_record(&ranked.id).await? else {
            // A parent only disappears once the run has moved past this
            // generation and pruned it; anything else is a broken store.
            if !still_breeding(store, master).await? {
                return Ok(report);
            }
            return Err(StorageError::NotFound(ranked.id.to_string()).into());
        };
        parents.push(record.state_point.code().to_string());
    }

    let mut rng = CodeRng::for_generation(master.state_point.seed, target);
    let descendants = plan_descendants(&parents, &mut rng, config)?;

    let filter = generation_filter(target);
    for code in descendants {
        if store.count_records(&filter).await? >= config.population_size {
            break;
        }
        if !still_breeding(store, master).await? {
            return Ok(report);
        }
        let state_point = StatePoint::candidate(master.state_point.goal.clone(), code, master.state_point.seed);
        match place(store, &state_point, target).await? {
            Placement::Created => report.created += 1,
            Placement::Promoted => report.promoted += 1,
            Placement::Collision => report.collisions += 1,
            Placement::AlreadyPlaced => {}
        }
    }

    if !still_breeding(store, master).await? {
        return Ok(report);
    }
    report.repaired = fill_generation(
        store,
        &master.state_point,
        target,
        config.population_size,
        &mut rng,
        config.repair_budget(),
    )
    .await?;

    info!(
        "Bred generation {}: {} created, {} promoted, {} collisions, {} repaired",
        target, report.created, report.promoted, report.collisions, report.repaired
    );
    Ok(report)
}

/// Whether the master still sits on the snapshot's generation with its
/// ranking cached. Once the run advances, the target generation is live and
/// only its own breeders may add to it.
async fn still_breeding(store: &dyn JobStore, master: &MasterHandle) -> Result<bool> {
    let fresh = load_master(store, &master.id).await?;
    let breeding = fresh.generation() == master.generation() && fresh.state.generation.pending_rank_map.is_some();
    if !breeding {
        debug!("Generation {} moved on while breeding, stopping", master.generation());
    }
    Ok(breeding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use genflow_storage::InMemoryJobStore;

    fn codes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:02}", i)).collect()
    }

    #[test]
    fn test_plan_truncates_worst_four() {
        let config = EngineConfig::new().with_mutation_probability(0.0);
        let mut rng = CodeRng::new(1);
        let plan = plan_descendants(&codes(10), &mut rng, &config).unwrap();

        // Two crossover children plus one child per survivor.
        assert_eq!(plan.len(), 2 + 6);
        assert_eq!(&plan[..2], &["01".to_string(), "00".to_string()]);
        assert_eq!(&plan[2..], &codes(6)[..]);
    }

    #[test]
    fn test_plan_small_population() {
        let config = EngineConfig::new().with_mutation_probability(0.0);
        let mut rng = CodeRng::new(1);
        let plan = plan_descendants(&codes(4), &mut rng, &config).unwrap();
        assert_eq!(plan, vec!["01".to_string(), "00".to_string()]);
    }

    #[test]
    fn test_plan_is_reproducible() {
        let config = EngineConfig::new().with_mutation_probability(1.0);
        let a = plan_descendants(&codes(8), &mut CodeRng::for_generation(5, 2), &config).unwrap();
        let b = plan_descendants(&codes(8), &mut CodeRng::for_generation(5, 2), &config).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_place_outcomes() {
        let store = InMemoryJobStore::new();
        let parent = StatePoint::candidate("AB", "AA", 1);
        let old = StatePoint::candidate("AB", "AC", 1);
        store
            .create_record(&parent, CandidateDocument { cost: Some(1), generation_index: Some(2), rank: Some(0) }.to_document().unwrap())
            .await
            .unwrap();
        store
            .create_record(&old, CandidateDocument::in_generation(0).to_document().unwrap())
            .await
            .unwrap();

        let fresh = StatePoint::candidate("AB", "BB", 1);
        assert_eq!(place(&store, &fresh, 3).await.unwrap(), Placement::Created);
        assert_eq!(place(&store, &fresh, 3).await.unwrap(), Placement::AlreadyPlaced);
        assert_eq!(place(&store, &parent, 3).await.unwrap(), Placement::Promoted);
        assert_eq!(place(&store, &old, 3).await.unwrap(), Placement::Collision);

        // A grandparent is not pulled forward; its slot goes to the repair loop.
        let grandparent = StatePoint::candidate("AB", "AD", 1);
        store
            .create_record(&grandparent, CandidateDocument::in_generation(1).to_document().unwrap())
            .await
            .unwrap();
        assert_eq!(place(&store, &grandparent, 3).await.unwrap(), Placement::Collision);
        let left = store.find_record(&grandparent).await.unwrap().unwrap().candidate().unwrap();
        assert_eq!(left.generation_index, Some(1));

        let promoted = store.find_record(&parent).await.unwrap().unwrap().candidate().unwrap();
        assert_eq!(promoted.generation_index, Some(3));
        assert_eq!(promoted.cost, Some(1));
        assert_eq!(promoted.rank, None);
    }

    #[tokio::test]
    async fn test_fill_generation_to_target() {
        let store = InMemoryJobStore::new();
        let master = StatePoint::master("Hello", 9);
        let mut rng = CodeRng::for_generation(9, 0);
        let added = fill_generation(&store, &master, 0, 6, &mut rng, 60).await.unwrap();
        assert_eq!(added, 6);
        assert_eq!(store.count_records(&generation_filter(0)).await.unwrap(), 6);

        let mut rng = CodeRng::for_generation(9, 0);
        let added = fill_generation(&store, &master, 0, 6, &mut rng, 60).await.unwrap();
        assert_eq!(added, 0);
    }

    #[tokio::test]
    async fn test_stale_breeder_stops_quietly() {
        use crate::{bootstrap_run, state::update_master};

        let store = InMemoryJobStore::new();
        let config = EngineConfig::new().with_population_size(4);
        let id = bootstrap_run(&store, "AB", 3, &config).await.unwrap();
        let generation = store.find_records(&generation_filter(0)).await.unwrap();
        let ranking: Vec<_> = generation
            .iter()
            .enumerate()
            .map(|(i, r)| genflow_core::RankedRecord { id: r.id.clone(), cost: i as u64, rank: i as u64 })
            .collect();
        update_master(&store, &id, |state| {
            state.generation.set_ranking(&ranking);
            true
        })
        .await
        .unwrap();
        let stale = load_master(&store, &id).await.unwrap();

        // Another scheduler advances and prunes the parents away.
        update_master(&store, &id, |state| {
            state.generation.index = 3;
            state.generation.pending_rank_map = None;
            true
        })
        .await
        .unwrap();
        for record in generation {
            store.delete_record(&record.id).await.unwrap();
        }

        let report = breed_generation(&store, &stale, &config).await.unwrap();
        assert_eq!(report.placed(), 0);
        assert_eq!(store.count_records(&generation_filter(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_parent_of_live_generation_is_an_error() {
        use crate::{bootstrap_run, state::update_master};

        let store = InMemoryJobStore::new();
        let config = EngineConfig::new().with_population_size(4);
        let id = bootstrap_run(&store, "AB", 3, &config).await.unwrap();
        let generation = store.find_records(&generation_filter(0)).await.unwrap();
        let ranking: Vec<_> = generation
            .iter()
            .enumerate()
            .map(|(i, r)| genflow_core::RankedRecord { id: r.id.clone(), cost: i as u64, rank: i as u64 })
            .collect();
        let master = update_master(&store, &id, |state| {
            state.generation.set_ranking(&ranking);
            true
        })
        .await
        .unwrap();
        store.delete_record(&generation[0].id).await.unwrap();

        let err = breed_generation(&store, &master, &config).await.unwrap_err();
        assert!(matches!(err, SchedulerError::StoreUnavailable(StorageError::NotFound(_))));
    }
}
