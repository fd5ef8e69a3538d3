//! Run bootstrap: the master record and the initial random population.

use genflow_core::{MasterDocument, RecordId, StatePoint};
use genflow_evolution::{CodeRng, MAX_CHAR, MIN_CHAR};
use genflow_storage::{JobStore, RecordFilter};
use tracing::info;

use crate::breeding::fill_generation;
use crate::state::load_master;
use crate::{ConfigError, EngineConfig, Result, SchedulerError};

/// Create a run for `goal` and fill generation 0.
///
/// Calling this again for the same goal and seed is a no-op that returns the
/// existing master; an interrupted bootstrap is completed. A store that
/// already holds a different run is rejected.
pub async fn bootstrap_run(store: &dyn JobStore, goal: &str, seed: u64, config: &EngineConfig) -> Result<RecordId> {
    config.validate()?;
    validate_goal(goal)?;
    let state_point = StatePoint::master(goal, seed);
    let id = state_point.id()?;

    let masters = store.find_records(&RecordFilter::masters()).await?;
    match masters.as_slice() {
        [] => {}
        [existing] if existing.id == id => {}
        [existing] => return Err(SchedulerError::RunExists(existing.id.clone())),
        _ => return Err(SchedulerError::MultipleMasters(masters.len())),
    }

    let (id, created) = store
        .create_record(&state_point, MasterDocument::default().to_document()?)
        .await?;
    let master = load_master(store, &id).await?;

    // Only an untouched generation 0 may still be topped up.
    if master.generation() != 0 || master.state.generation.pending_rank_map.is_some() {
        info!("Run {} already initialized at generation {}", id, master.generation());
        return Ok(id);
    }

    let mut rng = CodeRng::for_generation(seed, 0);
    let added = fill_generation(
        store,
        &state_point,
        0,
        config.population_size,
        &mut rng,
        config.repair_budget(),
    )
    .await?;

    if created {
        info!("Initialized run {} for {:?} with {} candidates", id, goal, added);
    } else {
        info!("Resumed bootstrap of run {}: {} candidates added", id, added);
    }
    Ok(id)
}

/// Goals are non-empty printable ASCII, the alphabet candidates are drawn from.
fn validate_goal(goal: &str) -> std::result::Result<(), ConfigError> {
    if goal.is_empty() {
        return Err(ConfigError::Invalid("goal must not be empty".to_string()));
    }
    if let Some(c) = goal.chars().find(|c| !(MIN_CHAR..=MAX_CHAR).contains(&u32::from(*c))) {
        return Err(ConfigError::Invalid(format!("goal contains {:?}, outside printable ASCII", c)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::generation_filter;
    use genflow_storage::InMemoryJobStore;

    #[tokio::test]
    async fn test_bootstrap_creates_master_and_population() {
        let store = InMemoryJobStore::new();
        let config = EngineConfig::new().with_population_size(8);
        let id = bootstrap_run(&store, "Hello", 42, &config).await.unwrap();

        let master = load_master(&store, &id).await.unwrap();
        assert_eq!(master.generation(), 0);
        assert!(master.state.time.is_empty());
        assert!(master.state.job_count.is_empty());

        let population = store.find_records(&generation_filter(0)).await.unwrap();
        assert_eq!(population.len(), 8);
        for record in &population {
            assert_eq!(record.state_point.code().chars().count(), 5);
            assert_eq!(record.state_point.seed, 42);
            assert!(record.candidate().unwrap().cost.is_none());
        }
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let store = InMemoryJobStore::new();
        let config = EngineConfig::new().with_population_size(4);
        let first = bootstrap_run(&store, "AB", 7, &config).await.unwrap();
        let second = bootstrap_run(&store, "AB", 7, &config).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count_records(&RecordFilter::all()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_other_run() {
        let store = InMemoryJobStore::new();
        let config = EngineConfig::new().with_population_size(4);
        let first = bootstrap_run(&store, "AB", 7, &config).await.unwrap();

        let err = bootstrap_run(&store, "AB", 8, &config).await.unwrap_err();
        assert!(matches!(err, SchedulerError::RunExists(id) if id == first));
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_invalid_config() {
        let store = InMemoryJobStore::new();
        let config = EngineConfig::new().with_population_size(1);
        let err = bootstrap_run(&store, "AB", 7, &config).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Config(_)));
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_unreachable_goals() {
        let store = InMemoryJobStore::new();
        let config = EngineConfig::new().with_population_size(4);
        for goal in ["", "héllo", "tab\there"] {
            let err = bootstrap_run(&store, goal, 7, &config).await.unwrap_err();
            assert!(matches!(err, SchedulerError::Config(ConfigError::Invalid(_))), "{:?}", goal);
        }
        assert_eq!(store.count_records(&RecordFilter::all()).await.unwrap(), 0);
    }
}
