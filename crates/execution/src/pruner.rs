//! Deletion of candidates that fell out of the kept window.

use genflow_core::{fields, RecordId};
use genflow_storage::{JobStore, RecordFilter};
use tracing::{debug, info};

use crate::operation::prune_threshold;
use crate::state::load_master;
use crate::Result;

/// Delete candidates below generation `below`, but never inside the window
/// of `keep_generations` behind the current one.
///
/// The window is recomputed from a fresh read of the master, so a stale
/// snapshot can never delete a live generation. Nothing is deleted while a
/// ranking is cached: breeders of that generation may still be placing
/// candidates. Returns how many records were deleted.
pub async fn prune_stale(store: &dyn JobStore, master_id: &RecordId, below: u64, keep_generations: u64) -> Result<usize> {
    let master = load_master(store, master_id).await?;
    if master.state.generation.pending_rank_map.is_some() {
        debug!("Generation {} is breeding, not pruning", master.generation());
        return Ok(0);
    }
    let Some(threshold) = prune_threshold(master.generation(), keep_generations).map(|t| t.min(below)) else {
        return Ok(0);
    };
    let bound = i64::try_from(threshold).unwrap_or(i64::MAX);

    let stale = store
        .find_records(&RecordFilter::candidates().lt(fields::GENERATION_INDEX, bound))
        .await?;

    let mut deleted = 0;
    for record in stale {
        if store.delete_record(&record.id).await? {
            deleted += 1;
        }
    }

    if deleted > 0 {
        info!("Pruned {} candidates below generation {}", deleted, threshold);
    } else {
        debug!("Nothing to prune below generation {}", threshold);
    }
    Ok(deleted)
}
