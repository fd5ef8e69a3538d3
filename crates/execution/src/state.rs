//! Versioned access to master and candidate documents.
//!
//! Every write is a compare-and-swap on the record version. A lost swap
//! re-reads the record and re-applies the change, a bounded number of times.

use genflow_core::{fields, CandidateDocument, MasterDocument, RecordId, StatePoint};
use genflow_storage::{JobStore, RecordFilter, StorageError};
use tracing::debug;

use crate::{Result, SchedulerError};

/// Compare-and-swap attempts before giving up.
pub(crate) const CAS_ATTEMPTS: usize = 16;

/// A snapshot of the master record.
#[derive(Debug, Clone)]
pub struct MasterHandle {
    /// Master record id
    pub id: RecordId,
    /// Document version the snapshot was read at
    pub version: u64,
    /// Master state-point (goal and seed of the run)
    pub state_point: StatePoint,
    /// Run-global state
    pub state: MasterDocument,
}

impl MasterHandle {
    /// Current generation index.
    pub fn generation(&self) -> u64 {
        self.state.generation.index
    }
}

/// Candidates of one generation.
pub fn generation_filter(generation: u64) -> RecordFilter {
    RecordFilter::candidates().eq(fields::GENERATION_INDEX, generation)
}

/// Locate the single master record in the store.
pub async fn find_master(store: &dyn JobStore) -> Result<RecordId> {
    let mut masters = store.find_records(&RecordFilter::masters()).await?;
    match masters.len() {
        0 => Err(SchedulerError::MissingMaster),
        1 => Ok(masters.remove(0).id),
        n => Err(SchedulerError::MultipleMasters(n)),
    }
}

/// Read the master record.
pub async fn load_master(store: &dyn JobStore, id: &RecordId) -> Result<MasterHandle> {
    let record = store
        .open_record(id)
        .await?
        .ok_or(SchedulerError::MissingMaster)?;
    let state = record.master_state()?;
    Ok(MasterHandle {
        id: record.id,
        version: record.version,
        state_point: record.state_point,
        state,
    })
}

/// Apply `change` to the master document.
///
/// `change` returns whether it modified the state; when it does not, nothing
/// is written and the fresh snapshot is returned.
pub async fn update_master<F>(store: &dyn JobStore, id: &RecordId, mut change: F) -> Result<MasterHandle>
where
    F: FnMut(&mut MasterDocument) -> bool + Send,
{
    for _ in 0..CAS_ATTEMPTS {
        let master = load_master(store, id).await?;
        let mut state = master.state.clone();
        if !change(&mut state) {
            return Ok(master);
        }
        match store.update_document(id, master.version, state.to_document()?).await {
            Ok(version) => {
                return Ok(MasterHandle {
                    version,
                    state,
                    ..master
                })
            }
            Err(e) if e.is_conflict() => debug!("Master write lost a race, retrying: {}", e),
            Err(e) => return Err(e.into()),
        }
    }
    Err(SchedulerError::Contention(id.clone()))
}

/// Apply `change` to a candidate document.
///
/// Returns the resulting document and whether this call wrote it, or `None`
/// when the record no longer exists.
pub async fn update_candidate<F>(
    store: &dyn JobStore,
    id: &RecordId,
    mut change: F,
) -> Result<Option<(CandidateDocument, bool)>>
where
    F: FnMut(&mut CandidateDocument) -> bool + Send,
{
    for _ in 0..CAS_ATTEMPTS {
        let Some(record) = store.open_record(id).await? else {
            return Ok(None);
        };
        let mut candidate = record.candidate()?;
        if !change(&mut candidate) {
            return Ok(Some((candidate, false)));
        }
        match store.update_document(id, record.version, candidate.to_document()?).await {
            Ok(_) => return Ok(Some((candidate, true))),
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) if e.is_conflict() => debug!("Candidate write lost a race, retrying: {}", e),
            Err(e) => return Err(e.into()),
        }
    }
    Err(SchedulerError::Contention(id.clone()))
}
