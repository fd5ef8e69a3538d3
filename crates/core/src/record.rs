//! Record model - immutable state-points plus mutable documents.

use serde::{Deserialize, Serialize};

use crate::id::RecordId;
use crate::{CandidateDocument, CoreError, MasterDocument};

/// Mutable per-record document: field name to JSON value.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// The immutable description of a record. Its hash is the record id.
///
/// Candidates carry `code` and `length`; the master record of a run
/// carries neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePoint {
    /// Target string of the run
    pub goal: String,

    /// Run seed
    pub seed: u64,

    /// Whether this is the run's master record
    pub master: bool,

    /// Candidate string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Candidate length, equal to the goal length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl StatePoint {
    /// State-point of a run's master record.
    pub fn master(goal: impl Into<String>, seed: u64) -> Self {
        Self {
            goal: goal.into(),
            seed,
            master: true,
            code: None,
            length: None,
        }
    }

    /// State-point of a candidate.
    pub fn candidate(goal: impl Into<String>, code: impl Into<String>, seed: u64) -> Self {
        let goal = goal.into();
        let length = goal.chars().count();
        Self {
            goal,
            seed,
            master: false,
            code: Some(code.into()),
            length: Some(length),
        }
    }

    /// Content hash of this state-point.
    pub fn id(&self) -> Result<RecordId, CoreError> {
        RecordId::of(self)
    }

    /// Candidate string, empty for the master record.
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or_default()
    }
}

/// A stored record as returned by a job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Content hash of the state-point
    pub id: RecordId,

    /// Immutable state-point
    pub state_point: StatePoint,

    /// Mutable document
    pub document: Document,

    /// Document version, bumped on every write
    pub version: u64,
}

impl Record {
    /// Whether this is the master record of its run.
    pub fn is_master(&self) -> bool {
        self.state_point.master
    }

    /// Typed view of a candidate document.
    pub fn candidate(&self) -> Result<CandidateDocument, CoreError> {
        CandidateDocument::from_document(&self.document)
    }

    /// Typed view of the master document.
    pub fn master_state(&self) -> Result<MasterDocument, CoreError> {
        if !self.is_master() {
            return Err(CoreError::NotMaster(self.id.clone()));
        }
        MasterDocument::from_document(&self.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_id_depends_on_code() {
        let a = StatePoint::candidate("AB", "AA", 42);
        let b = StatePoint::candidate("AB", "AA", 42);
        let c = StatePoint::candidate("AB", "AC", 42);
        assert_eq!(a.id().unwrap(), b.id().unwrap());
        assert_ne!(a.id().unwrap(), c.id().unwrap());
        assert_eq!(a.length, Some(2));
    }

    #[test]
    fn test_master_differs_from_candidates() {
        let master = StatePoint::master("AB", 42);
        assert!(master.master);
        assert_eq!(master.code(), "");
        let json = serde_json::to_value(&master).unwrap();
        assert!(json.get("code").is_none());
        assert_ne!(master.id().unwrap(), StatePoint::candidate("AB", "AB", 42).id().unwrap());
    }
}
