//! Typed views over record documents.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::id::RecordId;
use crate::record::Document;
use crate::{CoreError, Time};

/// Document field names used in store filters.
pub mod fields {
    /// Candidate cost
    pub const COST: &str = "cost";
    /// Candidate generation index
    pub const GENERATION_INDEX: &str = "generation_index";
    /// Candidate rank within its generation
    pub const RANK: &str = "rank";
}

/// Mutable fields of a candidate record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDocument {
    /// Fitness cost, written once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u64>,

    /// Generation the candidate belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_index: Option<u64>,

    /// Rank within its generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u64>,
}

impl CandidateDocument {
    /// A fresh document placed in `generation`.
    pub fn in_generation(generation: u64) -> Self {
        Self {
            generation_index: Some(generation),
            ..Default::default()
        }
    }

    /// Parse from a raw document.
    pub fn from_document(document: &Document) -> Result<Self, CoreError> {
        from_document(document)
    }

    /// Encode as a raw document.
    pub fn to_document(&self) -> Result<Document, CoreError> {
        to_document(self)
    }
}

/// Cost and rank of one candidate in a cached ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    /// Candidate cost
    pub cost: u64,

    /// Zero-based rank
    pub rank: u64,
}

/// One row of an ordered ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedRecord {
    /// Candidate id
    pub id: RecordId,

    /// Candidate cost
    pub cost: u64,

    /// Zero-based rank
    pub rank: u64,
}

/// Generation bookkeeping held by the master record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationState {
    /// Current generation index
    pub index: u64,

    /// Cached ranking of the current generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_rank_map: Option<BTreeMap<RecordId, RankEntry>>,
}

impl GenerationState {
    /// The cached ranking as a sequence ordered by rank.
    pub fn ranking(&self) -> Option<Vec<RankedRecord>> {
        let map = self.pending_rank_map.as_ref()?;
        let mut ranked: Vec<RankedRecord> = map
            .iter()
            .map(|(id, entry)| RankedRecord {
                id: id.clone(),
                cost: entry.cost,
                rank: entry.rank,
            })
            .collect();
        ranked.sort_by_key(|r| r.rank);
        Some(ranked)
    }

    /// Cache an ordered ranking.
    pub fn set_ranking(&mut self, ranked: &[RankedRecord]) {
        let map = ranked
            .iter()
            .map(|r| (r.id.clone(), RankEntry { cost: r.cost, rank: r.rank }))
            .collect();
        self.pending_rank_map = Some(map);
    }
}

/// Run-global state held by the master record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterDocument {
    /// Generation bookkeeping
    #[serde(default)]
    pub generation: GenerationState,

    /// Set once the goal has been reached or the generation ceiling passed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized: Option<bool>,

    /// When each generation was advanced, keyed by generation index
    #[serde(default)]
    pub time: BTreeMap<String, Time>,

    /// Number of stored candidates when each generation was advanced
    #[serde(default)]
    pub job_count: BTreeMap<String, usize>,
}

impl MasterDocument {
    /// Whether the optimized flag is set.
    pub fn is_optimized(&self) -> bool {
        self.optimized.unwrap_or(false)
    }

    /// Parse from a raw document.
    pub fn from_document(document: &Document) -> Result<Self, CoreError> {
        from_document(document)
    }

    /// Encode as a raw document.
    pub fn to_document(&self) -> Result<Document, CoreError> {
        to_document(self)
    }
}

fn from_document<T: DeserializeOwned>(document: &Document) -> Result<T, CoreError> {
    Ok(serde_json::from_value(serde_json::Value::Object(document.clone()))?)
}

fn to_document<T: Serialize>(value: &T) -> Result<Document, CoreError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(CoreError::NotAnObject(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> RecordId {
        RecordId::of(&n).unwrap()
    }

    #[test]
    fn test_candidate_document_omits_missing_fields() {
        let doc = CandidateDocument::in_generation(3).to_document().unwrap();
        assert_eq!(doc.get(fields::GENERATION_INDEX), Some(&serde_json::json!(3)));
        assert!(!doc.contains_key(fields::COST));
        assert!(!doc.contains_key(fields::RANK));
    }

    #[test]
    fn test_ranking_is_ordered_by_rank() {
        let mut state = GenerationState::default();
        let ranked = vec![
            RankedRecord { id: id(9), cost: 0, rank: 0 },
            RankedRecord { id: id(1), cost: 1, rank: 1 },
            RankedRecord { id: id(5), cost: 4, rank: 2 },
        ];
        state.set_ranking(&ranked);
        assert_eq!(state.ranking().unwrap(), ranked);
    }

    #[test]
    fn test_master_document_defaults() {
        let master = MasterDocument::from_document(&Document::new()).unwrap();
        assert_eq!(master.generation.index, 0);
        assert!(!master.is_optimized());
        assert!(master.generation.ranking().is_none());
    }
}
