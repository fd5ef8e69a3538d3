//! Population ranking.

use genflow_core::{RankedRecord, Record};

use crate::{EvolutionError, Result};

/// Rank the candidates of one generation.
///
/// Sorts ascending by cost with ties broken by record id, so identical
/// costs always produce the same order. Every record must have a cost.
pub fn rank(records: &[Record]) -> Result<Vec<RankedRecord>> {
    let mut costed = Vec::with_capacity(records.len());
    let mut missing = 0;
    for record in records {
        match record.candidate()?.cost {
            Some(cost) => costed.push((record.id.clone(), cost)),
            None => missing += 1,
        }
    }
    if missing > 0 {
        return Err(EvolutionError::IncompleteGeneration { missing });
    }

    costed.sort_by(|(a_id, a_cost), (b_id, b_cost)| a_cost.cmp(b_cost).then_with(|| a_id.cmp(b_id)));

    Ok(costed
        .into_iter()
        .enumerate()
        .map(|(rank, (id, cost))| RankedRecord {
            id,
            cost,
            rank: rank as u64,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use genflow_core::{CandidateDocument, StatePoint};

    fn record(code: &str, cost: Option<u64>) -> Record {
        let state_point = StatePoint::candidate("AB", code, 1);
        let doc = CandidateDocument {
            cost,
            generation_index: Some(0),
            rank: None,
        };
        Record {
            id: state_point.id().unwrap(),
            state_point,
            document: doc.to_document().unwrap(),
            version: 1,
        }
    }

    fn rank_of(ranked: &[RankedRecord], record: &Record) -> u64 {
        ranked.iter().find(|r| r.id == record.id).unwrap().rank
    }

    #[test]
    fn test_rank_by_cost() {
        let records = vec![
            record("AC", Some(1)),
            record("AB", Some(0)),
            record("AD", Some(4)),
            record("AE", Some(9)),
        ];
        let ranked = rank(&records).unwrap();
        let ranks: Vec<u64> = records.iter().map(|r| rank_of(&ranked, r)).collect();
        assert_eq!(ranks, vec![1, 0, 2, 3]);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let records = vec![record("AC", Some(1)), record("AA", Some(1)), record("BB", Some(1))];
        let ranked = rank(&records).unwrap();
        let ids: Vec<_> = ranked.iter().map(|r| r.id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(rank(&reversed).unwrap(), ranked);
    }

    #[test]
    fn test_ranks_are_a_permutation() {
        let records: Vec<_> = ["!!", "#$", "AB", "zz", "~~"]
            .iter()
            .enumerate()
            .map(|(i, c)| record(c, Some((i % 2) as u64)))
            .collect();
        let mut ranks: Vec<u64> = rank(&records).unwrap().iter().map(|r| r.rank).collect();
        ranks.sort();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_incomplete_generation() {
        let records = vec![record("AC", Some(1)), record("AA", None)];
        let err = rank(&records).unwrap_err();
        assert!(matches!(err, EvolutionError::IncompleteGeneration { missing: 1 }));
    }
}
