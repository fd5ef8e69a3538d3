//! Termination detection.

use genflow_core::{MasterDocument, Record};

/// Decides whether a run is finished and which records are still live.
///
/// Read-only; it never writes to the store.
#[derive(Debug, Clone, Copy)]
pub struct TerminationDetector {
    max_generations: u64,
}

impl TerminationDetector {
    /// Create a detector with the given generation ceiling.
    pub fn new(max_generations: u64) -> Self {
        Self { max_generations }
    }

    /// Whether no further operation may run.
    pub fn is_terminated(&self, master: &MasterDocument) -> bool {
        master.is_optimized() || self.past_ceiling(master.generation.index)
    }

    /// Whether `generation` is beyond the ceiling.
    pub fn past_ceiling(&self, generation: u64) -> bool {
        generation > self.max_generations
    }

    /// Whether a candidate belongs to the master's current generation.
    pub fn is_in_current_generation(&self, record: &Record, master: &MasterDocument) -> bool {
        record
            .candidate()
            .ok()
            .and_then(|c| c.generation_index)
            .is_some_and(|g| g == master.generation.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genflow_core::{CandidateDocument, StatePoint};

    fn candidate(generation: Option<u64>) -> Record {
        let state_point = StatePoint::candidate("AB", "AA", 1);
        Record {
            id: state_point.id().unwrap(),
            state_point,
            document: CandidateDocument {
                generation_index: generation,
                ..Default::default()
            }
            .to_document()
            .unwrap(),
            version: 1,
        }
    }

    #[test]
    fn test_optimized_flag_terminates() {
        let detector = TerminationDetector::new(10);
        let mut master = MasterDocument::default();
        assert!(!detector.is_terminated(&master));
        master.optimized = Some(true);
        assert!(detector.is_terminated(&master));
    }

    #[test]
    fn test_generation_ceiling() {
        let detector = TerminationDetector::new(3);
        let mut master = MasterDocument::default();
        master.generation.index = 3;
        assert!(!detector.is_terminated(&master));
        master.generation.index = 4;
        assert!(detector.is_terminated(&master));
    }

    #[test]
    fn test_current_generation_membership() {
        let detector = TerminationDetector::new(10);
        let mut master = MasterDocument::default();
        master.generation.index = 2;
        assert!(detector.is_in_current_generation(&candidate(Some(2)), &master));
        assert!(!detector.is_in_current_generation(&candidate(Some(1)), &master));
        assert!(!detector.is_in_current_generation(&candidate(None), &master));
    }
}
