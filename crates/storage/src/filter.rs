//! Record filters evaluated by job stores.

use genflow_core::Record;
use serde_json::Value;

/// A predicate over one document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field is present (`true`) or absent (`false`)
    Exists(bool),
    /// Field equals the value
    Eq(Value),
    /// Field is a number strictly below the bound
    Lt(i64),
    /// Field is a number at or above the bound
    Gte(i64),
}

impl Condition {
    fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Condition::Exists(expected) => value.is_some() == *expected,
            Condition::Eq(expected) => value == Some(expected),
            Condition::Lt(bound) => value.and_then(Value::as_i64).is_some_and(|v| v < *bound),
            Condition::Gte(bound) => value.and_then(Value::as_i64).is_some_and(|v| v >= *bound),
        }
    }
}

/// Filter over a record's state-point and document.
///
/// All conditions must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Restrict to master (`true`) or candidate (`false`) records
    pub master: Option<bool>,
    /// Document field conditions
    pub conditions: Vec<(String, Condition)>,
}

impl RecordFilter {
    /// Match every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match candidate records only.
    pub fn candidates() -> Self {
        Self {
            master: Some(false),
            ..Default::default()
        }
    }

    /// Match master records only.
    pub fn masters() -> Self {
        Self {
            master: Some(true),
            ..Default::default()
        }
    }

    /// Add a condition on a document field.
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push((field.into(), condition));
        self
    }

    /// Require a field to be present or absent.
    pub fn exists(self, field: impl Into<String>, exists: bool) -> Self {
        self.with(field, Condition::Exists(exists))
    }

    /// Require a field to equal a value.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    /// Require a numeric field below a bound.
    pub fn lt(self, field: impl Into<String>, bound: i64) -> Self {
        self.with(field, Condition::Lt(bound))
    }

    /// Require a numeric field at or above a bound.
    pub fn gte(self, field: impl Into<String>, bound: i64) -> Self {
        self.with(field, Condition::Gte(bound))
    }

    /// Evaluate the filter against a record.
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(master) = self.master {
            if record.state_point.master != master {
                return false;
            }
        }
        self.conditions
            .iter()
            .all(|(field, condition)| condition.matches(record.document.get(field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genflow_core::{fields, CandidateDocument, StatePoint};

    fn record(code: &str, doc: CandidateDocument) -> Record {
        let state_point = StatePoint::candidate("AB", code, 1);
        Record {
            id: state_point.id().unwrap(),
            state_point,
            document: doc.to_document().unwrap(),
            version: 1,
        }
    }

    #[test]
    fn test_exists_and_eq() {
        let costed = record("AA", CandidateDocument { cost: Some(1), generation_index: Some(0), rank: None });
        let fresh = record("AC", CandidateDocument::in_generation(0));

        let filter = RecordFilter::candidates()
            .eq(fields::GENERATION_INDEX, 0)
            .exists(fields::COST, false);
        assert!(!filter.matches(&costed));
        assert!(filter.matches(&fresh));
    }

    #[test]
    fn test_lt_ignores_missing_fields() {
        let old = record("AA", CandidateDocument::in_generation(1));
        let unplaced = record("AC", CandidateDocument::default());

        let filter = RecordFilter::candidates().lt(fields::GENERATION_INDEX, 3);
        assert!(filter.matches(&old));
        assert!(!filter.matches(&unplaced));
        assert!(!RecordFilter::candidates().gte(fields::GENERATION_INDEX, 2).matches(&old));
    }

    #[test]
    fn test_master_restriction() {
        let state_point = StatePoint::master("AB", 1);
        let master = Record {
            id: state_point.id().unwrap(),
            state_point,
            document: Default::default(),
            version: 1,
        };
        assert!(!RecordFilter::candidates().matches(&master));
        assert!(RecordFilter::masters().matches(&master));
        assert!(RecordFilter::all().matches(&master));
    }
}
