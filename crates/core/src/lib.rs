//! genflow core data models.
//!
//! This crate defines the records a genetic optimization run is stored as:
//! candidate and master state-points, their typed documents, and the
//! content-addressed ids that deduplicate them.

#![warn(missing_docs)]

// Core identities
mod id;

// Records and documents
mod record;
mod document;

// Re-exports
pub use id::RecordId;
pub use record::{Document, Record, StatePoint};
pub use document::{
    fields, CandidateDocument, GenerationState, MasterDocument, RankEntry, RankedRecord,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;

/// Errors raised while encoding or decoding records.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed record id
    #[error("Invalid record id: {0}")]
    InvalidId(String),

    /// A document did not encode to a JSON object
    #[error("Document is not an object: {0}")]
    NotAnObject(String),

    /// Master state requested from a candidate record
    #[error("Record {0} is not a master record")]
    NotMaster(RecordId),
}
