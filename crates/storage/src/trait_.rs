//! Job store trait abstraction.

use async_trait::async_trait;
use genflow_core::{CoreError, Document, Record, RecordId, StatePoint};

use crate::RecordFilter;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record encoding error
    #[error("Record error: {0}")]
    Core(#[from] CoreError),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A compare-and-swap write lost against a concurrent writer
    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        /// Record written to
        id: RecordId,
        /// Version the writer read
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    /// Whether this error is a lost compare-and-swap.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}

/// Persistent keyed storage of state-points and their documents.
///
/// Records are addressed by the content hash of their state-point. All
/// methods take `&self` so one store can be shared by concurrent workers;
/// implementations serialize their own writes.
#[async_trait]
pub trait JobStore: Send + Sync {
    // === Record lifecycle ===

    /// Create a record with an initial document.
    ///
    /// Returns the record id and whether the record was newly created. If a
    /// record with the same state-point exists nothing is written.
    async fn create_record(
        &self,
        state_point: &StatePoint,
        document: Document,
    ) -> Result<(RecordId, bool)>;

    /// Load a record by id.
    async fn open_record(&self, id: &RecordId) -> Result<Option<Record>>;

    /// Load a record by state-point.
    async fn find_record(&self, state_point: &StatePoint) -> Result<Option<Record>> {
        let id = state_point.id()?;
        self.open_record(&id).await
    }

    /// List records matching the filter, ordered by id.
    async fn find_records(&self, filter: &RecordFilter) -> Result<Vec<Record>>;

    /// Count records matching the filter.
    async fn count_records(&self, filter: &RecordFilter) -> Result<usize> {
        Ok(self.find_records(filter).await?.len())
    }

    /// Replace a record's document if its version is still `expected_version`.
    ///
    /// Returns the new version, or [`StorageError::Conflict`] when another
    /// writer got there first.
    async fn update_document(
        &self,
        id: &RecordId,
        expected_version: u64,
        document: Document,
    ) -> Result<u64>;

    /// Delete a record. Returns whether it existed.
    async fn delete_record(&self, id: &RecordId) -> Result<bool>;

    // === Side artifacts ===

    /// Save a named JSON artifact, replacing any previous one.
    async fn save_artifact(&self, name: &str, value: &serde_json::Value) -> Result<()>;

    /// Load a named JSON artifact.
    async fn load_artifact(&self, name: &str) -> Result<Option<serde_json::Value>>;
}
