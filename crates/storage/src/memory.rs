//! In-memory job store.

use std::collections::HashMap;

use async_trait::async_trait;
use genflow_core::{Document, Record, RecordId, StatePoint};
use tokio::sync::RwLock;

use super::{JobStore, RecordFilter, Result, StorageError};

/// Job store kept in process memory. Nothing survives the process.
#[derive(Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<RecordId, Record>>,
    artifacts: RwLock<HashMap<String, serde_json::Value>>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_record(
        &self,
        state_point: &StatePoint,
        document: Document,
    ) -> Result<(RecordId, bool)> {
        let id = state_point.id()?;
        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Ok((id, false));
        }
        records.insert(
            id.clone(),
            Record {
                id: id.clone(),
                state_point: state_point.clone(),
                document,
                version: 1,
            },
        );
        Ok((id, true))
    }

    async fn open_record(&self, id: &RecordId) -> Result<Option<Record>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_records(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        let records = self.records.read().await;
        let mut found: Vec<Record> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn count_records(&self, filter: &RecordFilter) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records.values().filter(|r| filter.matches(r)).count())
    }

    async fn update_document(
        &self,
        id: &RecordId,
        expected_version: u64,
        document: Document,
    ) -> Result<u64> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        if record.version != expected_version {
            return Err(StorageError::Conflict {
                id: id.clone(),
                expected: expected_version,
                actual: record.version,
            });
        }
        record.document = document;
        record.version += 1;
        Ok(record.version)
    }

    async fn delete_record(&self, id: &RecordId) -> Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn save_artifact(&self, name: &str, value: &serde_json::Value) -> Result<()> {
        self.artifacts
            .write()
            .await
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    async fn load_artifact(&self, name: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.artifacts.read().await.get(name).cloned())
    }
}
