//! JSON file job store.
//!
//! Each record lives in its own directory under `records/<id>/` holding the
//! state-point and a versioned document envelope. Named artifacts live under
//! `artifacts/`. Files are replaced through a uniquely named temporary file
//! and a rename so a reader never sees a half-written document.
//!
//! Writes hold an advisory lock on `store.lock` for the whole
//! read-check-write, so several processes may share one store directory
//! and compare-and-swap still holds across them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use genflow_core::{Document, Record, RecordId, StatePoint};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::{JobStore, RecordFilter, Result, StorageError};

const STATE_POINT_FILE: &str = "statepoint.json";
const DOCUMENT_FILE: &str = "document.json";
const LOCK_FILE: &str = "store.lock";

/// Document plus its version marker, stored as one file.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u64,
    updated_at: genflow_core::Time,
    document: Document,
}

impl Envelope {
    fn new(version: u64, document: Document) -> Self {
        Self {
            version,
            updated_at: chrono::Utc::now(),
            document,
        }
    }
}

/// File-based JSON job store.
pub struct JsonJobStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonJobStore {
    /// Open (or create) a store rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("records")).await?;
        fs::create_dir_all(root.join("artifacts")).await?;

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    async fn read_record(&self, dir: &Path) -> Result<Option<Record>> {
        let Some(state_point) = read_json::<StatePoint>(&dir.join(STATE_POINT_FILE)).await? else {
            return Ok(None);
        };
        let Some(envelope) = read_json::<Envelope>(&dir.join(DOCUMENT_FILE)).await? else {
            return Ok(None);
        };
        Ok(Some(Record {
            id: state_point.id()?,
            state_point,
            document: envelope.document,
            version: envelope.version,
        }))
    }

    /// Run `write` under the store's write lock.
    ///
    /// The mutex orders writers sharing this handle; the file lock orders
    /// every other handle on the same directory, in this process or another.
    async fn exclusive<T, F>(&self, write: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(root.join(LOCK_FILE))?;
            let mut lock = fd_lock::RwLock::new(file);
            let _held = lock.write()?;
            write(&root)
        })
        .await
        .map_err(|e| StorageError::Other(format!("Store writer failed: {}", e)))?
    }
}

fn record_dir(root: &Path, id: &RecordId) -> PathBuf {
    root.join("records").join(id.as_str())
}

fn artifact_path(root: &Path, name: &str) -> PathBuf {
    root.join("artifacts").join(format!("{}.json", name))
}

#[async_trait]
impl JobStore for JsonJobStore {
    async fn create_record(
        &self,
        state_point: &StatePoint,
        document: Document,
    ) -> Result<(RecordId, bool)> {
        let id = state_point.id()?;
        let dir = record_dir(&self.root, &id);
        let state_point = state_point.clone();

        let created = self
            .exclusive(move |_| {
                if dir.join(DOCUMENT_FILE).try_exists()? {
                    return Ok(false);
                }
                std::fs::create_dir_all(&dir)?;
                write_json(&dir.join(STATE_POINT_FILE), &state_point)?;
                // The document is written last; its presence marks the record complete.
                write_json(&dir.join(DOCUMENT_FILE), &Envelope::new(1, document))?;
                Ok(true)
            })
            .await?;

        if created {
            debug!("Created record {}", id);
        }
        Ok((id, created))
    }

    async fn open_record(&self, id: &RecordId) -> Result<Option<Record>> {
        self.read_record(&record_dir(&self.root, id)).await
    }

    async fn find_records(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut rd = fs::read_dir(self.root.join("records")).await?;
        while let Some(entry) = rd.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(record) = self.read_record(&entry.path()).await? {
                if filter.matches(&record) {
                    records.push(record);
                }
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn update_document(
        &self,
        id: &RecordId,
        expected_version: u64,
        document: Document,
    ) -> Result<u64> {
        let id = id.clone();
        let path = record_dir(&self.root, &id).join(DOCUMENT_FILE);

        self.exclusive(move |_| {
            let Some(current) = read_json_blocking::<Envelope>(&path)? else {
                return Err(StorageError::NotFound(id.to_string()));
            };
            if current.version != expected_version {
                return Err(StorageError::Conflict {
                    id,
                    expected: expected_version,
                    actual: current.version,
                });
            }

            let version = current.version + 1;
            write_json(&path, &Envelope::new(version, document))?;
            Ok(version)
        })
        .await
    }

    async fn delete_record(&self, id: &RecordId) -> Result<bool> {
        let dir = record_dir(&self.root, id);
        self.exclusive(move |_| match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn save_artifact(&self, name: &str, value: &serde_json::Value) -> Result<()> {
        let value = value.clone();
        self.exclusive({
            let name = name.to_string();
            move |root| write_json(&artifact_path(root, &name), &value)
        })
        .await
    }

    async fn load_artifact(&self, name: &str) -> Result<Option<serde_json::Value>> {
        read_json(&artifact_path(&self.root, name)).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_json_blocking<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replace `path` through a temporary file unique to this write.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    std::fs::write(&tmp, json.as_bytes())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use genflow_core::{fields, CandidateDocument};
    use tokio::task::JoinSet;

    async fn store() -> (tempfile::TempDir, JsonJobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonJobStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_is_deduplicated() {
        let (_dir, store) = store().await;
        let sp = StatePoint::candidate("AB", "AA", 7);
        let doc = CandidateDocument::in_generation(0).to_document().unwrap();

        let (id, created) = store.create_record(&sp, doc.clone()).await.unwrap();
        assert!(created);
        let (again, created) = store.create_record(&sp, Document::new()).await.unwrap();
        assert!(!created);
        assert_eq!(id, again);

        let record = store.open_record(&id).await.unwrap().unwrap();
        assert_eq!(record.document, doc);
        assert_eq!(record.version, 1);
        assert_eq!(store.find_records(&RecordFilter::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_document_compare_and_swap() {
        let (_dir, store) = store().await;
        let sp = StatePoint::candidate("AB", "AA", 7);
        let (id, _) = store.create_record(&sp, Document::new()).await.unwrap();

        let doc = CandidateDocument { cost: Some(1), ..Default::default() }.to_document().unwrap();
        let version = store.update_document(&id, 1, doc.clone()).await.unwrap();
        assert_eq!(version, 2);

        let err = store.update_document(&id, 1, Document::new()).await.unwrap_err();
        assert!(err.is_conflict());

        let record = store.find_record(&sp).await.unwrap().unwrap();
        assert_eq!(record.document, doc);
    }

    #[tokio::test]
    async fn test_find_and_delete() {
        let (_dir, store) = store().await;
        for (i, code) in ["AA", "AC", "BB"].iter().enumerate() {
            let doc = CandidateDocument::in_generation(i as u64).to_document().unwrap();
            store.create_record(&StatePoint::candidate("AB", *code, 7), doc).await.unwrap();
        }
        store.create_record(&StatePoint::master("AB", 7), Document::new()).await.unwrap();

        let stale = RecordFilter::candidates().lt(fields::GENERATION_INDEX, 2);
        let found = store.find_records(&stale).await.unwrap();
        assert_eq!(found.len(), 2);

        for record in &found {
            assert!(store.delete_record(&record.id).await.unwrap());
        }
        assert!(!store.delete_record(&found[0].id).await.unwrap());
        assert_eq!(store.count_records(&RecordFilter::all()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_artifacts() {
        let (_dir, store) = store().await;
        assert!(store.load_artifact("ranking-0").await.unwrap().is_none());
        let value = serde_json::json!([{"rank": 0}]);
        store.save_artifact("ranking-0", &value).await.unwrap();
        assert_eq!(store.load_artifact("ranking-0").await.unwrap(), Some(value));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_handles_on_one_directory_share_compare_and_swap() {
        let dir = tempfile::tempdir().unwrap();
        let a = Arc::new(JsonJobStore::new(dir.path()).await.unwrap());
        let b = Arc::new(JsonJobStore::new(dir.path()).await.unwrap());
        let (id, _) = a.create_record(&StatePoint::master("AB", 7), Document::new()).await.unwrap();

        let mut writers = JoinSet::new();
        for store in [a.clone(), b.clone(), a.clone(), b.clone()] {
            let id = id.clone();
            writers.spawn(async move {
                let mut wins = 0;
                while wins < 10 {
                    let record = store.open_record(&id).await.unwrap().unwrap();
                    match store.update_document(&id, record.version, record.document).await {
                        Ok(_) => wins += 1,
                        Err(e) if e.is_conflict() => {}
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
                wins
            });
        }
        let mut total = 0;
        while let Some(wins) = writers.join_next().await {
            total += wins.unwrap();
        }

        // No swap was lost: each success moved the version exactly once.
        assert_eq!(total, 40);
        assert_eq!(b.open_record(&id).await.unwrap().unwrap().version, 41);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_handles_on_one_directory_create_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = JsonJobStore::new(dir.path()).await.unwrap();
        let b = JsonJobStore::new(dir.path()).await.unwrap();
        let sp = StatePoint::candidate("AB", "AA", 7);

        let (first, second) = tokio::join!(
            a.create_record(&sp, Document::new()),
            b.create_record(&sp, Document::new())
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.0, second.0);
        assert!(first.1 ^ second.1);
        assert_eq!(a.open_record(&first.0).await.unwrap().unwrap().version, 1);
    }
}
