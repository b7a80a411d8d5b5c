//! One JSON document per user in a local directory.
//!
//! This is the offline adapter: the same aggregate and versioning rules as
//! the SQLite store, persisted as `progress-<user>.json` files.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use practice_core::model::{Progress, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::repository::{
    ProgressRepository, Storage, StorageError, VersionedProgress, next_version,
};

const FILE_PREFIX: &str = "progress-";
const FILE_SUFFIX: &str = ".json";

#[derive(Serialize, Deserialize)]
struct StoredDocument {
    version: u64,
    progress: Progress,
}

#[derive(Clone)]
pub struct LocalFileRepository {
    root: PathBuf,
    // Serializes compare-and-write within this process.
    write_lock: Arc<Mutex<()>>,
}

fn io_err(e: std::io::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

impl LocalFileRepository {
    /// Open (and create if needed) the directory holding progress documents.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(io_err)?;
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn path_for(&self, user_id: UserId) -> PathBuf {
        self.root
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", user_id.value()))
    }

    async fn read_document(&self, user_id: UserId) -> Result<Option<StoredDocument>, StorageError> {
        match tokio::fs::read(self.path_for(user_id)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(ser),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }
}

fn parse_user_file(name: &str) -> Option<UserId> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse::<u64>()
        .ok()
        .map(UserId::new)
}

#[async_trait]
impl ProgressRepository for LocalFileRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
    ) -> Result<Option<VersionedProgress>, StorageError> {
        Ok(self
            .read_document(user_id)
            .await?
            .map(|doc| VersionedProgress {
                progress: doc.progress,
                version: doc.version,
            }))
    }

    async fn save_progress(
        &self,
        progress: &Progress,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        let _guard = self.write_lock.lock().await;

        let user_id = progress.user_id();
        let stored = self.read_document(user_id).await?.map(|doc| doc.version);
        let version = next_version(stored, expected_version)?;

        let bytes = serde_json::to_vec_pretty(&StoredDocument {
            version,
            progress: progress.clone(),
        })
        .map_err(ser)?;

        // Write beside the target and rename so readers never see a torn file.
        let path = self.path_for(user_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(version)
    }

    async fn delete_progress(&self, user_id: UserId) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(user_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(io_err)?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            if let Some(id) = entry.file_name().to_str().and_then(parse_user_file) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl Storage {
    /// Build a `Storage` backed by JSON files under `root`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the directory cannot be created.
    pub async fn local(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let repo = LocalFileRepository::open(root).await?;
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Ok(Self { progress })
    }
}
