use async_trait::async_trait;
use practice_core::model::{Progress, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A stored aggregate together with its write version.
///
/// The version starts at 1 when the aggregate is created and increases by one
/// on every successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedProgress {
    pub progress: Progress,
    pub version: u64,
}

/// Repository contract for per-user progress aggregates.
///
/// Saves are compare-and-swap on the version so a stale read-modify-write is
/// rejected instead of silently overwriting a concurrent one.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the aggregate for a user, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read or the stored
    /// document cannot be decoded.
    async fn get_progress(&self, user_id: UserId)
    -> Result<Option<VersionedProgress>, StorageError>;

    /// Persist the aggregate and return its new version.
    ///
    /// `expected_version = None` creates the aggregate; `Some(v)` replaces the
    /// one currently stored at version `v`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the aggregate already exists on
    /// create, or is missing or at another version on replace.
    async fn save_progress(
        &self,
        progress: &Progress,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError>;

    /// Remove the aggregate. Returns whether anything was deleted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure; a missing aggregate is not
    /// an error.
    async fn delete_progress(&self, user_id: UserId) -> Result<bool, StorageError>;

    /// Every user with a stored aggregate, ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_user_ids(&self) -> Result<Vec<UserId>, StorageError>;
}

/// Check a save against the currently stored version and compute the next one.
pub(crate) fn next_version(
    stored: Option<u64>,
    expected: Option<u64>,
) -> Result<u64, StorageError> {
    match (stored, expected) {
        (None, None) => Ok(1),
        (Some(current), Some(expected)) if current == expected => Ok(current + 1),
        _ => Err(StorageError::Conflict),
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<UserId, VersionedProgress>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
    ) -> Result<Option<VersionedProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&user_id).cloned())
    }

    async fn save_progress(
        &self,
        progress: &Progress,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let stored = guard.get(&progress.user_id()).map(|v| v.version);
        let version = next_version(stored, expected_version)?;
        guard.insert(
            progress.user_id(),
            VersionedProgress {
                progress: progress.clone(),
                version,
            },
        );
        Ok(version)
    }

    async fn delete_progress(&self, user_id: UserId) -> Result<bool, StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.remove(&user_id).is_some())
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut ids: Vec<UserId> = guard.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Progress repository behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::model::{DetectionMode, Pose, Session};
    use practice_core::time::fixed_now;

    fn progress_with_session(id: u64) -> Progress {
        let now = fixed_now();
        let mut progress = Progress::new(UserId::new(id), now);
        let session = Session::new(
            Pose::Warrior,
            now,
            now + chrono::Duration::seconds(15),
            12.0,
            91.0,
            1,
            DetectionMode::Local,
        )
        .unwrap();
        progress.add_session(session, now);
        progress
    }

    #[test]
    fn version_rules() {
        assert_eq!(next_version(None, None).unwrap(), 1);
        assert_eq!(next_version(Some(3), Some(3)).unwrap(), 4);
        assert!(matches!(next_version(Some(1), None), Err(StorageError::Conflict)));
        assert!(matches!(next_version(None, Some(1)), Err(StorageError::Conflict)));
        assert!(matches!(next_version(Some(2), Some(1)), Err(StorageError::Conflict)));
    }

    #[tokio::test]
    async fn round_trips_progress_with_versions() {
        let repo = InMemoryRepository::new();
        let progress = progress_with_session(1);

        assert_eq!(repo.save_progress(&progress, None).await.unwrap(), 1);
        let fetched = repo.get_progress(UserId::new(1)).await.unwrap().unwrap();
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.progress, progress);

        assert_eq!(repo.save_progress(&progress, Some(1)).await.unwrap(), 2);
        assert!(matches!(
            repo.save_progress(&progress, Some(1)).await,
            Err(StorageError::Conflict)
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let repo = InMemoryRepository::new();
        repo.save_progress(&progress_with_session(5), None)
            .await
            .unwrap();
        repo.save_progress(&progress_with_session(2), None)
            .await
            .unwrap();
        assert_eq!(
            repo.list_user_ids().await.unwrap(),
            vec![UserId::new(2), UserId::new(5)]
        );

        assert!(repo.delete_progress(UserId::new(5)).await.unwrap());
        assert!(!repo.delete_progress(UserId::new(5)).await.unwrap());
        assert!(repo.get_progress(UserId::new(5)).await.unwrap().is_none());
    }
}
