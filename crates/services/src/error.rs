//! Shared error types for the services crate.

use thiserror::Error;

use practice_core::model::ValidationError;
use practice_core::recorder::RecorderError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService` and `RepairService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Another writer updated the aggregate first. Re-submitting is safe.
    #[error("progress was modified concurrently; retry the submission")]
    Conflict,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ProgressServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::Conflict,
            other => Self::Storage(other),
        }
    }
}

impl ProgressServiceError {
    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Errors emitted by the practice loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("practice attempt was never started")]
    NotStarted,
    #[error("practice loop ended without producing a session")]
    Aborted,
    #[error(transparent)]
    Recorder(RecorderError),
}

impl From<RecorderError> for PracticeError {
    fn from(err: RecorderError) -> Self {
        match err {
            RecorderError::NotStarted => Self::NotStarted,
            other => Self::Recorder(other),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
