use practice_core::model::{Progress, UserId};
use sqlx::Row;

use crate::repository::{StorageError, VersionedProgress};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("user_id overflow".into()))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    u64::try_from(v)
        .map(UserId::new)
        .map_err(|_| StorageError::Serialization("user_id sign overflow".into()))
}

pub(crate) fn version_to_i64(version: u64) -> Result<i64, StorageError> {
    i64::try_from(version).map_err(|_| StorageError::Serialization("version overflow".into()))
}

pub(crate) fn encode_progress(progress: &Progress) -> Result<String, StorageError> {
    serde_json::to_string(progress).map_err(ser)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<VersionedProgress, StorageError> {
    let document: String = row.try_get("document").map_err(ser)?;
    let progress: Progress = serde_json::from_str(&document).map_err(ser)?;

    let version_i64: i64 = row.try_get("version").map_err(ser)?;
    let version = u64::try_from(version_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid version: {version_i64}")))?;

    let user_id = user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?;
    if user_id != progress.user_id() {
        return Err(StorageError::Serialization(format!(
            "document for user {} stored under user {user_id}",
            progress.user_id()
        )));
    }

    Ok(VersionedProgress { progress, version })
}
