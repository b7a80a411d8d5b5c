use practice_core::model::{Progress, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    encode_progress, map_progress_row, user_id_from_i64, user_id_to_i64, version_to_i64,
};
use crate::repository::{ProgressRepository, StorageError, VersionedProgress};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
    ) -> Result<Option<VersionedProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, version, document
            FROM progress WHERE user_id = ?1
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn save_progress(
        &self,
        progress: &Progress,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        let user_id = user_id_to_i64(progress.user_id())?;
        let document = encode_progress(progress)?;
        let updated_at = progress.updated_at();

        let (result, version) = match expected_version {
            None => {
                let res = sqlx::query(
                    r"
                    INSERT INTO progress (user_id, version, document, updated_at)
                    VALUES (?1, 1, ?2, ?3)
                    ON CONFLICT(user_id) DO NOTHING
                    ",
                )
                .bind(user_id)
                .bind(document)
                .bind(updated_at)
                .execute(&self.pool)
                .await
                .map_err(conn)?;
                (res, 1)
            }
            Some(expected) => {
                let next = expected + 1;
                let res = sqlx::query(
                    r"
                    UPDATE progress
                    SET version = ?1, document = ?2, updated_at = ?3
                    WHERE user_id = ?4 AND version = ?5
                    ",
                )
                .bind(version_to_i64(next)?)
                .bind(document)
                .bind(updated_at)
                .bind(user_id)
                .bind(version_to_i64(expected)?)
                .execute(&self.pool)
                .await
                .map_err(conn)?;
                (res, next)
            }
        };

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(version)
    }

    async fn delete_progress(&self, user_id: UserId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM progress WHERE user_id = ?1")
            .bind(user_id_to_i64(user_id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>, StorageError> {
        let rows = sqlx::query("SELECT user_id FROM progress ORDER BY user_id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: i64 = row
                .try_get("user_id")
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            ids.push(user_id_from_i64(raw)?);
        }
        Ok(ids)
    }
}
