use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use practice_core::model::UserId;
use storage::repository::ProgressRepository;

use crate::Clock;
use crate::error::ProgressServiceError;

/// One stored hold value rewritten by a repair pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairedValue {
    pub user_id: UserId,
    pub field: String,
    pub original: f64,
    pub corrected: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub scanned: usize,
    pub updated: usize,
    pub corrections: Vec<RepairedValue>,
}

/// Batch fix for hold values persisted in milliseconds.
///
/// Not part of the request path; run it offline against the whole store.
#[derive(Clone)]
pub struct RepairService {
    clock: Clock,
    repo: Arc<dyn ProgressRepository>,
}

impl RepairService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn ProgressRepository>) -> Self {
        Self { clock, repo }
    }

    /// Scan every aggregate and normalize hold values above the millisecond threshold.
    ///
    /// An aggregate that changes underneath the scan is skipped with a warning;
    /// running the repair again picks it up.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if listing, reading or writing fails.
    pub async fn run(&self) -> Result<RepairReport, ProgressServiceError> {
        let mut report = RepairReport::default();

        for user_id in self.repo.list_user_ids().await? {
            let Some(stored) = self.repo.get_progress(user_id).await? else {
                continue;
            };
            report.scanned += 1;

            let mut progress = stored.progress;
            let corrections = progress.repair_hold_units();
            if corrections.is_empty() {
                continue;
            }
            progress.touch(self.clock.now());

            match self
                .repo
                .save_progress(&progress, Some(stored.version))
                .await
                .map_err(ProgressServiceError::from)
            {
                Ok(_) => {}
                Err(ProgressServiceError::Conflict) => {
                    warn!(user_id = %user_id, "aggregate changed during repair; skipped");
                    continue;
                }
                Err(err) => return Err(err),
            }

            report.updated += 1;
            for correction in corrections {
                info!(
                    user_id = %user_id,
                    field = %correction.field,
                    original = correction.original,
                    corrected = correction.corrected,
                    "hold value repaired"
                );
                report.corrections.push(RepairedValue {
                    user_id,
                    field: correction.field.to_string(),
                    original: correction.original,
                    corrected: correction.corrected,
                });
            }
        }

        info!(
            scanned = report.scanned,
            updated = report.updated,
            corrections = report.corrections.len(),
            "repair finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::model::{DetectionMode, Pose, Progress, Session};
    use practice_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn repairs_only_legacy_aggregates() {
        let repo = Arc::new(InMemoryRepository::new());
        let now = fixed_now();

        let legacy: Progress = serde_json::from_value(serde_json::json!({
            "userId": 1,
            "totalSessions": 1,
            "poseStats": { "Tree": { "attempts": 1, "bestHold": 12000.0 } },
            "longestHold": 12000.0,
            "createdAt": now,
            "updatedAt": now
        }))
        .unwrap();
        repo.save_progress(&legacy, None).await.unwrap();

        let mut clean = Progress::new(UserId::new(2), now);
        let session =
            Session::new(Pose::Dog, now, now, 8.0, 90.0, 0, DetectionMode::Local).unwrap();
        clean.add_session(session, now);
        repo.save_progress(&clean, None).await.unwrap();

        let svc = RepairService::new(fixed_clock(), repo.clone());
        let report = svc.run().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.corrections.len(), 2);
        assert_eq!(report.corrections[0].field, "longestHold");
        assert_eq!(report.corrections[1].field, "poseStats.Tree.bestHold");

        let fixed = repo.get_progress(UserId::new(1)).await.unwrap().unwrap();
        assert_eq!(fixed.version, 2);
        assert!((fixed.progress.derived().longest_hold - 12.0).abs() < 1e-9);

        let again = svc.run().await.unwrap();
        assert_eq!(again.updated, 0);
        assert!(again.corrections.is_empty());
    }
}
