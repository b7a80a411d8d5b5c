use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use practice_core::achievements;
use practice_core::model::{
    Achievement, AchievementSubmission, Progress, Session, SessionApplied, SessionSubmission,
    UserId,
};
use storage::repository::{ProgressRepository, VersionedProgress};

use crate::Clock;
use crate::error::ProgressServiceError;
use crate::views::{HistoryQuery, SessionPage, StatsView};

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of submitting a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub progress: Progress,
    /// The submission id was already recorded; nothing changed.
    pub duplicate: bool,
    /// Achievements unlocked by this session.
    pub unlocked: Vec<Achievement>,
}

/// Result of submitting an achievement directly.
#[derive(Debug, Clone, PartialEq)]
pub struct AchievementOutcome {
    /// `false` when an achievement with the same id already existed.
    pub added: bool,
    pub progress: Progress,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Read-modify-write access to per-user progress aggregates.
///
/// Writes for one user are serialized through a per-user lock; different users
/// proceed in parallel. Each write mutates a copy and persists it with one
/// versioned save, so a failed save leaves the stored aggregate untouched.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    repo: Arc<dyn ProgressRepository>,
    locks: Arc<Mutex<HashMap<UserId, Arc<Mutex<()>>>>>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn ProgressRepository>) -> Self {
        Self {
            clock,
            repo,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    async fn user_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // An entry only the map references has no holder and no waiter.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(user_id).or_default())
    }

    async fn load_or_new(
        &self,
        user_id: UserId,
    ) -> Result<(Progress, Option<u64>), ProgressServiceError> {
        Ok(match self.load(user_id).await? {
            Some(VersionedProgress { progress, version }) => (progress, Some(version)),
            None => (Progress::new(user_id, self.clock.now()), None),
        })
    }

    /// Stored aggregate with derived fields recomputed, since documents
    /// written before unit correction may carry stale values.
    async fn load(
        &self,
        user_id: UserId,
    ) -> Result<Option<VersionedProgress>, ProgressServiceError> {
        let mut stored = self.repo.get_progress(user_id).await?;
        if let Some(stored) = stored.as_mut() {
            stored.progress.recalculate();
        }
        Ok(stored)
    }

    async fn save(
        &self,
        progress: &Progress,
        expected_version: Option<u64>,
    ) -> Result<u64, ProgressServiceError> {
        self.repo
            .save_progress(progress, expected_version)
            .await
            .map_err(|err| {
                let err = ProgressServiceError::from(err);
                if err.is_transient() {
                    warn!(user_id = %progress.user_id(), "progress write conflict");
                }
                err
            })
    }

    /// Load the user's aggregate, creating and persisting an empty one on first access.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure or a concurrent create.
    pub async fn get_progress(&self, user_id: UserId) -> Result<Progress, ProgressServiceError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let (progress, version) = self.load_or_new(user_id).await?;
        if version.is_none() {
            self.save(&progress, None).await?;
            debug!(user_id = %user_id, "created empty progress");
        }
        Ok(progress)
    }

    /// Validate an inbound submission and fold it into the aggregate.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Validation` before touching storage when
    /// the submission is malformed; otherwise see [`Self::record_session`].
    pub async fn add_session(
        &self,
        user_id: UserId,
        submission: &SessionSubmission,
    ) -> Result<SessionOutcome, ProgressServiceError> {
        let session = submission.validate()?;
        self.record_session(user_id, session).await
    }

    /// Append a finished session, refresh stats and unlock achievements.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Conflict` when another writer saved first
    /// and `ProgressServiceError::Storage` when the backend fails.
    pub async fn record_session(
        &self,
        user_id: UserId,
        session: Session,
    ) -> Result<SessionOutcome, ProgressServiceError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let pose = session.pose();
        let (mut progress, version) = self.load_or_new(user_id).await?;

        if progress.add_session(session, now) == SessionApplied::Duplicate {
            debug!(user_id = %user_id, "duplicate session submission ignored");
            return Ok(SessionOutcome {
                progress,
                duplicate: true,
                unlocked: Vec::new(),
            });
        }

        let unlocked = achievements::unlock_new(&mut progress, now);
        self.save(&progress, version).await?;

        info!(
            user_id = %user_id,
            pose = %pose,
            total_sessions = progress.total_sessions(),
            current_streak = progress.current_streak(),
            "session recorded"
        );
        for achievement in &unlocked {
            info!(user_id = %user_id, achievement = achievement.id(), "achievement unlocked");
        }

        Ok(SessionOutcome {
            progress,
            duplicate: false,
            unlocked,
        })
    }

    /// Store a manually submitted achievement unless its id is already unlocked.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Validation` for blank fields, or a
    /// storage/conflict error from the save.
    pub async fn add_achievement(
        &self,
        user_id: UserId,
        submission: &AchievementSubmission,
    ) -> Result<AchievementOutcome, ProgressServiceError> {
        let now = self.clock.now();
        let achievement = submission.validate(now)?;

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let (mut progress, version) = self.load_or_new(user_id).await?;
        let id = achievement.id().to_owned();
        let added = progress.add_achievement(achievement);
        if added {
            self.save(&progress, version).await?;
            info!(user_id = %user_id, achievement = %id, "achievement added");
        } else {
            debug!(user_id = %user_id, achievement = %id, "achievement already exists");
        }

        Ok(AchievementOutcome { added, progress })
    }

    /// Stats snapshot. A user without an aggregate gets the zero view and
    /// nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the aggregate cannot be read.
    pub async fn stats(&self, user_id: UserId) -> Result<StatsView, ProgressServiceError> {
        let progress = match self.load(user_id).await? {
            Some(stored) => stored.progress,
            None => Progress::new(user_id, self.clock.now()),
        };
        Ok(StatsView::from_progress(&progress))
    }

    /// One page of the user's session history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the aggregate cannot be read.
    pub async fn history(
        &self,
        user_id: UserId,
        query: HistoryQuery,
    ) -> Result<SessionPage, ProgressServiceError> {
        let sessions = self
            .repo
            .get_progress(user_id)
            .await?
            .map(|stored| stored.progress.sessions().to_vec())
            .unwrap_or_default();
        Ok(SessionPage::paginate(&sessions, query))
    }

    /// Delete the user's aggregate. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failure.
    pub async fn clear(&self, user_id: UserId) -> Result<bool, ProgressServiceError> {
        let lock = self.user_lock(user_id).await;
        let deleted = {
            let _guard = lock.lock().await;
            self.repo.delete_progress(user_id).await?
        };
        drop(lock);

        let mut locks = self.locks.lock().await;
        if locks.get(&user_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&user_id);
        }
        drop(locks);

        if deleted {
            info!(user_id = %user_id, "progress cleared");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::model::{DetectionMode, Pose};
    use practice_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn service() -> ProgressService {
        ProgressService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    fn submission(pose: &str, best_hold: f64) -> SessionSubmission {
        let start = fixed_now();
        SessionSubmission {
            pose: pose.to_owned(),
            start_time: start.to_rfc3339(),
            end_time: (start + chrono::Duration::seconds(20)).to_rfc3339(),
            best_hold,
            average_accuracy: 98.0,
            perfect_holds: 2,
            detection_mode: Some("local".to_owned()),
            submission_id: None,
        }
    }

    #[tokio::test]
    async fn get_progress_creates_lazily() {
        let svc = service();
        let user = UserId::new(1);
        assert!(svc.repo.get_progress(user).await.unwrap().is_none());

        let progress = svc.get_progress(user).await.unwrap();
        assert_eq!(progress.total_sessions(), 0);
        assert_eq!(svc.repo.get_progress(user).await.unwrap().unwrap().version, 1);

        // Second access reads the stored aggregate instead of recreating it.
        svc.get_progress(user).await.unwrap();
        assert_eq!(svc.repo.get_progress(user).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn add_session_unlocks_achievements_once() {
        let svc = service();
        let user = UserId::new(2);

        let first = svc.add_session(user, &submission("Tree", 31.0)).await.unwrap();
        assert!(!first.duplicate);
        let ids: Vec<&str> = first.unlocked.iter().map(Achievement::id).collect();
        assert_eq!(ids, vec!["first_perfect", "time_master", "accuracy_expert"]);

        let second = svc.add_session(user, &submission("Tree", 5.0)).await.unwrap();
        assert!(second.unlocked.is_empty());
        assert_eq!(second.progress.total_sessions(), 2);
        assert_eq!(second.progress.achievements().len(), 3);
    }

    #[tokio::test]
    async fn invalid_submission_leaves_storage_untouched() {
        let svc = service();
        let user = UserId::new(3);

        let err = svc
            .add_session(user, &submission("Lotus", 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::Validation(_)));
        assert!(svc.repo.get_progress(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_for_unknown_user_is_zero_and_not_persisted() {
        let svc = service();
        let user = UserId::new(4);
        let view = svc.stats(user).await.unwrap();
        assert_eq!(view.total_sessions, 0);
        assert!(view.favorite_poses.is_empty());
        assert!(svc.repo.get_progress(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_achievement_reports_already_exists() {
        let svc = service();
        let user = UserId::new(5);
        let sub = AchievementSubmission {
            achievement_id: "custom_badge".into(),
            title: "Custom".into(),
            description: "Awarded by a coach".into(),
        };

        assert!(svc.add_achievement(user, &sub).await.unwrap().added);
        let again = svc.add_achievement(user, &sub).await.unwrap();
        assert!(!again.added);
        assert_eq!(again.progress.achievements().len(), 1);
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let svc = service();
        let user = UserId::new(6);
        let session = Session::new(
            Pose::Cobra,
            fixed_now(),
            fixed_now(),
            0.0,
            50.0,
            0,
            DetectionMode::Server,
        )
        .unwrap();
        svc.record_session(user, session).await.unwrap();

        assert!(svc.clear(user).await.unwrap());
        assert!(!svc.clear(user).await.unwrap());
        assert_eq!(svc.stats(user).await.unwrap().total_sessions, 0);
    }

    #[tokio::test]
    async fn stats_recompute_stale_derived_fields() {
        let repo = Arc::new(InMemoryRepository::new());
        let svc = ProgressService::new(fixed_clock(), repo.clone());
        let user = UserId::new(7);
        let legacy: Progress = serde_json::from_value(serde_json::json!({
            "userId": 7,
            "totalSessions": 1,
            "poseStats": { "Tree": { "attempts": 1, "bestHold": 12000.0, "averageAccuracy": 80.0 } },
            "longestHold": 12000.0,
            "averageAccuracy": 0.0,
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        repo.save_progress(&legacy, None).await.unwrap();

        let view = svc.stats(user).await.unwrap();
        assert!((view.longest_hold - 12.0).abs() < 1e-9);
        assert!((view.average_accuracy - 80.0).abs() < 1e-9);
        assert_eq!(view.favorite_poses.len(), 1);
        assert_eq!(view.favorite_poses[0].pose, Pose::Tree);
        assert_eq!(view.favorite_poses[0].count, 1);

        let progress = svc.get_progress(user).await.unwrap();
        assert!((progress.derived().longest_hold - 12.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn idle_user_locks_are_released() {
        let svc = service();
        for id in 10..14 {
            svc.add_session(UserId::new(id), &submission("Dog", 4.0))
                .await
                .unwrap();
        }
        svc.clear(UserId::new(10)).await.unwrap();
        assert!(svc.locks.lock().await.is_empty());
    }
}
