//! Closed catalog of milestones and the pure evaluation over a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Achievement, Progress};

const STREAK_WEEK: u32 = 7;
const STREAK_MONTH: u32 = 30;
const LONG_HOLD_SECS: f64 = 30.0;
const DEDICATED_SESSIONS: u32 = 100;
const EXPERT_ACCURACY: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    FirstPerfect,
    PoseMaster,
    Streak7,
    TimeMaster,
    Dedicated,
    ConsistencyKing,
    AccuracyExpert,
}

impl AchievementKind {
    pub const ALL: [AchievementKind; 7] = [
        AchievementKind::FirstPerfect,
        AchievementKind::PoseMaster,
        AchievementKind::Streak7,
        AchievementKind::TimeMaster,
        AchievementKind::Dedicated,
        AchievementKind::ConsistencyKing,
        AchievementKind::AccuracyExpert,
    ];

    /// Stable id stored on unlocked achievements.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            AchievementKind::FirstPerfect => "first_perfect",
            AchievementKind::PoseMaster => "pose_master",
            AchievementKind::Streak7 => "streak_7",
            AchievementKind::TimeMaster => "time_master",
            AchievementKind::Dedicated => "dedicated",
            AchievementKind::ConsistencyKing => "consistency_king",
            AchievementKind::AccuracyExpert => "accuracy_expert",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            AchievementKind::FirstPerfect => "First Perfect Pose",
            AchievementKind::PoseMaster => "Pose Master",
            AchievementKind::Streak7 => "7-Day Warrior",
            AchievementKind::TimeMaster => "Time Master",
            AchievementKind::Dedicated => "Dedicated Practitioner",
            AchievementKind::ConsistencyKing => "Consistency King",
            AchievementKind::AccuracyExpert => "Accuracy Expert",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            AchievementKind::FirstPerfect => "Achieved your first perfect pose",
            AchievementKind::PoseMaster => "Perfected every pose at least once",
            AchievementKind::Streak7 => "Practiced for 7 days in a row",
            AchievementKind::TimeMaster => "Held a pose for 30 seconds",
            AchievementKind::Dedicated => "Completed 100 practice sessions",
            AchievementKind::ConsistencyKing => "Practiced for 30 days in a row",
            AchievementKind::AccuracyExpert => "Reached 95% average accuracy",
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    #[must_use]
    pub fn is_satisfied(self, progress: &Progress) -> bool {
        let derived = progress.derived();
        match self {
            AchievementKind::FirstPerfect => derived.total_perfect_poses > 0,
            AchievementKind::PoseMaster => progress
                .pose_stats()
                .iter()
                .all(|(_, stat)| stat.perfect_holds > 0),
            AchievementKind::Streak7 => progress.current_streak() >= STREAK_WEEK,
            AchievementKind::TimeMaster => derived.longest_hold >= LONG_HOLD_SECS,
            AchievementKind::Dedicated => progress.total_sessions() >= DEDICATED_SESSIONS,
            AchievementKind::ConsistencyKing => progress.current_streak() >= STREAK_MONTH,
            AchievementKind::AccuracyExpert => derived.average_accuracy >= EXPERT_ACCURACY,
        }
    }

    #[must_use]
    pub fn to_achievement(self, unlocked_at: DateTime<Utc>) -> Achievement {
        Achievement::new(self.id(), self.title(), self.description(), unlocked_at)
    }
}

/// Catalog entries whose predicate holds and that are not yet unlocked.
///
/// Re-running on the same snapshot after applying the result yields nothing.
#[must_use]
pub fn evaluate(progress: &Progress) -> Vec<AchievementKind> {
    AchievementKind::ALL
        .into_iter()
        .filter(|kind| !progress.has_achievement(kind.id()))
        .filter(|kind| kind.is_satisfied(progress))
        .collect()
}

/// Evaluate and unlock in one step; returns what was newly stored.
pub fn unlock_new(progress: &mut Progress, at: DateTime<Utc>) -> Vec<Achievement> {
    let mut unlocked = Vec::new();
    for kind in evaluate(progress) {
        let achievement = kind.to_achievement(at);
        if progress.add_achievement(achievement.clone()) {
            unlocked.push(achievement);
        }
    }
    unlocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DetectionMode, Pose, Session, UserId};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn session(pose: Pose, start: DateTime<Utc>, hold: f64, acc: f64, perfect: u32) -> Session {
        Session::new(
            pose,
            start,
            start + Duration::seconds(30),
            hold,
            acc,
            perfect,
            DetectionMode::Local,
        )
        .unwrap()
    }

    #[test]
    fn ids_round_trip_through_catalog() {
        for kind in AchievementKind::ALL {
            assert_eq!(AchievementKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(AchievementKind::from_id("unknown"), None);
    }

    #[test]
    fn empty_progress_unlocks_nothing() {
        let progress = Progress::new(UserId::new(1), fixed_now());
        assert!(evaluate(&progress).is_empty());
    }

    #[test]
    fn first_session_unlocks_matching_predicates() {
        let t0 = fixed_now();
        let mut progress = Progress::new(UserId::new(1), t0);
        progress.add_session(session(Pose::Tree, t0, 31.0, 98.0, 2), t0);

        let kinds = evaluate(&progress);
        assert_eq!(
            kinds,
            vec![
                AchievementKind::FirstPerfect,
                AchievementKind::TimeMaster,
                AchievementKind::AccuracyExpert,
            ]
        );
    }

    #[test]
    fn unlocking_is_idempotent() {
        let t0 = fixed_now();
        let mut progress = Progress::new(UserId::new(1), t0);
        progress.add_session(session(Pose::Tree, t0, 5.0, 60.0, 1), t0);

        let first = unlock_new(&mut progress, t0);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id(), "first_perfect");

        assert!(evaluate(&progress).is_empty());
        assert!(unlock_new(&mut progress, t0 + Duration::hours(1)).is_empty());
        assert_eq!(progress.achievements().len(), 1);
    }

    #[test]
    fn pose_master_needs_every_pose() {
        let t0 = fixed_now();
        let mut progress = Progress::new(UserId::new(1), t0);
        for pose in &Pose::ALL[..Pose::COUNT - 1] {
            progress.add_session(session(*pose, t0, 5.0, 60.0, 1), t0);
        }
        assert!(!AchievementKind::PoseMaster.is_satisfied(&progress));

        progress.add_session(session(Pose::Triangle, t0, 5.0, 60.0, 1), t0);
        assert!(AchievementKind::PoseMaster.is_satisfied(&progress));
    }

    #[test]
    fn week_streak_unlocks_on_seventh_day() {
        let mut now = fixed_now();
        let mut progress = Progress::new(UserId::new(1), now);
        for _ in 0..6 {
            progress.add_session(session(Pose::Dog, now, 5.0, 60.0, 0), now);
            now += Duration::days(1);
        }
        assert!(!AchievementKind::Streak7.is_satisfied(&progress));

        progress.add_session(session(Pose::Dog, now, 5.0, 60.0, 0), now);
        assert!(evaluate(&progress).contains(&AchievementKind::Streak7));
    }
}
