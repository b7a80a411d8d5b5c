use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Achievement, Pose, PoseStat, PoseStats, Session, UserId};
use crate::stats::{self, DerivedStats, normalize_hold};
use crate::streak::next_streak;

/// Result of folding a session into the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionApplied {
    Applied,
    /// A session with the same submission id is already in the history.
    Duplicate,
}

/// Which stored value a repair pass corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldField {
    LongestHold,
    PoseBestHold(Pose),
    SessionBestHold { index: usize },
}

impl fmt::Display for HoldField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldField::LongestHold => f.write_str("longestHold"),
            HoldField::PoseBestHold(pose) => write!(f, "poseStats.{pose}.bestHold"),
            HoldField::SessionBestHold { index } => write!(f, "sessions[{index}].bestHold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldCorrection {
    pub field: HoldField,
    pub original: f64,
    pub corrected: f64,
}

/// Per-user aggregate: totals, per-pose stats, streak, achievements, history.
///
/// Derived fields (`DerivedStats`) are a pure function of the pose stats and
/// are refreshed by `recalculate` after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    user_id: UserId,
    #[serde(default)]
    total_sessions: u32,
    #[serde(default)]
    total_time: f64,
    #[serde(default)]
    current_streak: u32,
    #[serde(default)]
    longest_streak: u32,
    #[serde(default)]
    last_session_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pose_stats: PoseStats,
    #[serde(default)]
    achievements: Vec<Achievement>,
    #[serde(default)]
    sessions: Vec<Session>,
    #[serde(flatten)]
    derived: DerivedStats,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Progress {
    /// Zero-valued aggregate for a user with no history.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            total_sessions: 0,
            total_time: 0.0,
            current_streak: 0,
            longest_streak: 0,
            last_session_date: None,
            pose_stats: PoseStats::default(),
            achievements: Vec::new(),
            sessions: Vec::new(),
            derived: DerivedStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a finished session and refresh totals, pose stats, streak and
    /// derived stats. `now` drives the streak calendar.
    pub fn add_session(&mut self, session: Session, now: DateTime<Utc>) -> SessionApplied {
        if let Some(id) = session.submission_id() {
            if self.sessions.iter().any(|s| s.submission_id() == Some(id)) {
                return SessionApplied::Duplicate;
            }
        }

        self.total_sessions = self.total_sessions.saturating_add(1);
        self.total_time += session.duration();
        self.pose_stats.get_mut(session.pose()).record(&session);
        self.sessions.push(session);

        self.update_streak(now);
        self.recalculate();
        self.updated_at = now;
        SessionApplied::Applied
    }

    /// Advance the calendar-day streak for a session completed at `now`.
    pub fn update_streak(&mut self, now: DateTime<Utc>) {
        let last = self.last_session_date.map(|d| d.date_naive());
        self.current_streak = next_streak(self.current_streak, last, now.date_naive());
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_session_date = Some(now);
    }

    /// Recompute every derived field from the pose stats. Safe to repeat.
    pub fn recalculate(&mut self) {
        self.derived = stats::project(&self.pose_stats);
    }

    /// Store an unlocked achievement unless one with the same id exists.
    ///
    /// Returns `true` when the achievement was appended.
    pub fn add_achievement(&mut self, achievement: Achievement) -> bool {
        if self.has_achievement(achievement.id()) {
            return false;
        }
        self.updated_at = self.updated_at.max(achievement.unlocked_at());
        self.achievements.push(achievement);
        true
    }

    #[must_use]
    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.iter().any(|a| a.id() == id)
    }

    /// Re-apply hold normalization to every stored hold above the
    /// millisecond threshold, then recalculate if anything changed.
    pub fn repair_hold_units(&mut self) -> Vec<HoldCorrection> {
        let mut corrections = Vec::new();

        if self.derived.longest_hold > stats::MILLISECOND_THRESHOLD_SECS {
            let corrected = normalize_hold(self.derived.longest_hold);
            corrections.push(HoldCorrection {
                field: HoldField::LongestHold,
                original: self.derived.longest_hold,
                corrected,
            });
            self.derived.longest_hold = corrected;
        }

        for pose in Pose::ALL {
            let stat = self.pose_stats.get_mut(pose);
            if stat.best_hold > stats::MILLISECOND_THRESHOLD_SECS {
                let corrected = normalize_hold(stat.best_hold);
                corrections.push(HoldCorrection {
                    field: HoldField::PoseBestHold(pose),
                    original: stat.best_hold,
                    corrected,
                });
                stat.best_hold = corrected;
            }
        }

        for (index, session) in self.sessions.iter_mut().enumerate() {
            if session.best_hold() <= stats::MILLISECOND_THRESHOLD_SECS {
                continue;
            }
            if let Some(fixed) = session.with_normalized_best_hold() {
                corrections.push(HoldCorrection {
                    field: HoldField::SessionBestHold { index },
                    original: session.best_hold(),
                    corrected: fixed.best_hold(),
                });
                *session = fixed;
            }
        }

        if !corrections.is_empty() {
            self.recalculate();
        }
        corrections
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn total_sessions(&self) -> u32 {
        self.total_sessions
    }

    #[must_use]
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    #[must_use]
    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    #[must_use]
    pub fn longest_streak(&self) -> u32 {
        self.longest_streak
    }

    #[must_use]
    pub fn last_session_date(&self) -> Option<DateTime<Utc>> {
        self.last_session_date
    }

    #[must_use]
    pub fn pose_stats(&self) -> &PoseStats {
        &self.pose_stats
    }

    #[must_use]
    pub fn pose_stat(&self, pose: Pose) -> &PoseStat {
        self.pose_stats.get(pose)
    }

    #[must_use]
    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    #[must_use]
    pub fn derived(&self) -> &DerivedStats {
        &self.derived
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
