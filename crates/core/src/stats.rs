//! Derived, read-only statistics.
//!
//! Everything here is a pure function of the per-pose statistics and the
//! session history, so it can be recomputed at any time with the same result.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{Pose, PoseStats, Progress, Session};

/// Hold values above this many seconds are assumed to be milliseconds.
pub const MILLISECOND_THRESHOLD_SECS: f64 = 300.0;

/// Upper bound for a single hold after unit correction.
pub const MAX_HOLD_SECS: f64 = 600.0;

const FAVORITE_POSES: usize = 3;

/// Correct a hold value that may have been recorded in milliseconds.
///
/// Values above five minutes are divided by 1000, then clamped to ten minutes.
/// Negative and non-finite inputs collapse to 0.
#[must_use]
pub fn normalize_hold(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    let seconds = if value > MILLISECOND_THRESHOLD_SECS {
        value / 1000.0
    } else {
        value
    };
    seconds.min(MAX_HOLD_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritePose {
    pub pose: Pose,
    pub count: u32,
}

/// Fields of `Progress` that are recomputed by `project`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DerivedStats {
    pub average_accuracy: f64,
    pub total_perfect_poses: u32,
    pub longest_hold: f64,
    pub favorite_poses: Vec<FavoritePose>,
}

/// Recompute every derived field from the per-pose statistics.
#[must_use]
pub fn project(pose_stats: &PoseStats) -> DerivedStats {
    let mut total_perfect_poses = 0_u32;
    let mut longest_hold = 0.0_f64;
    let mut weighted_accuracy = 0.0_f64;
    let mut total_attempts = 0_u32;

    for (_, stat) in pose_stats.iter() {
        total_perfect_poses = total_perfect_poses.saturating_add(stat.perfect_holds);
        // Stored values may predate unit correction.
        longest_hold = longest_hold.max(normalize_hold(stat.best_hold));
        weighted_accuracy += stat.average_accuracy * f64::from(stat.attempts);
        total_attempts = total_attempts.saturating_add(stat.attempts);
    }

    let average_accuracy = if total_attempts > 0 {
        weighted_accuracy / f64::from(total_attempts)
    } else {
        0.0
    };

    DerivedStats {
        average_accuracy,
        total_perfect_poses,
        longest_hold,
        favorite_poses: favorite_poses(pose_stats),
    }
}

/// Top poses by attempts, descending; ties keep enumeration order.
#[must_use]
pub fn favorite_poses(pose_stats: &PoseStats) -> Vec<FavoritePose> {
    let mut ranked: Vec<FavoritePose> = pose_stats
        .iter()
        .filter(|(_, stat)| stat.attempts > 0)
        .map(|(pose, stat)| FavoritePose {
            pose,
            count: stat.attempts,
        })
        .collect();
    // `sort_by` is stable, which preserves enumeration order on ties.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(FAVORITE_POSES);
    ranked
}

//
// ─── PERIOD STATS ──────────────────────────────────────────────────────────────
//

/// Sessions grouped into a calendar week or month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStat {
    /// `YYYY-MM-DD` of the Sunday starting the week, or `YYYY-MM`.
    pub period: String,
    pub sessions: u32,
    pub total_time: f64,
    pub average_accuracy: f64,
}

#[must_use]
pub fn week_key(date: NaiveDate) -> String {
    let offset = i64::from(date.weekday().num_days_from_sunday());
    (date - Duration::days(offset)).format("%Y-%m-%d").to_string()
}

#[must_use]
pub fn month_key(date: NaiveDate) -> String {
    format!("{}-{:02}", date.year(), date.month())
}

#[must_use]
pub fn weekly_stats(sessions: &[Session]) -> Vec<PeriodStat> {
    group_sessions(sessions, week_key)
}

#[must_use]
pub fn monthly_stats(sessions: &[Session]) -> Vec<PeriodStat> {
    group_sessions(sessions, month_key)
}

fn group_sessions(sessions: &[Session], key: fn(NaiveDate) -> String) -> Vec<PeriodStat> {
    let mut buckets: BTreeMap<String, (u32, f64, f64)> = BTreeMap::new();
    for session in sessions {
        let entry = buckets
            .entry(key(session.start_time().date_naive()))
            .or_insert((0, 0.0, 0.0));
        entry.0 = entry.0.saturating_add(1);
        entry.1 += session.duration();
        entry.2 += session.average_accuracy();
    }

    buckets
        .into_iter()
        .map(|(period, (count, total_time, accuracy_sum))| PeriodStat {
            period,
            sessions: count,
            total_time,
            average_accuracy: accuracy_sum / f64::from(count.max(1)),
        })
        .collect()
}

//
// ─── SUGGESTIONS ───────────────────────────────────────────────────────────────
//

const STREAK_GOAL_DAYS: u32 = 7;
const FORM_ACCURACY_FLOOR: f64 = 90.0;
const HOLD_GOAL_SECS: f64 = 20.0;
const UNTRIED_POSES_SHOWN: usize = 2;

/// Coaching hint derived from a progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suggestion {
    StartStreak,
    ExtendStreak { days_left: u32 },
    FocusOnForm,
    HoldLonger,
    TryPoses { poses: Vec<Pose> },
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suggestion::StartStreak => write!(f, "Start a daily practice streak!"),
            Suggestion::ExtendStreak { days_left } => write!(
                f,
                "Keep going! You're {days_left} days away from a {STREAK_GOAL_DAYS}-day streak."
            ),
            Suggestion::FocusOnForm => {
                write!(f, "Focus on form and accuracy to improve your poses.")
            }
            Suggestion::HoldLonger => write!(
                f,
                "Try to hold poses longer for better strength and stability."
            ),
            Suggestion::TryPoses { poses } => {
                let names: Vec<&str> = poses.iter().map(|p| p.as_str()).collect();
                write!(f, "Try new poses: {}", names.join(", "))
            }
        }
    }
}

#[must_use]
pub fn suggestions(progress: &Progress) -> Vec<Suggestion> {
    let mut out = Vec::new();
    let streak = progress.current_streak();

    if streak == 0 {
        out.push(Suggestion::StartStreak);
    } else if streak < STREAK_GOAL_DAYS {
        out.push(Suggestion::ExtendStreak {
            days_left: STREAK_GOAL_DAYS - streak,
        });
    }

    let derived = progress.derived();
    if derived.average_accuracy < FORM_ACCURACY_FLOOR {
        out.push(Suggestion::FocusOnForm);
    }
    if derived.longest_hold < HOLD_GOAL_SECS {
        out.push(Suggestion::HoldLonger);
    }

    let untried: Vec<Pose> = progress
        .pose_stats()
        .iter()
        .filter(|(_, stat)| stat.attempts == 0)
        .map(|(pose, _)| pose)
        .take(UNTRIED_POSES_SHOWN)
        .collect();
    if !untried.is_empty() {
        out.push(Suggestion::TryPoses { poses: untried });
    }

    out
}
