//! Read models returned to callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use practice_core::model::{Achievement, Pose, PoseStats, Progress, Session};
use practice_core::stats::{self, FavoritePose, PeriodStat, Suggestion};

/// Everything the stats screen needs, in one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub total_sessions: u32,
    pub total_time: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub average_accuracy: f64,
    pub total_perfect_poses: u32,
    pub longest_hold: f64,
    pub favorite_poses: Vec<FavoritePose>,
    pub achievements: Vec<Achievement>,
    pub pose_stats: PoseStats,
    pub last_session_date: Option<DateTime<Utc>>,
    pub weekly_stats: Vec<PeriodStat>,
    pub monthly_stats: Vec<PeriodStat>,
    pub suggestions: Vec<Suggestion>,
}

impl StatsView {
    #[must_use]
    pub fn from_progress(progress: &Progress) -> Self {
        let derived = progress.derived();
        Self {
            total_sessions: progress.total_sessions(),
            total_time: progress.total_time(),
            current_streak: progress.current_streak(),
            longest_streak: progress.longest_streak(),
            average_accuracy: derived.average_accuracy,
            total_perfect_poses: derived.total_perfect_poses,
            longest_hold: derived.longest_hold,
            favorite_poses: derived.favorite_poses.clone(),
            achievements: progress.achievements().to_vec(),
            pose_stats: progress.pose_stats().clone(),
            last_session_date: progress.last_session_date(),
            weekly_stats: stats::weekly_stats(progress.sessions()),
            monthly_stats: stats::monthly_stats(progress.sessions()),
            suggestions: stats::suggestions(progress),
        }
    }
}

/// Filter and paging for the session history read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub pose: Option<Pose>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: u32 = 20;

    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            pose: None,
            page,
            limit,
        }
    }

    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = Some(pose);
        self
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPage {
    pub sessions: Vec<Session>,
    pub total_sessions: usize,
    pub current_page: u32,
    pub total_pages: u32,
}

impl SessionPage {
    /// Newest-first page over `sessions`, optionally restricted to one pose.
    #[must_use]
    pub fn paginate(sessions: &[Session], query: HistoryQuery) -> Self {
        let page = query.page.max(1);
        let limit = query.limit.max(1);

        // Reverse first so equal start times list the later submission first.
        let mut matching: Vec<&Session> = sessions
            .iter()
            .rev()
            .filter(|s| query.pose.is_none_or(|pose| s.pose() == pose))
            .collect();
        matching.sort_by(|a, b| b.start_time().cmp(&a.start_time()));

        let total = matching.len();
        let per_page = limit as usize;
        let total_pages = u32::try_from(total.div_ceil(per_page)).unwrap_or(u32::MAX);
        let skip = (page as usize - 1).saturating_mul(per_page);

        Self {
            sessions: matching
                .into_iter()
                .skip(skip)
                .take(per_page)
                .cloned()
                .collect(),
            total_sessions: total,
            current_page: page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use practice_core::model::{DetectionMode, UserId};
    use practice_core::time::fixed_now;

    fn sessions() -> Vec<Session> {
        let t0 = fixed_now();
        (0..5)
            .map(|i| {
                let pose = if i % 2 == 0 { Pose::Tree } else { Pose::Dog };
                let start = t0 + Duration::minutes(i);
                Session::new(
                    pose,
                    start,
                    start + Duration::seconds(10),
                    f64::from(u32::try_from(i).unwrap()),
                    80.0,
                    0,
                    DetectionMode::Local,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn pages_newest_first() {
        let all = sessions();
        let page = SessionPage::paginate(&all, HistoryQuery::new(1, 2));
        assert_eq!(page.total_sessions, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 1);
        let holds: Vec<f64> = page.sessions.iter().map(Session::best_hold).collect();
        assert_eq!(holds, vec![4.0, 3.0]);

        let last = SessionPage::paginate(&all, HistoryQuery::new(3, 2));
        assert_eq!(last.sessions.len(), 1);
        assert!((last.sessions[0].best_hold() - 0.0).abs() < f64::EPSILON);

        let beyond = SessionPage::paginate(&all, HistoryQuery::new(9, 2));
        assert!(beyond.sessions.is_empty());
    }

    #[test]
    fn filters_by_pose_and_clamps_paging() {
        let all = sessions();
        let page = SessionPage::paginate(&all, HistoryQuery::new(0, 0).with_pose(Pose::Dog));
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_sessions, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.sessions.len(), 1);
        assert_eq!(page.sessions[0].pose(), Pose::Dog);
    }

    #[test]
    fn empty_history_has_no_pages() {
        let page = SessionPage::paginate(&[], HistoryQuery::default());
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.total_sessions, 0);
    }

    #[test]
    fn stats_view_serializes_camel_case() {
        let progress = Progress::new(UserId::new(1), fixed_now());
        let view = StatsView::from_progress(&progress);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["totalSessions"], 0);
        assert!(json["favoritePoses"].as_array().unwrap().is_empty());
        assert!(json.get("weeklyStats").is_some());
        assert_eq!(json["suggestions"][0]["kind"], "start_streak");
    }
}
