use serde::{Deserialize, Serialize};

use crate::model::{Pose, Session};
use crate::stats::normalize_hold;

/// Per-pose running statistics for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoseStat {
    pub attempts: u32,
    /// Seconds; never decreases across sessions.
    pub best_hold: f64,
    pub perfect_holds: u32,
    /// Running mean of session accuracies, weighted by attempt.
    pub average_accuracy: f64,
    /// Cumulative seconds.
    pub total_time: f64,
}

impl PoseStat {
    /// Fold one session into the running statistics.
    pub fn record(&mut self, session: &Session) {
        self.attempts = self.attempts.saturating_add(1);
        self.best_hold = self.best_hold.max(normalize_hold(session.best_hold()));
        self.perfect_holds = self.perfect_holds.saturating_add(session.perfect_holds());
        self.total_time += session.duration();

        let previous = f64::from(self.attempts - 1);
        self.average_accuracy = (self.average_accuracy * previous + session.average_accuracy())
            / f64::from(self.attempts);
    }
}

/// One `PoseStat` per pose; every pose is always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PoseStats {
    tree: PoseStat,
    chair: PoseStat,
    cobra: PoseStat,
    warrior: PoseStat,
    dog: PoseStat,
    shoulderstand: PoseStat,
    triangle: PoseStat,
}

impl PoseStats {
    #[must_use]
    pub fn get(&self, pose: Pose) -> &PoseStat {
        match pose {
            Pose::Tree => &self.tree,
            Pose::Chair => &self.chair,
            Pose::Cobra => &self.cobra,
            Pose::Warrior => &self.warrior,
            Pose::Dog => &self.dog,
            Pose::Shoulderstand => &self.shoulderstand,
            Pose::Triangle => &self.triangle,
        }
    }

    pub fn get_mut(&mut self, pose: Pose) -> &mut PoseStat {
        match pose {
            Pose::Tree => &mut self.tree,
            Pose::Chair => &mut self.chair,
            Pose::Cobra => &mut self.cobra,
            Pose::Warrior => &mut self.warrior,
            Pose::Dog => &mut self.dog,
            Pose::Shoulderstand => &mut self.shoulderstand,
            Pose::Triangle => &mut self.triangle,
        }
    }

    /// Iterate in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (Pose, &PoseStat)> {
        Pose::ALL.into_iter().map(move |pose| (pose, self.get(pose)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DetectionMode;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn session(accuracy: f64, best_hold: f64) -> Session {
        let start = fixed_now();
        Session::new(
            Pose::Warrior,
            start,
            start + Duration::seconds(10),
            best_hold,
            accuracy,
            1,
            DetectionMode::Local,
        )
        .unwrap()
    }

    #[test]
    fn weighted_accuracy_over_two_attempts() {
        let mut stat = PoseStat::default();
        stat.record(&session(80.0, 5.0));
        stat.record(&session(100.0, 3.0));

        assert_eq!(stat.attempts, 2);
        assert!((stat.average_accuracy - 90.0).abs() < 1e-9);
        assert!((stat.best_hold - 5.0).abs() < f64::EPSILON);
        assert_eq!(stat.perfect_holds, 2);
        assert!((stat.total_time - 20.0).abs() < 1e-9);
    }

    #[test]
    fn best_hold_is_normalized_before_comparison() {
        let mut stat = PoseStat::default();
        stat.record(&session(90.0, 12.0));
        stat.record(&session(90.0, 1200.0));
        assert!((stat.best_hold - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn legacy_documents_fill_missing_poses() {
        let stats: PoseStats =
            serde_json::from_str(r#"{"Tree":{"attempts":3,"bestHold":9.5}}"#).unwrap();
        assert_eq!(stats.get(Pose::Tree).attempts, 3);
        assert_eq!(stats.get(Pose::Triangle), &PoseStat::default());
        assert_eq!(stats.iter().count(), Pose::COUNT);
    }
}
