use chrono::{DateTime, Utc};

use practice_core::hold_timer::{Frame, HoldTimer, Tick};
use practice_core::model::{Pose, PracticeSettings, Session};
use practice_core::recorder::SessionRecorder;

use crate::error::PracticeError;

/// One attempt at one pose: a hold timer wired into a session recorder.
///
/// Owns all per-attempt state, so concurrent attempts never share anything.
#[derive(Debug, Clone)]
pub struct PracticeAttempt {
    timer: HoldTimer,
    recorder: SessionRecorder,
}

impl PracticeAttempt {
    #[must_use]
    pub fn start(pose: Pose, settings: &PracticeSettings, now: DateTime<Utc>) -> Self {
        let mut recorder = SessionRecorder::new();
        recorder.start(pose, now, settings.detection_mode());
        Self {
            timer: HoldTimer::new(settings.threshold()),
            recorder,
        }
    }

    /// Feed one frame through the timer and record usable readings.
    pub fn observe(&mut self, frame: &Frame) -> Tick {
        let tick = self.timer.observe(frame);
        if let Tick::Reading(reading) = &tick {
            self.recorder.observe(reading.hold_secs, reading.confidence);
        }
        tick
    }

    #[must_use]
    pub fn pose(&self) -> Option<Pose> {
        self.recorder.pose()
    }

    #[must_use]
    pub fn best_hold(&self) -> f64 {
        self.timer.best_hold()
    }

    #[must_use]
    pub fn is_holding(&self) -> bool {
        self.timer.is_holding()
    }

    /// Stop recording and produce the session.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::NotStarted` if the attempt was already finished.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<Session, PracticeError> {
        Ok(self.recorder.stop(now)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use practice_core::time::fixed_now;

    #[test]
    fn readings_flow_into_the_session() {
        let t0 = fixed_now();
        let mut attempt = PracticeAttempt::start(Pose::Warrior, &PracticeSettings::default(), t0);

        for (i, confidence) in [96.0, 97.0, 98.0, 94.0, 99.0].into_iter().enumerate() {
            let at = t0 + Duration::seconds(i64::try_from(i).unwrap());
            attempt.observe(&Frame::new(at, confidence));
        }
        attempt.observe(&Frame::empty(t0 + Duration::seconds(5)));

        let session = attempt.finish(t0 + Duration::seconds(6)).unwrap();
        assert_eq!(session.pose(), Pose::Warrior);
        assert!((session.best_hold() - 2.0).abs() < f64::EPSILON);
        assert!((session.average_accuracy() - 96.8).abs() < 1e-9);
        assert!((session.duration() - 6.0).abs() < f64::EPSILON);

        assert!(matches!(
            attempt.finish(t0 + Duration::seconds(7)),
            Err(PracticeError::NotStarted)
        ));
    }
}
