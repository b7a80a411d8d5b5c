//! Accumulates one practice attempt into a finished `Session`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{DetectionMode, Pose, Session, SessionError};

/// Accuracy at or above which a sustained hold earns perfect-hold credit.
pub const PERFECT_ACCURACY: f64 = 97.0;

/// Minimum continuous hold before credit starts accruing.
pub const PERFECT_MIN_HOLD_SECS: f64 = 1.0;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum RecorderError {
    #[error("recorder stopped without being started")]
    NotStarted,
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone)]
struct Attempt {
    pose: Pose,
    started_at: DateTime<Utc>,
    detection_mode: DetectionMode,
    best_hold: f64,
    accuracy_sum: f64,
    accuracy_count: u32,
    // Credit is counted in tenths so the rounding at stop is exact.
    perfect_tenths: u64,
}

/// Running aggregates for the attempt in progress, if any.
#[derive(Debug, Clone, Default)]
pub struct SessionRecorder {
    attempt: Option<Attempt>,
}

impl SessionRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new attempt, discarding any unfinished one.
    pub fn start(&mut self, pose: Pose, now: DateTime<Utc>, detection_mode: DetectionMode) {
        self.attempt = Some(Attempt {
            pose,
            started_at: now,
            detection_mode,
            best_hold: 0.0,
            accuracy_sum: 0.0,
            accuracy_count: 0,
            perfect_tenths: 0,
        });
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.attempt.is_some()
    }

    #[must_use]
    pub fn pose(&self) -> Option<Pose> {
        self.attempt.as_ref().map(|a| a.pose)
    }

    /// Fold one timer tick into the running aggregates. Ignored when idle.
    pub fn observe(&mut self, hold_secs: f64, accuracy: f64) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        if !hold_secs.is_finite() || !accuracy.is_finite() {
            return;
        }

        attempt.best_hold = attempt.best_hold.max(hold_secs);
        attempt.accuracy_sum += accuracy;
        attempt.accuracy_count += 1;

        if accuracy >= PERFECT_ACCURACY && hold_secs >= PERFECT_MIN_HOLD_SECS {
            attempt.perfect_tenths += 1;
        }
    }

    /// Best hold so far in the current attempt.
    #[must_use]
    pub fn best_hold(&self) -> f64 {
        self.attempt.as_ref().map_or(0.0, |a| a.best_hold)
    }

    /// Finalize the attempt and return the session.
    ///
    /// # Errors
    ///
    /// `RecorderError::NotStarted` when no attempt is in progress. A clock
    /// that went backwards surfaces as `RecorderError::Session`.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<Session, RecorderError> {
        let attempt = self.attempt.take().ok_or(RecorderError::NotStarted)?;

        let average_accuracy = if attempt.accuracy_count == 0 {
            0.0
        } else {
            attempt.accuracy_sum / f64::from(attempt.accuracy_count)
        };
        // Half-up rounding of tenths to whole holds.
        let perfect_holds = u32::try_from((attempt.perfect_tenths + 5) / 10).unwrap_or(u32::MAX);

        let session = Session::new(
            attempt.pose,
            attempt.started_at,
            now,
            attempt.best_hold,
            average_accuracy.clamp(0.0, 100.0),
            perfect_holds,
            attempt.detection_mode,
        )?;
        Ok(session)
    }
}
