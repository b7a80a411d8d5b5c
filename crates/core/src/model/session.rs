use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Pose, SubmissionId};
use crate::stats::normalize_hold;
use crate::time::seconds_between;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("end time is before start time")]
    InvalidTimeRange,

    #[error("best hold must be a finite value >= 0, got {0}")]
    InvalidBestHold(f64),

    #[error("average accuracy must be within 0..=100, got {0}")]
    InvalidAccuracy(f64),
}

/// Where the per-frame confidence was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    #[default]
    Local,
    Server,
}

impl DetectionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMode::Local => "local",
            DetectionMode::Server => "server",
        }
    }
}

/// One completed practice attempt.
///
/// Immutable once built. `duration` is always derived from the two
/// timestamps and is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pose: Pose,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    #[serde(default)]
    best_hold: f64,
    #[serde(default)]
    average_accuracy: f64,
    #[serde(default)]
    perfect_holds: u32,
    #[serde(default)]
    detection_mode: DetectionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    submission_id: Option<SubmissionId>,
}

impl Session {
    /// Build a validated session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the time range is inverted, the hold is negative
    /// or non-finite, or the accuracy is outside `0..=100`.
    pub fn new(
        pose: Pose,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        best_hold: f64,
        average_accuracy: f64,
        perfect_holds: u32,
        detection_mode: DetectionMode,
    ) -> Result<Self, SessionError> {
        if end_time < start_time {
            return Err(SessionError::InvalidTimeRange);
        }
        if !best_hold.is_finite() || best_hold < 0.0 {
            return Err(SessionError::InvalidBestHold(best_hold));
        }
        if !(0.0..=100.0).contains(&average_accuracy) {
            return Err(SessionError::InvalidAccuracy(average_accuracy));
        }

        Ok(Self {
            pose,
            start_time,
            end_time,
            best_hold,
            average_accuracy,
            perfect_holds,
            detection_mode,
            submission_id: None,
        })
    }

    #[must_use]
    pub fn with_submission_id(mut self, id: SubmissionId) -> Self {
        self.submission_id = Some(id);
        self
    }

    #[must_use]
    pub fn pose(&self) -> Pose {
        self.pose
    }

    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Length of the attempt in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        seconds_between(self.start_time, self.end_time)
    }

    /// Best hold as submitted; may still be in milliseconds for legacy data.
    #[must_use]
    pub fn best_hold(&self) -> f64 {
        self.best_hold
    }

    #[must_use]
    pub fn average_accuracy(&self) -> f64 {
        self.average_accuracy
    }

    #[must_use]
    pub fn perfect_holds(&self) -> u32 {
        self.perfect_holds
    }

    #[must_use]
    pub fn detection_mode(&self) -> DetectionMode {
        self.detection_mode
    }

    #[must_use]
    pub fn submission_id(&self) -> Option<SubmissionId> {
        self.submission_id
    }

    /// Corrected copy for the batch repair path, or `None` if the stored hold is plausible.
    #[must_use]
    pub fn with_normalized_best_hold(&self) -> Option<Self> {
        let normalized = normalize_hold(self.best_hold);
        if normalized == self.best_hold {
            return None;
        }
        Some(Self {
            best_hold: normalized,
            ..self.clone()
        })
    }
}
