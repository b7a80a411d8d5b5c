use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Achievement, DetectionMode, Pose, Session, SessionError, SubmissionId};

/// Rejection of an inbound submission. Nothing is mutated when this is returned.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("unknown pose: {0}")]
    UnknownPose(String),

    #[error("{field} is not an ISO-8601 timestamp: {raw}")]
    InvalidTimestamp { field: &'static str, raw: String },

    #[error("perfectHolds must be a non-negative integer, got {0}")]
    InvalidPerfectHolds(i64),

    #[error("unknown detection mode: {0}")]
    UnknownDetectionMode(String),

    #[error("invalid submission id: {0}")]
    InvalidSubmissionId(String),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Wire shape of a session submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSubmission {
    pub pose: String,
    pub start_time: String,
    pub end_time: String,
    pub best_hold: f64,
    pub average_accuracy: f64,
    pub perfect_holds: i64,
    #[serde(default)]
    pub detection_mode: Option<String>,
    #[serde(default)]
    pub submission_id: Option<String>,
}

impl SessionSubmission {
    /// Submission for an already-built session, as a client adapter would send it.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            pose: session.pose().to_string(),
            start_time: session.start_time().to_rfc3339(),
            end_time: session.end_time().to_rfc3339(),
            best_hold: session.best_hold(),
            average_accuracy: session.average_accuracy(),
            perfect_holds: i64::from(session.perfect_holds()),
            detection_mode: Some(session.detection_mode().as_str().to_owned()),
            submission_id: session.submission_id().map(|id| id.to_string()),
        }
    }

    /// Validate every field and build the immutable `Session`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` on the first malformed or out-of-range field.
    pub fn validate(&self) -> Result<Session, ValidationError> {
        let pose: Pose = self
            .pose
            .parse()
            .map_err(|_| ValidationError::UnknownPose(self.pose.clone()))?;
        let start = parse_timestamp("startTime", &self.start_time)?;
        let end = parse_timestamp("endTime", &self.end_time)?;
        let perfect_holds = u32::try_from(self.perfect_holds)
            .map_err(|_| ValidationError::InvalidPerfectHolds(self.perfect_holds))?;
        let mode = match self.detection_mode.as_deref().map(str::trim) {
            None | Some("local") => DetectionMode::Local,
            Some("server") => DetectionMode::Server,
            Some(other) => return Err(ValidationError::UnknownDetectionMode(other.to_owned())),
        };

        let session = Session::new(
            pose,
            start,
            end,
            self.best_hold,
            self.average_accuracy,
            perfect_holds,
            mode,
        )?;

        match self.submission_id.as_deref() {
            None => Ok(session),
            Some(raw) => {
                let id: SubmissionId = raw
                    .parse()
                    .map_err(|_| ValidationError::InvalidSubmissionId(raw.to_owned()))?;
                Ok(session.with_submission_id(id))
            }
        }
    }
}

/// ISO-8601 without an offset, read as UTC.
const LOCAL_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(t.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(trimmed, LOCAL_DATE_TIME)
        .or_else(|_| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .map_err(|_| ValidationError::InvalidTimestamp {
            field,
            raw: raw.to_owned(),
        })?;
    Ok(naive.and_utc())
}

/// Wire shape of a manually submitted achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementSubmission {
    pub achievement_id: String,
    pub title: String,
    pub description: String,
}

impl AchievementSubmission {
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyField` if any field is blank.
    pub fn validate(&self, unlocked_at: DateTime<Utc>) -> Result<Achievement, ValidationError> {
        let id = non_empty("achievementId", &self.achievement_id)?;
        let title = non_empty("title", &self.title)?;
        let description = non_empty("description", &self.description)?;
        Ok(Achievement::new(id, title, description, unlocked_at))
    }
}

fn non_empty<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed)
}
