mod achievement;
mod ids;
mod pose;
mod pose_stat;
mod progress;
mod session;
mod settings;
mod submission;

pub use achievement::Achievement;
pub use ids::{ParseIdError, SubmissionId, UserId};
pub use pose::{Pose, PoseParseError};
pub use pose_stat::{PoseStat, PoseStats};
pub use progress::{HoldCorrection, HoldField, Progress, SessionApplied};
pub use session::{DetectionMode, Session, SessionError};
pub use settings::{
    Difficulty, HoldThreshold, PracticeSettings, PracticeSettingsDraft, SettingsError,
};
pub use submission::{AchievementSubmission, SessionSubmission, ValidationError};
