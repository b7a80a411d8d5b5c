use thiserror::Error;

use crate::model::{PoseParseError, SessionError, SettingsError, ValidationError};
use crate::recorder::RecorderError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Pose(#[from] PoseParseError),
}
