#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod practice;
pub mod progress_service;
pub mod repair_service;
pub mod views;

pub use practice_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, PracticeError, ProgressServiceError};
pub use practice::{FrameSource, PracticeAttempt, PracticeHandle, PracticeLoop, ScriptedFrames};
pub use progress_service::{AchievementOutcome, ProgressService, SessionOutcome};
pub use repair_service::{RepairReport, RepairService, RepairedValue};
pub use views::{HistoryQuery, SessionPage, StatsView};
