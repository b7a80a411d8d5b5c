use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::DetectionMode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("hold threshold must be between 80 and 99, got {0}")]
    InvalidThreshold(u32),

    #[error("tick interval must be > 0")]
    InvalidTickInterval,

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

/// Confidence (percent) at or above which the target pose counts as held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct HoldThreshold(u8);

impl HoldThreshold {
    pub const MIN: u8 = 80;
    pub const MAX: u8 = 99;
    pub const DEFAULT: u8 = 95;

    /// # Errors
    ///
    /// Returns `SettingsError::InvalidThreshold` outside `80..=99`.
    pub fn new(percent: u32) -> Result<Self, SettingsError> {
        match u8::try_from(percent) {
            Ok(p) if (Self::MIN..=Self::MAX).contains(&p) => Ok(Self(p)),
            _ => Err(SettingsError::InvalidThreshold(percent)),
        }
    }

    #[must_use]
    pub fn percent(self) -> f64 {
        f64::from(self.0)
    }
}

impl Default for HoldThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<u32> for HoldThreshold {
    type Error = SettingsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HoldThreshold> for u32 {
    fn from(value: HoldThreshold) -> Self {
        u32::from(value.0)
    }
}

/// Practice level presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Hold length (seconds) the level asks for.
    #[must_use]
    pub fn target_hold_secs(self) -> u32 {
        match self {
            Difficulty::Beginner => 10,
            Difficulty::Intermediate => 20,
            Difficulty::Advanced => 30,
        }
    }

    #[must_use]
    pub fn threshold(self) -> HoldThreshold {
        match self {
            Difficulty::Beginner => HoldThreshold(90),
            Difficulty::Intermediate => HoldThreshold(95),
            Difficulty::Advanced => HoldThreshold(97),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

impl FromStr for Difficulty {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            _ => Err(SettingsError::UnknownDifficulty(s.to_owned())),
        }
    }
}

/// Validated knobs for a practice attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PracticeSettings {
    difficulty: Difficulty,
    threshold: HoldThreshold,
    tick_interval_ms: u64,
    detection_mode: DetectionMode,
}

impl PracticeSettings {
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 400;

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn threshold(&self) -> HoldThreshold {
        self.threshold
    }

    #[must_use]
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    #[must_use]
    pub fn detection_mode(&self) -> DetectionMode {
        self.detection_mode
    }
}

impl Default for PracticeSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            threshold: HoldThreshold::default(),
            tick_interval_ms: Self::DEFAULT_TICK_INTERVAL_MS,
            detection_mode: DetectionMode::default(),
        }
    }
}

/// Unvalidated settings, typically assembled from env vars and flags.
#[derive(Clone, Debug, Default)]
pub struct PracticeSettingsDraft {
    pub difficulty: Option<Difficulty>,
    pub threshold: Option<u32>,
    pub tick_interval_ms: Option<u64>,
    pub detection_mode: Option<DetectionMode>,
}

impl PracticeSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft. An explicit threshold wins over the difficulty preset.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` for an out-of-range threshold or a zero interval.
    pub fn validate(self) -> Result<PracticeSettings, SettingsError> {
        let difficulty = self.difficulty.unwrap_or_default();
        let threshold = match self.threshold {
            Some(raw) => HoldThreshold::new(raw)?,
            None if self.difficulty.is_some() => difficulty.threshold(),
            None => HoldThreshold::default(),
        };
        let tick_interval_ms = self
            .tick_interval_ms
            .unwrap_or(PracticeSettings::DEFAULT_TICK_INTERVAL_MS);
        if tick_interval_ms == 0 {
            return Err(SettingsError::InvalidTickInterval);
        }

        Ok(PracticeSettings {
            difficulty,
            threshold,
            tick_interval_ms,
            detection_mode: self.detection_mode.unwrap_or_default(),
        })
    }
}
