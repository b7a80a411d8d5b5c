use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An unlocked milestone. Entries are append-only once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    achievement_id: String,
    unlocked_at: DateTime<Utc>,
    title: String,
    description: String,
}

impl Achievement {
    #[must_use]
    pub fn new(
        achievement_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        unlocked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            achievement_id: achievement_id.into(),
            unlocked_at,
            title: title.into(),
            description: description.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.achievement_id
    }

    #[must_use]
    pub fn unlocked_at(&self) -> DateTime<Utc> {
        self.unlocked_at
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}
