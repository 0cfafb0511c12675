use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AlarmKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum IconKind {
    #[default]
    Sun,
    MoonStar,
    Sparkles,
    Rainbow,
    Drop,
    Flame,
}

/// Local-only information the remote service does not keep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmMetadata {
    pub icon: IconKind,
    pub title: String,
    /// Reference instant for a countdown's nominal fire time. Restamped on reactivation.
    pub created_at: DateTime<Utc>,
}

impl AlarmMetadata {
    pub fn new(icon: IconKind, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            icon,
            title: title.into(),
            created_at,
        }
    }

    pub fn default_title(kind: AlarmKind) -> &'static str {
        match kind {
            AlarmKind::Alarm => "Alarm",
            AlarmKind::Timer => "Timer",
            AlarmKind::Custom => "Custom",
        }
    }

    /// Metadata for alarms this process did not create.
    pub fn default_for(kind: AlarmKind, now: DateTime<Utc>) -> Self {
        Self::new(IconKind::default(), Self::default_title(kind), now)
    }

    /// Same icon and title, stamped at `now`.
    pub fn restamped(&self, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            ..self.clone()
        }
    }
}
