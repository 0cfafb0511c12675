use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::models::IconKind;

pub const RECENT_LIMIT_ENV: &str = "ALARMSYNC_RECENT_LIMIT";

const DEFAULT_RECENT_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmSettings {
    /// Oldest recent entries are evicted beyond this many.
    pub recent_limit: usize,
    /// Icon given to alarms created without one.
    pub default_icon: IconKind,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            recent_limit: DEFAULT_RECENT_LIMIT,
            default_icon: IconKind::Sun,
        }
    }
}

impl AlarmSettings {
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(RECENT_LIMIT_ENV) {
            match value.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => self.recent_limit = limit,
                _ => warn!("Ignoring invalid {RECENT_LIMIT_ENV}={value}"),
            }
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AlarmSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Settings file {} unreadable ({err}), using defaults", path.display());
                AlarmSettings::default()
            })
        } else {
            AlarmSettings::default()
        };
        data.apply_env_overrides();

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, AlarmSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, AlarmSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn settings(&self) -> AlarmSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: AlarmSettings) -> Result<()> {
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &AlarmSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
