//! Keeps a local view of alarms, timers and custom alarms in step with a
//! remote alarm scheduling service, and derives what each one should show.

pub mod alarms;
pub mod db;
pub mod error;
pub mod models;
pub mod presentation;
pub mod reconcile;
pub mod remote;
pub mod settings;
pub mod store;
mod utils;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use log::info;

pub use alarms::{AlarmBook, AlarmCoordinator, AlarmDraft, SyncController};
pub use db::Database;
pub use error::{AlarmError, Result, ServiceError};
pub use remote::{AlarmService, AlarmUpdate, AuthorizationState, MemoryAlarmService};
pub use settings::{AlarmSettings, SettingsStore};
pub use store::{AlarmStore, MemoryStore};

/// Initialise `env_logger` from `RUST_LOG`, defaulting to `info`.
/// Later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Everything an embedding application holds on to.
pub struct AlarmApp {
    pub db: Database,
    pub coordinator: AlarmCoordinator,
    settings: SettingsStore,
    sync: SyncController,
}

impl AlarmApp {
    /// Open local state under `data_dir`, reconcile with `service` and start
    /// following its updates.
    pub async fn start(data_dir: &Path, service: Arc<dyn AlarmService>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join("alarms.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;

        let coordinator =
            AlarmCoordinator::open(service, Arc::new(db.clone()), &settings.settings()).await?;

        let mut sync = SyncController::new();
        sync.start(coordinator.clone())?;

        info!("Alarm state ready in {}", data_dir.display());
        Ok(Self {
            db,
            settings,
            coordinator,
            sync,
        })
    }

    pub fn settings(&self) -> AlarmSettings {
        self.settings.settings()
    }

    /// Persist `settings` and apply them to the running coordinator.
    pub async fn update_settings(&self, settings: AlarmSettings) -> Result<()> {
        self.settings.update(settings.clone())?;
        self.coordinator.apply_settings(settings).await
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.sync.stop().await?;
        info!("Alarm sync stopped");
        Ok(())
    }
}
