//! Durable storage for the running and recent collections.
//!
//! Collections are always written whole; there is no delta persistence.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::AlarmRecord;

pub const RUNNING_KEY: &str = "alarms.running";
pub const RECENT_KEY: &str = "alarms.recent";

/// Implementations:
/// - [`crate::db::Database`]: SQLite key/blob rows
/// - [`MemoryStore`]: in-memory, for tests
#[async_trait]
pub trait AlarmStore: Send + Sync + 'static {
    async fn load_running(&self) -> Result<Vec<AlarmRecord>>;

    async fn save_running(&self, records: &[AlarmRecord]) -> Result<()>;

    async fn load_recent(&self) -> Result<Vec<AlarmRecord>>;

    async fn save_recent(&self, records: &[AlarmRecord]) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    running: Mutex<Vec<AlarmRecord>>,
    recent: Mutex<Vec<AlarmRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(running: Vec<AlarmRecord>, recent: Vec<AlarmRecord>) -> Self {
        Self {
            running: Mutex::new(running),
            recent: Mutex::new(recent),
        }
    }
}

fn read(slot: &Mutex<Vec<AlarmRecord>>) -> Result<Vec<AlarmRecord>> {
    slot.lock()
        .map(|guard| guard.clone())
        .map_err(|_| anyhow!("memory store lock poisoned"))
}

fn write(slot: &Mutex<Vec<AlarmRecord>>, records: &[AlarmRecord]) -> Result<()> {
    let mut guard = slot
        .lock()
        .map_err(|_| anyhow!("memory store lock poisoned"))?;
    *guard = records.to_vec();
    Ok(())
}

#[async_trait]
impl AlarmStore for MemoryStore {
    async fn load_running(&self) -> Result<Vec<AlarmRecord>> {
        read(&self.running)
    }

    async fn save_running(&self, records: &[AlarmRecord]) -> Result<()> {
        write(&self.running, records)
    }

    async fn load_recent(&self) -> Result<Vec<AlarmRecord>> {
        read(&self.recent)
    }

    async fn save_recent(&self, records: &[AlarmRecord]) -> Result<()> {
        write(&self.recent, records)
    }
}
