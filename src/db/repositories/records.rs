use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::{
    db::Database,
    models::AlarmRecord,
    store::{AlarmStore, RECENT_KEY, RUNNING_KEY},
};

impl Database {
    /// Raw blob stored under `key`, if any.
    pub async fn get_value(&self, key: &'static str) -> Result<Option<String>> {
        self.execute(move |conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read {key}"))
        })
        .await
    }

    pub async fn set_value(&self, key: &'static str, value: String) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write {key}"))?;
            Ok(())
        })
        .await
    }

    async fn load_records(&self, key: &'static str) -> Result<Vec<AlarmRecord>> {
        match self.get_value(key).await? {
            Some(json) => serde_json::from_str(&json)
                .with_context(|| format!("failed to decode records stored under {key}")),
            None => Ok(Vec::new()),
        }
    }

    async fn save_records(&self, key: &'static str, records: &[AlarmRecord]) -> Result<()> {
        let json = serde_json::to_string(records)
            .with_context(|| format!("failed to encode records for {key}"))?;
        self.set_value(key, json).await
    }
}

#[async_trait]
impl AlarmStore for Database {
    async fn load_running(&self) -> Result<Vec<AlarmRecord>> {
        self.load_records(RUNNING_KEY).await
    }

    async fn save_running(&self, records: &[AlarmRecord]) -> Result<()> {
        self.save_records(RUNNING_KEY, records).await
    }

    async fn load_recent(&self) -> Result<Vec<AlarmRecord>> {
        self.load_records(RECENT_KEY).await
    }

    async fn save_recent(&self, records: &[AlarmRecord]) -> Result<()> {
        self.save_records(RECENT_KEY, records).await
    }
}
