use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::presentation::{derive, PresentationState};

use super::{
    AlarmKind, AlarmMetadata, AlarmStatus, AlarmTime, CountdownDuration, IconKind, RemoteAlarm,
    Schedule, Weekday,
};

/// Durable local record: the remote snapshot, local metadata and the derived
/// presentation state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRecord {
    remote: RemoteAlarm,
    metadata: AlarmMetadata,
    #[serde(default)]
    presentation: PresentationState,
}

impl AlarmRecord {
    /// Record for a live alarm whose history is unknown.
    pub fn new(remote: RemoteAlarm, metadata: AlarmMetadata, now: DateTime<Utc>) -> Self {
        let presentation = derive(&PresentationState::None, None, &remote, &metadata, now);
        Self {
            remote,
            metadata,
            presentation,
        }
    }

    /// Inactive record kept in the recent list.
    pub fn archived(remote: RemoteAlarm, metadata: AlarmMetadata) -> Self {
        Self {
            remote,
            metadata,
            presentation: PresentationState::None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.remote.id
    }

    pub fn kind(&self) -> AlarmKind {
        self.remote.kind()
    }

    pub fn remote(&self) -> &RemoteAlarm {
        &self.remote
    }

    pub fn metadata(&self) -> &AlarmMetadata {
        &self.metadata
    }

    pub fn presentation(&self) -> &PresentationState {
        &self.presentation
    }

    pub fn status(&self) -> AlarmStatus {
        self.remote.status
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.remote.schedule.as_ref()
    }

    pub fn countdown_duration(&self) -> Option<&CountdownDuration> {
        self.remote.countdown_duration.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn icon(&self) -> IconKind {
        self.metadata.icon
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.metadata.created_at
    }

    pub fn is_one_shot(&self) -> bool {
        self.remote.is_one_shot()
    }

    pub fn is_fixed_date(&self) -> bool {
        self.remote.is_fixed_date()
    }

    pub fn scheduled_time(&self) -> Option<AlarmTime> {
        self.remote.scheduled_time()
    }

    pub fn scheduled_weekdays(&self) -> Option<&BTreeSet<Weekday>> {
        self.remote.scheduled_weekdays()
    }

    pub fn timer_duration_ms(&self) -> Option<u64> {
        self.remote.timer_duration_ms()
    }

    pub fn snooze_duration_ms(&self) -> Option<u64> {
        self.remote.snooze_duration_ms()
    }

    pub fn alerting_date(&self) -> Option<DateTime<Utc>> {
        self.remote.alerting_date(self.metadata.created_at)
    }

    /// Replace the remote snapshot and advance the presentation state along
    /// the status transition.
    pub fn apply_remote(&mut self, remote: RemoteAlarm, now: DateTime<Utc>) {
        self.presentation = derive(
            &self.presentation,
            Some(&self.remote),
            &remote,
            &self.metadata,
            now,
        );
        self.remote = remote;
    }

    /// Optimistic status change ahead of the next remote snapshot.
    pub fn apply_status(&mut self, status: AlarmStatus, now: DateTime<Utc>) {
        let remote = RemoteAlarm {
            status,
            ..self.remote.clone()
        };
        self.apply_remote(remote, now);
    }

    pub fn archive(&mut self) {
        self.presentation = PresentationState::None;
    }

    /// Same schedule, durations, icon and title.
    pub fn same_template(&self, other: &AlarmRecord) -> bool {
        self.remote.schedule == other.remote.schedule
            && self.remote.countdown_duration == other.remote.countdown_duration
            && self.metadata.icon == other.metadata.icon
            && self.metadata.title == other.metadata.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::{CountdownState, PausedState};
    use chrono::Duration;

    fn timer_record(now: DateTime<Utc>) -> AlarmRecord {
        let remote = RemoteAlarm {
            id: Uuid::new_v4(),
            status: AlarmStatus::Countdown,
            schedule: None,
            countdown_duration: CountdownDuration::timer(60_000),
        };
        AlarmRecord::new(remote, AlarmMetadata::default_for(AlarmKind::Timer, now), now)
    }

    #[test]
    fn test_new_record_derives_cold() {
        let now = Utc::now();
        let record = timer_record(now);
        assert_eq!(record.kind(), AlarmKind::Timer);
        assert_eq!(record.title(), "Timer");
        assert_eq!(
            record.presentation(),
            &PresentationState::Countdown(CountdownState {
                total_ms: 60_000,
                previously_elapsed_ms: 0,
                started_at: now,
                fire_at: now,
            })
        );
    }

    #[test]
    fn test_apply_status_runs_warm_transition() {
        let now = Utc::now();
        let mut record = timer_record(now);
        record.apply_status(AlarmStatus::Paused, now + Duration::seconds(10));
        assert_eq!(record.status(), AlarmStatus::Paused);
        assert_eq!(
            record.presentation(),
            &PresentationState::Paused(PausedState {
                total_ms: 60_000,
                previously_elapsed_ms: 10_000,
            })
        );
    }

    #[test]
    fn test_archived_record_has_no_presentation() {
        let now = Utc::now();
        let record = timer_record(now);
        let archived = AlarmRecord::archived(record.remote().clone(), record.metadata().clone());
        assert!(archived.presentation().is_none());
        assert!(archived.same_template(&record));
    }

    #[test]
    fn test_record_survives_json() {
        let now = Utc::now();
        let record = timer_record(now);
        let json = serde_json::to_string(&record).unwrap();
        let decoded: AlarmRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, record);
    }
}
