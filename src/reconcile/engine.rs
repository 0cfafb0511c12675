//! Merges remote snapshots into the local running and recent collections.
//!
//! An alarm missing from the remote store either fired (one-shot alarms are
//! deleted by the service) or was removed elsewhere. Alarms and customs are
//! archived to recent; timers are dropped.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AlarmKind, AlarmMetadata, AlarmRecord, RemoteAlarm};

/// Result of one merge, with the ids that changed collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub running: Vec<AlarmRecord>,
    pub recent: Vec<AlarmRecord>,
    pub archived: Vec<Uuid>,
    pub dropped: Vec<Uuid>,
    pub added: Vec<Uuid>,
}

impl Reconciliation {
    /// No record moved between collections.
    pub fn is_quiet(&self) -> bool {
        self.archived.is_empty() && self.dropped.is_empty() && self.added.is_empty()
    }
}

/// Append `record` to the recent list, replacing any entry with the same id.
pub fn push_recent(recent: &mut Vec<AlarmRecord>, mut record: AlarmRecord) {
    record.archive();
    recent.retain(|existing| existing.id() != record.id());
    recent.push(record);
}

/// Evict the oldest recent entries beyond `limit`.
pub fn trim_recent(recent: &mut Vec<AlarmRecord>, limit: usize) -> Vec<Uuid> {
    let excess = recent.len().saturating_sub(limit);
    recent.drain(..excess).map(|record| record.id()).collect()
}

pub fn reconcile(
    running: &[AlarmRecord],
    recent: &[AlarmRecord],
    remote: &[RemoteAlarm],
    now: DateTime<Utc>,
) -> Reconciliation {
    let mut next_running = Vec::with_capacity(remote.len());
    let mut next_recent = recent.to_vec();
    let mut archived = Vec::new();
    let mut dropped = Vec::new();

    for record in running {
        match remote.iter().find(|alarm| alarm.id == record.id()) {
            Some(alarm) => {
                let mut record = record.clone();
                record.apply_remote(alarm.clone(), now);
                next_running.push(record);
            }
            None if record.kind() == AlarmKind::Timer => dropped.push(record.id()),
            None => {
                archived.push(record.id());
                push_recent(&mut next_recent, record.clone());
            }
        }
    }

    let known: HashSet<Uuid> = next_running.iter().map(AlarmRecord::id).collect();
    let mut added = Vec::new();

    for alarm in remote.iter().filter(|alarm| !known.contains(&alarm.id)) {
        // Reactivated elsewhere: keep the metadata we already have.
        let metadata = match next_recent.iter().position(|r| r.id() == alarm.id) {
            Some(index) => next_recent.remove(index).metadata().clone(),
            None => AlarmMetadata::default_for(alarm.kind(), now),
        };
        added.push(alarm.id);
        next_running.push(AlarmRecord::new(alarm.clone(), metadata, now));
    }

    Reconciliation {
        running: next_running,
        recent: next_recent,
        archived,
        dropped,
        added,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AlarmStatus, AlarmTime, CountdownDuration, IconKind, Schedule, Weekday,
    };
    use crate::presentation::{CountdownState, PausedState, PresentationState};
    use chrono::Duration;

    fn alarm_remote(status: AlarmStatus) -> RemoteAlarm {
        RemoteAlarm {
            id: Uuid::new_v4(),
            status,
            schedule: Some(Schedule::relative(
                AlarmTime::new(9, 0).unwrap(),
                [Weekday::Monday],
            )),
            countdown_duration: None,
        }
    }

    fn timer_remote() -> RemoteAlarm {
        RemoteAlarm {
            id: Uuid::new_v4(),
            status: AlarmStatus::Countdown,
            schedule: None,
            countdown_duration: CountdownDuration::timer(100_000),
        }
    }

    fn record(remote: &RemoteAlarm, now: DateTime<Utc>) -> AlarmRecord {
        AlarmRecord::new(
            remote.clone(),
            AlarmMetadata::new(IconKind::Rainbow, "Mine", now),
            now,
        )
    }

    #[test]
    fn test_vanished_alarm_moves_to_recent() {
        let now = Utc::now();
        let alarm = alarm_remote(AlarmStatus::Scheduled);
        let running = vec![record(&alarm, now)];

        let result = reconcile(&running, &[], &[], now);

        assert!(result.running.is_empty());
        assert_eq!(result.recent.len(), 1);
        assert_eq!(result.recent[0].id(), alarm.id);
        assert!(result.recent[0].presentation().is_none());
        assert_eq!(result.recent[0].title(), "Mine");
        assert_eq!(result.archived, vec![alarm.id]);
    }

    #[test]
    fn test_vanished_timer_is_dropped() {
        let now = Utc::now();
        let timer = timer_remote();
        let running = vec![record(&timer, now)];

        let result = reconcile(&running, &[], &[], now);

        assert!(result.running.is_empty());
        assert!(result.recent.is_empty());
        assert_eq!(result.dropped, vec![timer.id]);
    }

    #[test]
    fn test_archival_replaces_stale_recent_entry() {
        let now = Utc::now();
        let alarm = alarm_remote(AlarmStatus::Scheduled);
        let stale = AlarmRecord::archived(
            alarm.clone(),
            AlarmMetadata::new(IconKind::Sun, "Old", now - Duration::days(1)),
        );
        let other = AlarmRecord::archived(
            alarm_remote(AlarmStatus::Scheduled),
            AlarmMetadata::default_for(AlarmKind::Alarm, now),
        );

        let result = reconcile(&[record(&alarm, now)], &[stale, other.clone()], &[], now);

        assert_eq!(result.recent.len(), 2);
        assert_eq!(result.recent[0], other);
        assert_eq!(result.recent[1].title(), "Mine");
    }

    #[test]
    fn test_status_change_runs_deriver() {
        let t0 = Utc::now();
        let timer = timer_remote();
        let running = vec![record(&timer, t0)];
        let paused = RemoteAlarm {
            status: AlarmStatus::Paused,
            ..timer.clone()
        };

        let result = reconcile(&running, &[], &[paused], t0 + Duration::seconds(25));

        assert_eq!(
            result.running[0].presentation(),
            &PresentationState::Paused(PausedState {
                total_ms: 100_000,
                previously_elapsed_ms: 25_000,
            })
        );
        assert!(result.is_quiet());
    }

    #[test]
    fn test_unknown_remote_alarm_gets_default_metadata() {
        let now = Utc::now();
        let timer = timer_remote();

        let result = reconcile(&[], &[], &[timer.clone()], now);

        assert_eq!(result.added, vec![timer.id]);
        let added = &result.running[0];
        assert_eq!(added.title(), "Timer");
        assert_eq!(added.created_at(), now);
        assert_eq!(
            added.presentation(),
            &PresentationState::Countdown(CountdownState {
                total_ms: 100_000,
                previously_elapsed_ms: 0,
                started_at: now,
                fire_at: now,
            })
        );
    }

    #[test]
    fn test_alarm_reactivated_elsewhere_leaves_recent() {
        let now = Utc::now();
        let alarm = alarm_remote(AlarmStatus::Scheduled);
        let recent = vec![AlarmRecord::archived(
            alarm.clone(),
            AlarmMetadata::new(IconKind::MoonStar, "Gym", now),
        )];

        let result = reconcile(&[], &recent, &[alarm.clone()], now);

        assert!(result.recent.is_empty());
        assert_eq!(result.running[0].id(), alarm.id);
        assert_eq!(result.running[0].title(), "Gym");
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let t0 = Utc::now();
        let kept = alarm_remote(AlarmStatus::Scheduled);
        let gone = alarm_remote(AlarmStatus::Scheduled);
        let timer = timer_remote();
        let external = alarm_remote(AlarmStatus::Alerting);
        let running = vec![record(&kept, t0), record(&gone, t0), record(&timer, t0)];
        let remote = vec![kept, timer, external];

        let first = reconcile(&running, &[], &remote, t0);
        let second = reconcile(&first.running, &first.recent, &remote, t0 + Duration::seconds(3));

        assert_eq!(second.running, first.running);
        assert_eq!(second.recent, first.recent);
        assert!(second.is_quiet());
        assert_eq!(
            serde_json::to_vec(&second.running).unwrap(),
            serde_json::to_vec(&first.running).unwrap()
        );
    }

    #[test]
    fn test_trim_recent_evicts_oldest() {
        let now = Utc::now();
        let mut recent: Vec<AlarmRecord> = (0..5)
            .map(|_| {
                AlarmRecord::archived(
                    alarm_remote(AlarmStatus::Scheduled),
                    AlarmMetadata::default_for(AlarmKind::Alarm, now),
                )
            })
            .collect();
        let expected_evicted: Vec<Uuid> = recent[..2].iter().map(AlarmRecord::id).collect();
        let expected_kept: Vec<Uuid> = recent[2..].iter().map(AlarmRecord::id).collect();

        let evicted = trim_recent(&mut recent, 3);

        assert_eq!(evicted, expected_evicted);
        assert_eq!(recent.iter().map(AlarmRecord::id).collect::<Vec<_>>(), expected_kept);
        assert!(trim_recent(&mut recent, 10).is_empty());
    }
}
