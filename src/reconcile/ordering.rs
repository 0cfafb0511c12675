use crate::models::{AlarmKind, AlarmRecord, Schedule};

/// Display order: scheduled records by wall-clock time (hour, then minute),
/// then unscheduled ones; ties fall back to creation order.
pub fn sort_for_display(records: &mut [AlarmRecord]) {
    records.sort_by_key(|record| {
        let time = record.schedule().map(Schedule::time);
        (time.is_none(), time, record.created_at())
    });
}

/// Display-ordered copies of the records of one kind.
pub fn of_kind(records: &[AlarmRecord], kind: AlarmKind) -> Vec<AlarmRecord> {
    let mut selected: Vec<AlarmRecord> = records
        .iter()
        .filter(|record| record.kind() == kind)
        .cloned()
        .collect();
    sort_for_display(&mut selected);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlarmMetadata, AlarmStatus, AlarmTime, CountdownDuration, RemoteAlarm};
    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    fn alarm_at(hour: u8, minute: u8, created_at: DateTime<Utc>) -> AlarmRecord {
        AlarmRecord::archived(
            RemoteAlarm {
                id: Uuid::new_v4(),
                status: AlarmStatus::Scheduled,
                schedule: Some(Schedule::relative(AlarmTime::new(hour, minute).unwrap(), [])),
                countdown_duration: None,
            },
            AlarmMetadata::default_for(AlarmKind::Alarm, created_at),
        )
    }

    fn timer(created_at: DateTime<Utc>) -> AlarmRecord {
        AlarmRecord::archived(
            RemoteAlarm {
                id: Uuid::new_v4(),
                status: AlarmStatus::Countdown,
                schedule: None,
                countdown_duration: CountdownDuration::timer(1_000),
            },
            AlarmMetadata::default_for(AlarmKind::Timer, created_at),
        )
    }

    #[test]
    fn test_sorted_by_hour_then_minute_then_creation() {
        let t0 = Utc::now();
        let late = alarm_at(18, 0, t0);
        let early = alarm_at(6, 30, t0 + Duration::seconds(5));
        let early_minute = alarm_at(6, 15, t0 + Duration::seconds(9));
        let tie_newer = alarm_at(18, 0, t0 + Duration::seconds(1));

        let mut records = vec![tie_newer.clone(), late.clone(), early.clone(), early_minute.clone()];
        sort_for_display(&mut records);

        let ids: Vec<_> = records.iter().map(AlarmRecord::id).collect();
        assert_eq!(ids, vec![early_minute.id(), early.id(), late.id(), tie_newer.id()]);
    }

    #[test]
    fn test_of_kind_filters_and_keeps_creation_order_for_timers() {
        let t0 = Utc::now();
        let first = timer(t0);
        let second = timer(t0 + Duration::seconds(1));
        let alarm = alarm_at(7, 0, t0);
        let records = vec![second.clone(), alarm.clone(), first.clone()];

        let timers = of_kind(&records, AlarmKind::Timer);
        assert_eq!(timers, vec![first, second]);
        assert_eq!(of_kind(&records, AlarmKind::Alarm), vec![alarm]);
        assert!(of_kind(&records, AlarmKind::Custom).is_empty());
    }
}
