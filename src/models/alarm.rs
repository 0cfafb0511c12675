use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AlarmError;

/// Coarse status reported by the remote scheduling service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AlarmStatus {
    Scheduled,
    Countdown,
    Paused,
    Alerting,
    /// Any status this crate does not know how to present.
    #[serde(other)]
    Unknown,
}

impl AlarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmStatus::Scheduled => "scheduled",
            AlarmStatus::Countdown => "countdown",
            AlarmStatus::Paused => "paused",
            AlarmStatus::Alerting => "alerting",
            AlarmStatus::Unknown => "unknown",
        }
    }
}

/// Wall-clock hour and minute of an alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlarmTime {
    pub hour: u8,
    pub minute: u8,
}

impl AlarmTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, AlarmError> {
        if hour > 23 || minute > 59 {
            return Err(AlarmError::InvalidSchedule);
        }
        Ok(Self { hour, minute })
    }

    /// Hour and minute of `instant` in the local time zone.
    pub fn of<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        let local = instant.with_timezone(&Local);
        Self {
            hour: local.hour() as u8,
            minute: local.minute() as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Weekday::Sunday => "Sunday",
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
        }
    }
}

/// Human-readable summary of a repeat set.
pub fn describe_weekdays(days: &BTreeSet<Weekday>) -> String {
    use Weekday::*;

    match days.len() {
        0 => "Never".to_string(),
        7 => "Every day".to_string(),
        1 => format!("Every {}", days.iter().next().map(Weekday::name).unwrap_or_default()),
        2 if days.contains(&Saturday) && days.contains(&Sunday) => "Weekends".to_string(),
        5 if !days.contains(&Saturday) && !days.contains(&Sunday) => "Weekdays".to_string(),
        _ => days.iter().map(Weekday::name).collect::<Vec<_>>().join(", "),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Schedule {
    /// Fires once at an absolute instant.
    Fixed { date: DateTime<Utc> },
    /// Fires at a wall-clock time; an empty repeat set means once.
    Relative {
        time: AlarmTime,
        repeats: BTreeSet<Weekday>,
    },
}

impl Schedule {
    pub fn relative(time: AlarmTime, repeats: impl IntoIterator<Item = Weekday>) -> Self {
        Schedule::Relative {
            time,
            repeats: repeats.into_iter().collect(),
        }
    }

    /// Nominal wall-clock time of the alert.
    pub fn time(&self) -> AlarmTime {
        match self {
            Schedule::Fixed { date } => AlarmTime::of(date),
            Schedule::Relative { time, .. } => *time,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CountdownDuration {
    pub pre_alert_ms: Option<u64>,
    pub post_alert_ms: Option<u64>,
}

impl CountdownDuration {
    /// Zero parts are treated as absent; `None` when nothing is left.
    pub fn from_parts(pre_alert_ms: Option<u64>, post_alert_ms: Option<u64>) -> Option<Self> {
        let pre_alert_ms = pre_alert_ms.filter(|ms| *ms > 0);
        let post_alert_ms = post_alert_ms.filter(|ms| *ms > 0);

        if pre_alert_ms.is_none() && post_alert_ms.is_none() {
            return None;
        }
        Some(Self {
            pre_alert_ms,
            post_alert_ms,
        })
    }

    /// A plain timer counts down and repeats with the same duration.
    pub fn timer(duration_ms: u64) -> Option<Self> {
        Self::from_parts(Some(duration_ms), Some(duration_ms))
    }
}

/// Derived classification of an alarm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AlarmKind {
    Alarm,
    Timer,
    Custom,
}

impl AlarmKind {
    pub fn classify(
        schedule: Option<&Schedule>,
        countdown_duration: Option<&CountdownDuration>,
    ) -> Self {
        match (schedule, countdown_duration) {
            (Some(_), None) => AlarmKind::Alarm,
            (None, Some(_)) => AlarmKind::Timer,
            _ => AlarmKind::Custom,
        }
    }
}

/// Snapshot of one alarm as held by the remote scheduling service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAlarm {
    pub id: Uuid,
    pub status: AlarmStatus,
    pub schedule: Option<Schedule>,
    pub countdown_duration: Option<CountdownDuration>,
}

impl RemoteAlarm {
    pub fn kind(&self) -> AlarmKind {
        AlarmKind::classify(self.schedule.as_ref(), self.countdown_duration.as_ref())
    }

    /// True when nothing but `status` could differ from `other`.
    pub fn same_configuration(&self, other: &RemoteAlarm) -> bool {
        self.id == other.id
            && self.schedule == other.schedule
            && self.countdown_duration == other.countdown_duration
    }

    pub fn is_fixed_date(&self) -> bool {
        matches!(self.schedule, Some(Schedule::Fixed { .. }))
    }

    /// No repeating schedule: the remote service deletes it after it fires.
    pub fn is_one_shot(&self) -> bool {
        match &self.schedule {
            None | Some(Schedule::Fixed { .. }) => true,
            Some(Schedule::Relative { repeats, .. }) => repeats.is_empty(),
        }
    }

    pub fn scheduled_time(&self) -> Option<AlarmTime> {
        match &self.schedule {
            Some(Schedule::Relative { time, .. }) => Some(*time),
            _ => None,
        }
    }

    pub fn scheduled_weekdays(&self) -> Option<&BTreeSet<Weekday>> {
        match &self.schedule {
            Some(Schedule::Relative { repeats, .. }) => Some(repeats),
            _ => None,
        }
    }

    pub fn timer_duration_ms(&self) -> Option<u64> {
        self.countdown_duration.and_then(|d| d.pre_alert_ms)
    }

    pub fn snooze_duration_ms(&self) -> Option<u64> {
        self.countdown_duration.and_then(|d| d.post_alert_ms)
    }

    /// Next instant the schedule alerts, strictly after the minute of `reference`.
    pub fn alerting_date(&self, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.schedule.as_ref()? {
            Schedule::Fixed { date } => Some(*date),
            Schedule::Relative { time, .. } => {
                let local = reference.with_timezone(&Local);
                let reference_time = AlarmTime::of(&local);
                let mut day = local.date_naive();
                if reference_time >= *time {
                    day = day.checked_add_signed(Duration::days(1))?;
                }
                let naive = day.and_hms_opt(u32::from(time.hour), u32::from(time.minute), 0)?;
                Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn remote(schedule: Option<Schedule>, countdown: Option<CountdownDuration>) -> RemoteAlarm {
        RemoteAlarm {
            id: Uuid::new_v4(),
            status: AlarmStatus::Scheduled,
            schedule,
            countdown_duration: countdown,
        }
    }

    fn nine() -> Schedule {
        Schedule::relative(AlarmTime::new(9, 0).unwrap(), [Weekday::Monday])
    }

    #[test]
    fn test_classification_covers_every_combination() {
        let countdown = CountdownDuration::from_parts(Some(300_000), None);

        assert_eq!(remote(Some(nine()), None).kind(), AlarmKind::Alarm);
        assert_eq!(remote(None, countdown).kind(), AlarmKind::Timer);
        assert_eq!(remote(Some(nine()), countdown).kind(), AlarmKind::Custom);
        assert_eq!(remote(None, None).kind(), AlarmKind::Custom);
    }

    #[test]
    fn test_classification_is_stable() {
        let alarm = remote(Some(nine()), CountdownDuration::timer(60_000));
        let copy = alarm.clone();
        assert_eq!(alarm.kind(), copy.kind());
        assert_eq!(alarm.kind(), alarm.kind());
    }

    #[test]
    fn test_countdown_parts_drop_zeroes() {
        assert_eq!(CountdownDuration::from_parts(Some(0), Some(0)), None);
        assert_eq!(CountdownDuration::from_parts(None, None), None);
        assert_eq!(
            CountdownDuration::from_parts(Some(0), Some(5_000)),
            Some(CountdownDuration {
                pre_alert_ms: None,
                post_alert_ms: Some(5_000),
            })
        );
    }

    #[test]
    fn test_status_names_match_serialized_form() {
        for status in [
            AlarmStatus::Scheduled,
            AlarmStatus::Countdown,
            AlarmStatus::Paused,
            AlarmStatus::Alerting,
            AlarmStatus::Unknown,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_alarm_time_rejects_out_of_range() {
        assert!(matches!(AlarmTime::new(24, 0), Err(AlarmError::InvalidSchedule)));
        assert!(matches!(AlarmTime::new(7, 60), Err(AlarmError::InvalidSchedule)));
        assert_eq!(AlarmTime::new(7, 5).unwrap(), AlarmTime { hour: 7, minute: 5 });
    }

    #[test]
    fn test_one_shot_detection() {
        assert!(remote(None, CountdownDuration::timer(1_000)).is_one_shot());
        assert!(remote(
            Some(Schedule::Fixed { date: Utc::now() }),
            None
        )
        .is_one_shot());
        assert!(remote(
            Some(Schedule::relative(AlarmTime::new(6, 30).unwrap(), [])),
            None
        )
        .is_one_shot());
        assert!(!remote(Some(nine()), None).is_one_shot());
    }

    #[test]
    fn test_alerting_date_rolls_to_next_day() {
        let reference = Local
            .with_ymd_and_hms(2025, 6, 20, 10, 0, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);

        let later = remote(
            Some(Schedule::relative(AlarmTime::new(11, 15).unwrap(), [])),
            None,
        );
        let fired = later.alerting_date(reference).unwrap().with_timezone(&Local);
        assert_eq!((fired.day(), fired.hour(), fired.minute()), (20, 11, 15));

        let same_minute = remote(
            Some(Schedule::relative(AlarmTime::new(10, 0).unwrap(), [])),
            None,
        );
        let fired = same_minute
            .alerting_date(reference)
            .unwrap()
            .with_timezone(&Local);
        assert_eq!((fired.day(), fired.hour()), (21, 10));
    }

    #[test]
    fn test_describe_weekdays() {
        use Weekday::*;

        assert_eq!(describe_weekdays(&BTreeSet::new()), "Never");
        assert_eq!(describe_weekdays(&Weekday::ALL.into_iter().collect()), "Every day");
        assert_eq!(describe_weekdays(&[Monday].into_iter().collect()), "Every Monday");
        assert_eq!(
            describe_weekdays(&[Saturday, Sunday].into_iter().collect()),
            "Weekends"
        );
        assert_eq!(
            describe_weekdays(&[Monday, Tuesday, Wednesday, Thursday, Friday].into_iter().collect()),
            "Weekdays"
        );
        assert_eq!(
            describe_weekdays(&[Friday, Monday].into_iter().collect()),
            "Monday, Friday"
        );
    }
}
