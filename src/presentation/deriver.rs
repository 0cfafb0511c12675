//! Derives presentation state from remote status transitions.
//! The remote service only reports a coarse status, so countdown timing is
//! rebuilt from transition edges plus the wall clock at the moment of each edge.

use chrono::{DateTime, Utc};

use crate::models::{AlarmMetadata, AlarmStatus, AlarmTime, RemoteAlarm};

use super::state::{CountdownState, PausedState, PresentationState};

/// Next presentation state for `next`, given the snapshot it replaces.
///
/// With no `previous` snapshot the record was just loaded and only the
/// current status is known (see [`derive_cold`]).
pub fn derive(
    current: &PresentationState,
    previous: Option<&RemoteAlarm>,
    next: &RemoteAlarm,
    metadata: &AlarmMetadata,
    now: DateTime<Utc>,
) -> PresentationState {
    let Some(previous) = previous else {
        return derive_cold(current, next, metadata, now);
    };

    if previous.status == next.status && previous.same_configuration(next) {
        return *current;
    }

    match (previous.status, next.status) {
        (AlarmStatus::Scheduled, AlarmStatus::Countdown) => {
            fresh_countdown(next, metadata, now).unwrap_or(*current)
        }
        (AlarmStatus::Countdown, AlarmStatus::Paused) => match current {
            PresentationState::Countdown(countdown) => {
                PresentationState::Paused(countdown.pause(now))
            }
            _ => *current,
        },
        (AlarmStatus::Paused, AlarmStatus::Countdown) => match current {
            PresentationState::Paused(paused) => {
                PresentationState::Countdown(paused.resume(now, metadata.created_at))
            }
            _ => *current,
        },
        (_, AlarmStatus::Scheduled) => scheduled_alert(next).unwrap_or(*current),
        (_, AlarmStatus::Alerting) => alerting_now(now),
        _ => *current,
    }
}

/// Presentation state from the current status alone.
///
/// A countdown found this way is assumed to have just started: elapsed time
/// spent while nobody observed the transitions cannot be recovered.
pub fn derive_cold(
    current: &PresentationState,
    next: &RemoteAlarm,
    metadata: &AlarmMetadata,
    now: DateTime<Utc>,
) -> PresentationState {
    match next.status {
        AlarmStatus::Alerting => alerting_now(now),
        AlarmStatus::Scheduled => scheduled_alert(next).unwrap_or(*current),
        AlarmStatus::Countdown => fresh_countdown(next, metadata, now).unwrap_or(*current),
        AlarmStatus::Paused => match next.timer_duration_ms() {
            Some(total_ms) => PresentationState::Paused(PausedState {
                total_ms,
                previously_elapsed_ms: 0,
            }),
            None => *current,
        },
        AlarmStatus::Unknown => PresentationState::None,
    }
}

fn alerting_now(now: DateTime<Utc>) -> PresentationState {
    PresentationState::Alert {
        time: AlarmTime::of(&now),
    }
}

fn scheduled_alert(next: &RemoteAlarm) -> Option<PresentationState> {
    next.schedule.as_ref().map(|schedule| PresentationState::Alert {
        time: schedule.time(),
    })
}

fn fresh_countdown(
    next: &RemoteAlarm,
    metadata: &AlarmMetadata,
    now: DateTime<Utc>,
) -> Option<PresentationState> {
    next.timer_duration_ms().map(|total_ms| {
        PresentationState::Countdown(CountdownState {
            total_ms,
            previously_elapsed_ms: 0,
            started_at: now,
            fire_at: metadata.created_at,
        })
    })
}
