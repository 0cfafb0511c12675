use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp;

use crate::models::AlarmTime;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountdownState {
    pub total_ms: u64,
    /// Time accumulated by earlier running segments; combines with `started_at`
    /// to compute the true elapsed duration.
    pub previously_elapsed_ms: u64,
    /// Start of the segment that is currently running.
    pub started_at: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PausedState {
    pub total_ms: u64,
    pub previously_elapsed_ms: u64,
}

/// Fine-grained timing state reconstructed locally from status transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum PresentationState {
    Alert { time: AlarmTime },
    Countdown(CountdownState),
    Paused(PausedState),
    #[default]
    None,
}

/// Milliseconds between `from` and `to`, zero if `to` is earlier.
pub(crate) fn elapsed_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    let ms = (to - from).num_milliseconds();
    u64::try_from(ms).unwrap_or(0)
}

impl CountdownState {
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        self.previously_elapsed_ms
            .saturating_add(elapsed_between(self.started_at, now))
    }

    /// Freeze the running segment into a paused state.
    pub fn pause(&self, now: DateTime<Utc>) -> PausedState {
        PausedState {
            total_ms: self.total_ms,
            previously_elapsed_ms: self.elapsed_ms(now),
        }
    }
}

impl PausedState {
    /// Start a new running segment that keeps the accumulated time.
    pub fn resume(&self, now: DateTime<Utc>, fire_at: DateTime<Utc>) -> CountdownState {
        CountdownState {
            total_ms: self.total_ms,
            previously_elapsed_ms: self.previously_elapsed_ms,
            started_at: now,
            fire_at,
        }
    }
}

impl PresentationState {
    pub fn is_none(&self) -> bool {
        matches!(self, PresentationState::None)
    }

    pub fn alert_time(&self) -> Option<AlarmTime> {
        match self {
            PresentationState::Alert { time } => Some(*time),
            _ => None,
        }
    }

    /// Remaining countdown time. May be negative right before the remote
    /// service starts alerting.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        let (total, elapsed) = match self {
            PresentationState::Countdown(countdown) => (countdown.total_ms, countdown.elapsed_ms(now)),
            PresentationState::Paused(paused) => (paused.total_ms, paused.previously_elapsed_ms),
            PresentationState::Alert { .. } | PresentationState::None => return None,
        };
        Some(total as i64 - elapsed as i64)
    }

    pub fn display_remaining_ms(&self, now: DateTime<Utc>) -> Option<u64> {
        self.remaining_ms(now)
            .map(|remaining| cmp::max(remaining, 0) as u64)
    }

    /// Fraction of the countdown still to run, in `0.0..=1.0`.
    pub fn progress(&self, now: DateTime<Utc>) -> Option<f64> {
        let total = match self {
            PresentationState::Countdown(countdown) => countdown.total_ms,
            PresentationState::Paused(paused) => paused.total_ms,
            _ => return None,
        };
        if total == 0 {
            return Some(0.0);
        }
        let remaining = self.display_remaining_ms(now)?;
        Some((remaining as f64 / total as f64).clamp(0.0, 1.0))
    }
}
