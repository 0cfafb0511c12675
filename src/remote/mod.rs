//! Contract with the remote alarm scheduling service.
//!
//! The service is authoritative: it fires alarms, deletes one-shot alarms after
//! they fire, and reports a coarse status per alarm. Everything else this crate
//! knows about an alarm is local.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{AlarmKind, AlarmMetadata, CountdownDuration, RemoteAlarm, Schedule};

pub mod memory;

pub use memory::MemoryAlarmService;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationState {
    NotDetermined,
    Denied,
    Authorized,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SecondaryButton {
    /// Restart the post-alert countdown of an alarm.
    Snooze,
    /// Run the countdown again.
    Repeat,
}

/// What the service shows while the alarm is alerting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertPresentation {
    pub title: String,
    pub secondary_button: Option<SecondaryButton>,
    /// Countdown and paused screens are provided.
    pub has_countdown: bool,
}

impl AlertPresentation {
    pub fn new(title: &str, countdown_duration: Option<&CountdownDuration>) -> Self {
        let countdown = countdown_duration.is_some_and(|d| d.pre_alert_ms.is_some());
        let snooze = countdown_duration.is_some_and(|d| d.post_alert_ms.is_some());

        let secondary_button = if snooze {
            Some(SecondaryButton::Snooze)
        } else if countdown {
            Some(SecondaryButton::Repeat)
        } else {
            None
        };

        Self {
            title: title.to_string(),
            secondary_button,
            has_countdown: countdown || snooze,
        }
    }
}

/// One published change: the full alarm set and its place in the update
/// sequence. Revisions strictly increase per published update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmUpdate {
    pub revision: u64,
    pub alarms: Vec<RemoteAlarm>,
}

/// Everything submitted to the service when scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmConfiguration {
    pub schedule: Option<Schedule>,
    pub countdown_duration: Option<CountdownDuration>,
    pub metadata: AlarmMetadata,
    pub presentation: AlertPresentation,
}

impl AlarmConfiguration {
    pub fn new(
        schedule: Option<Schedule>,
        countdown_duration: Option<CountdownDuration>,
        metadata: AlarmMetadata,
    ) -> Self {
        let presentation = AlertPresentation::new(&metadata.title, countdown_duration.as_ref());
        Self {
            schedule,
            countdown_duration,
            metadata,
            presentation,
        }
    }

    pub fn kind(&self) -> AlarmKind {
        AlarmKind::classify(self.schedule.as_ref(), self.countdown_duration.as_ref())
    }
}

/// Remote alarm scheduling service.
///
/// Implementations:
/// - a platform adapter in the embedding application
/// - [`MemoryAlarmService`]: in-process store for tests and demos
#[async_trait]
pub trait AlarmService: Send + Sync + 'static {
    /// Every alarm the service currently holds.
    async fn alarms(&self) -> Result<Vec<RemoteAlarm>, ServiceError>;

    /// Full snapshot set on every change. Ending means the subscription was
    /// lost; subscribe again to resume.
    fn alarm_updates(&self) -> BoxStream<'static, AlarmUpdate>;

    /// Revision of the latest published update, 0 before the first.
    fn revision(&self) -> u64;

    async fn schedule(
        &self,
        id: Uuid,
        configuration: AlarmConfiguration,
    ) -> Result<RemoteAlarm, ServiceError>;

    async fn cancel(&self, id: Uuid) -> Result<(), ServiceError>;

    async fn pause(&self, id: Uuid) -> Result<(), ServiceError>;

    async fn resume(&self, id: Uuid) -> Result<(), ServiceError>;

    /// Stop an alerting alarm. Repeating alarms are rescheduled.
    async fn stop(&self, id: Uuid) -> Result<(), ServiceError>;

    /// Snooze an alarm or repeat a timer that is alerting.
    async fn countdown(&self, id: Uuid) -> Result<(), ServiceError>;

    fn authorization_state(&self) -> AuthorizationState;

    async fn request_authorization(&self) -> Result<AuthorizationState, ServiceError>;

    fn authorization_updates(&self) -> BoxStream<'static, AuthorizationState>;
}
