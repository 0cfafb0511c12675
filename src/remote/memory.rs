//! In-process alarm scheduling service.
//!
//! Behaves like the remote store closely enough to drive the coordinator in
//! tests and demos: one-shot alarms disappear once they have fired, every
//! change is broadcast as a full snapshot set, and scheduling requires
//! authorization.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use log::debug;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{AlarmStatus, RemoteAlarm};

use super::{AlarmConfiguration, AlarmService, AlarmUpdate, AuthorizationState};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

struct Inner {
    alarms: Vec<RemoteAlarm>,
    authorization: AuthorizationState,
    grant_on_request: bool,
    fail_next: Option<ServiceError>,
    revision: u64,
    alarm_tx: broadcast::Sender<AlarmUpdate>,
}

impl Inner {
    /// Sent under the lock so updates go out in revision order.
    fn publish(&mut self) {
        self.revision += 1;
        // No subscribers is fine.
        let _ = self.alarm_tx.send(AlarmUpdate {
            revision: self.revision,
            alarms: self.alarms.clone(),
        });
    }
}

pub struct MemoryAlarmService {
    inner: Mutex<Inner>,
    auth_tx: broadcast::Sender<AuthorizationState>,
}

impl Default for MemoryAlarmService {
    fn default() -> Self {
        Self::new(AuthorizationState::Authorized)
    }
}

impl MemoryAlarmService {
    pub fn new(authorization: AuthorizationState) -> Self {
        let (alarm_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (auth_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                alarms: Vec::new(),
                authorization,
                grant_on_request: true,
                fail_next: None,
                revision: 0,
                alarm_tx,
            }),
            auth_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Run `change` against the store and broadcast the result.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<RemoteAlarm>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut inner = self.lock();
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }
        let result = change(&mut inner.alarms)?;
        inner.publish();
        Ok(result)
    }

    fn transition(
        &self,
        id: Uuid,
        from: &[AlarmStatus],
        to: AlarmStatus,
    ) -> Result<(), ServiceError> {
        self.mutate(|alarms| {
            let alarm = alarms
                .iter_mut()
                .find(|alarm| alarm.id == id)
                .ok_or(ServiceError::UnknownAlarm(id))?;
            if !from.contains(&alarm.status) {
                return Err(ServiceError::InvalidConfiguration(format!(
                    "alarm {id} cannot move from {:?} to {:?}",
                    alarm.status, to
                )));
            }
            alarm.status = to;
            Ok(())
        })
    }

    /// Current store contents.
    pub fn snapshot(&self) -> Vec<RemoteAlarm> {
        self.lock().alarms.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<RemoteAlarm> {
        self.lock().alarms.iter().find(|alarm| alarm.id == id).cloned()
    }

    /// Make the next mutating call fail with `err`.
    pub fn fail_next(&self, err: ServiceError) {
        self.lock().fail_next = Some(err);
    }

    /// Whether an authorization request is granted or denied.
    pub fn set_grant_on_request(&self, grant: bool) {
        self.lock().grant_on_request = grant;
    }

    pub fn set_authorization(&self, state: AuthorizationState) {
        self.lock().authorization = state;
        let _ = self.auth_tx.send(state);
    }

    /// Add an alarm created by another process.
    pub fn insert_external(&self, alarm: RemoteAlarm) {
        let mut inner = self.lock();
        inner.alarms.retain(|existing| existing.id != alarm.id);
        inner.alarms.push(alarm);
        inner.publish();
    }

    /// End every open update subscription, as a dropped platform
    /// connection would.
    pub fn close_updates(&self) {
        let (alarm_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        self.lock().alarm_tx = alarm_tx;
    }

    /// The alarm starts alerting.
    pub fn fire(&self, id: Uuid) -> Result<(), ServiceError> {
        self.transition(
            id,
            &[AlarmStatus::Scheduled, AlarmStatus::Countdown],
            AlarmStatus::Alerting,
        )
    }

    /// An alert ran out without user action: one-shot alarms are deleted,
    /// repeating ones go back to waiting for their next occurrence.
    pub fn complete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.mutate(|alarms| finish(alarms, id))
    }
}

fn finish(alarms: &mut Vec<RemoteAlarm>, id: Uuid) -> Result<(), ServiceError> {
    let index = alarms
        .iter()
        .position(|alarm| alarm.id == id)
        .ok_or(ServiceError::UnknownAlarm(id))?;
    if alarms[index].is_one_shot() {
        alarms.remove(index);
    } else {
        alarms[index].status = AlarmStatus::Scheduled;
    }
    Ok(())
}

fn broadcast_stream<T: Clone + Send + 'static>(
    rx: broadcast::Receiver<T>,
) -> BoxStream<'static, T> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(value) => return Some((value, rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("update subscriber lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

#[async_trait]
impl AlarmService for MemoryAlarmService {
    async fn alarms(&self) -> Result<Vec<RemoteAlarm>, ServiceError> {
        let mut inner = self.lock();
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }
        Ok(inner.alarms.clone())
    }

    fn alarm_updates(&self) -> BoxStream<'static, AlarmUpdate> {
        broadcast_stream(self.lock().alarm_tx.subscribe())
    }

    fn revision(&self) -> u64 {
        self.lock().revision
    }

    async fn schedule(
        &self,
        id: Uuid,
        configuration: AlarmConfiguration,
    ) -> Result<RemoteAlarm, ServiceError> {
        if self.lock().authorization != AuthorizationState::Authorized {
            return Err(ServiceError::Unauthorized);
        }
        if configuration.schedule.is_none() && configuration.countdown_duration.is_none() {
            return Err(ServiceError::InvalidConfiguration(
                "neither schedule nor countdown duration".into(),
            ));
        }

        let counts_down_now = configuration.schedule.is_none()
            && configuration
                .countdown_duration
                .is_some_and(|d| d.pre_alert_ms.is_some());
        let alarm = RemoteAlarm {
            id,
            status: if counts_down_now {
                AlarmStatus::Countdown
            } else {
                AlarmStatus::Scheduled
            },
            schedule: configuration.schedule,
            countdown_duration: configuration.countdown_duration,
        };

        self.mutate(|alarms| {
            alarms.retain(|existing| existing.id != id);
            alarms.push(alarm.clone());
            Ok(alarm)
        })
    }

    async fn cancel(&self, id: Uuid) -> Result<(), ServiceError> {
        self.mutate(|alarms| {
            let before = alarms.len();
            alarms.retain(|alarm| alarm.id != id);
            if alarms.len() == before {
                return Err(ServiceError::UnknownAlarm(id));
            }
            Ok(())
        })
    }

    async fn pause(&self, id: Uuid) -> Result<(), ServiceError> {
        self.transition(id, &[AlarmStatus::Countdown], AlarmStatus::Paused)
    }

    async fn resume(&self, id: Uuid) -> Result<(), ServiceError> {
        self.transition(id, &[AlarmStatus::Paused], AlarmStatus::Countdown)
    }

    async fn stop(&self, id: Uuid) -> Result<(), ServiceError> {
        self.mutate(|alarms| finish(alarms, id))
    }

    async fn countdown(&self, id: Uuid) -> Result<(), ServiceError> {
        self.transition(id, &[AlarmStatus::Alerting], AlarmStatus::Countdown)
    }

    fn authorization_state(&self) -> AuthorizationState {
        self.lock().authorization
    }

    async fn request_authorization(&self) -> Result<AuthorizationState, ServiceError> {
        let state = {
            let mut inner = self.lock();
            if inner.authorization == AuthorizationState::NotDetermined {
                inner.authorization = if inner.grant_on_request {
                    AuthorizationState::Authorized
                } else {
                    AuthorizationState::Denied
                };
            }
            inner.authorization
        };
        let _ = self.auth_tx.send(state);
        Ok(state)
    }

    fn authorization_updates(&self) -> BoxStream<'static, AuthorizationState> {
        broadcast_stream(self.auth_tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlarmMetadata, AlarmTime, CountdownDuration, IconKind, Schedule, Weekday};
    use chrono::Utc;

    fn config(schedule: Option<Schedule>, countdown: Option<CountdownDuration>) -> AlarmConfiguration {
        AlarmConfiguration::new(
            schedule,
            countdown,
            AlarmMetadata::new(IconKind::Drop, "Test", Utc::now()),
        )
    }

    #[tokio::test]
    async fn test_timer_starts_counting_down() {
        let service = MemoryAlarmService::default();
        let id = Uuid::new_v4();
        let alarm = service
            .schedule(id, config(None, CountdownDuration::timer(1_000)))
            .await
            .unwrap();
        assert_eq!(alarm.status, AlarmStatus::Countdown);
        assert_eq!(service.snapshot(), vec![alarm]);
    }

    #[tokio::test]
    async fn test_one_shot_alarm_is_deleted_after_firing() {
        let service = MemoryAlarmService::default();
        let once = Uuid::new_v4();
        let weekly = Uuid::new_v4();
        let seven = AlarmTime::new(7, 0).unwrap();

        service
            .schedule(once, config(Some(Schedule::relative(seven, [])), None))
            .await
            .unwrap();
        service
            .schedule(
                weekly,
                config(Some(Schedule::relative(seven, [Weekday::Monday])), None),
            )
            .await
            .unwrap();

        service.fire(once).unwrap();
        service.fire(weekly).unwrap();
        service.complete(once).unwrap();
        service.stop(weekly).await.unwrap();

        assert!(service.get(once).is_none());
        assert_eq!(service.get(weekly).unwrap().status, AlarmStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_schedule_requires_authorization() {
        let service = MemoryAlarmService::new(AuthorizationState::NotDetermined);
        let result = service
            .schedule(Uuid::new_v4(), config(None, CountdownDuration::timer(1_000)))
            .await;
        assert_eq!(result, Err(ServiceError::Unauthorized));

        service.set_grant_on_request(false);
        assert_eq!(
            service.request_authorization().await.unwrap(),
            AuthorizationState::Denied
        );
    }

    #[tokio::test]
    async fn test_updates_carry_full_snapshot() {
        let service = MemoryAlarmService::default();
        let mut updates = service.alarm_updates();
        let id = Uuid::new_v4();

        service
            .schedule(id, config(None, CountdownDuration::timer(1_000)))
            .await
            .unwrap();
        service.pause(id).await.unwrap();

        let first = updates.next().await.unwrap();
        let second = updates.next().await.unwrap();
        assert_eq!(first.alarms[0].status, AlarmStatus::Countdown);
        assert_eq!(second.alarms[0].status, AlarmStatus::Paused);
        assert_eq!((first.revision, second.revision), (1, 2));
        assert_eq!(service.revision(), 2);
    }

    #[tokio::test]
    async fn test_failed_call_publishes_nothing() {
        let service = MemoryAlarmService::default();
        assert!(service.cancel(Uuid::new_v4()).await.is_err());
        assert_eq!(service.revision(), 0);
    }

    #[tokio::test]
    async fn test_closed_updates_end_and_resubscribe() {
        let service = MemoryAlarmService::default();
        let mut old = service.alarm_updates();

        service.close_updates();
        assert!(old.next().await.is_none());

        let mut fresh = service.alarm_updates();
        service
            .schedule(Uuid::new_v4(), config(None, CountdownDuration::timer(1_000)))
            .await
            .unwrap();
        assert_eq!(fresh.next().await.unwrap().revision, 1);
    }

    #[tokio::test]
    async fn test_unknown_alarm_is_rejected() {
        let service = MemoryAlarmService::default();
        let id = Uuid::new_v4();
        assert_eq!(service.cancel(id).await, Err(ServiceError::UnknownAlarm(id)));
        assert_eq!(service.resume(id).await, Err(ServiceError::UnknownAlarm(id)));
    }
}
