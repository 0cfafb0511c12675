use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex as StdMutex, RwLock,
    },
};

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AlarmError, Result},
    models::{
        AlarmKind, AlarmMetadata, AlarmRecord, AlarmStatus, AlarmTime, CountdownDuration,
        IconKind, RemoteAlarm, Schedule, Weekday,
    },
    reconcile::{of_kind, push_recent, reconcile, trim_recent},
    remote::{AlarmConfiguration, AlarmService, AlarmUpdate, AuthorizationState},
    settings::AlarmSettings,
    store::AlarmStore,
};

/// The running and recent collections. An id is in at most one of them.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AlarmBook {
    pub running: Vec<AlarmRecord>,
    pub recent: Vec<AlarmRecord>,
}

impl AlarmBook {
    fn running_index(&self, id: Uuid) -> Option<usize> {
        self.running.iter().position(|record| record.id() == id)
    }

    fn recent_index(&self, id: Uuid) -> Option<usize> {
        self.recent.iter().position(|record| record.id() == id)
    }
}

/// What the user asked for when creating or editing an alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmDraft {
    pub title: String,
    /// `None` takes the configured default icon.
    pub icon: Option<IconKind>,
    pub schedule: Option<Schedule>,
    pub countdown_duration: Option<CountdownDuration>,
}

impl AlarmDraft {
    pub fn alarm(title: impl Into<String>, icon: IconKind, time: AlarmTime, repeats: BTreeSet<Weekday>) -> Self {
        Self {
            title: title.into(),
            icon: Some(icon),
            schedule: Some(Schedule::Relative { time, repeats }),
            countdown_duration: None,
        }
    }

    pub fn timer(title: impl Into<String>, icon: IconKind, duration_ms: u64) -> Self {
        Self {
            title: title.into(),
            icon: Some(icon),
            schedule: None,
            countdown_duration: CountdownDuration::timer(duration_ms),
        }
    }

    pub fn custom(
        title: impl Into<String>,
        icon: IconKind,
        schedule: Option<Schedule>,
        countdown_ms: u64,
        snooze_ms: u64,
    ) -> Self {
        Self {
            title: title.into(),
            icon: Some(icon),
            schedule,
            countdown_duration: CountdownDuration::from_parts(Some(countdown_ms), Some(snooze_ms)),
        }
    }

    /// Validated configuration stamped with the current time.
    fn into_configuration(self, default_icon: IconKind) -> Result<AlarmConfiguration> {
        let countdown_duration = self
            .countdown_duration
            .and_then(|d| CountdownDuration::from_parts(d.pre_alert_ms, d.post_alert_ms));
        if self.schedule.is_none() && countdown_duration.is_none() {
            return Err(AlarmError::NothingToSchedule);
        }

        let kind = AlarmKind::classify(self.schedule.as_ref(), countdown_duration.as_ref());
        let title = if self.title.trim().is_empty() {
            AlarmMetadata::default_title(kind).to_string()
        } else {
            self.title
        };
        let metadata = AlarmMetadata::new(self.icon.unwrap_or(default_icon), title, Utc::now());

        Ok(AlarmConfiguration::new(
            self.schedule,
            countdown_duration,
            metadata,
        ))
    }
}

/// Owns the alarm collections and performs every operation on them.
///
/// All mutation goes through one async mutex that is held for the whole
/// operation, remote calls included, so operations and remote snapshot
/// events apply strictly one after another.
///
/// Every commit records the service revision it has caught up with. Updates
/// with an older revision were published while an operation held the lock
/// and are already covered by a later update, so they are skipped.
#[derive(Clone)]
pub struct AlarmCoordinator {
    service: Arc<dyn AlarmService>,
    store: Arc<dyn AlarmStore>,
    book: Arc<Mutex<AlarmBook>>,
    settings: Arc<RwLock<AlarmSettings>>,
    synced_revision: Arc<AtomicU64>,
    last_authorization: Arc<StdMutex<Option<AuthorizationState>>>,
}

impl AlarmCoordinator {
    /// Load the durable collections and reconcile them with the remote store.
    pub async fn open(
        service: Arc<dyn AlarmService>,
        store: Arc<dyn AlarmStore>,
        settings: &AlarmSettings,
    ) -> Result<Self> {
        let book = AlarmBook {
            running: store.load_running().await?,
            recent: store.load_recent().await?,
        };
        info!(
            "Loaded {} running and {} recent alarms",
            book.running.len(),
            book.recent.len()
        );

        let coordinator = Self {
            service,
            store,
            book: Arc::new(Mutex::new(book)),
            settings: Arc::new(RwLock::new(settings.clone())),
            synced_revision: Arc::new(AtomicU64::new(0)),
            last_authorization: Arc::new(StdMutex::new(None)),
        };
        coordinator.refresh().await?;
        Ok(coordinator)
    }

    pub(crate) fn service(&self) -> Arc<dyn AlarmService> {
        self.service.clone()
    }

    pub fn settings(&self) -> AlarmSettings {
        match self.settings.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Use `settings` from now on. A lower recent limit trims immediately.
    pub async fn apply_settings(&self, settings: AlarmSettings) -> Result<()> {
        match self.settings.write() {
            Ok(mut guard) => *guard = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
        let mut book = self.book.lock().await;
        self.commit(&mut book).await
    }

    /// Service revision covered by the last commit.
    pub fn synced_revision(&self) -> u64 {
        self.synced_revision.load(Ordering::SeqCst)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    pub async fn book(&self) -> AlarmBook {
        self.book.lock().await.clone()
    }

    pub async fn running(&self) -> Vec<AlarmRecord> {
        self.book.lock().await.running.clone()
    }

    pub async fn recent(&self) -> Vec<AlarmRecord> {
        self.book.lock().await.recent.clone()
    }

    pub async fn running_of_kind(&self, kind: AlarmKind) -> Vec<AlarmRecord> {
        of_kind(&self.book.lock().await.running, kind)
    }

    pub async fn recent_of_kind(&self, kind: AlarmKind) -> Vec<AlarmRecord> {
        of_kind(&self.book.lock().await.recent, kind)
    }

    pub async fn record(&self, id: Uuid) -> Option<AlarmRecord> {
        let book = self.book.lock().await;
        book.running
            .iter()
            .chain(book.recent.iter())
            .find(|record| record.id() == id)
            .cloned()
    }

    /// Last authorization state reported by the service, if any change was seen.
    pub fn last_authorization(&self) -> Option<AuthorizationState> {
        match self.last_authorization.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Remote snapshots
    // ─────────────────────────────────────────────────────────────────────

    /// List the remote store and reconcile against it.
    pub async fn refresh(&self) -> Result<()> {
        let mut book = self.book.lock().await;
        let remote = self.service.alarms().await?;
        self.merge(&mut book, &remote).await
    }

    /// Reconcile against a snapshot set regardless of its age.
    pub async fn apply_remote_snapshot(&self, remote: &[RemoteAlarm]) -> Result<()> {
        let mut book = self.book.lock().await;
        self.merge(&mut book, remote).await
    }

    /// Reconcile against an update from the stream unless a later commit
    /// already covers it.
    pub async fn apply_remote_update(&self, update: &AlarmUpdate) -> Result<()> {
        let mut book = self.book.lock().await;
        let synced = self.synced_revision();
        if update.revision < synced {
            debug!(
                "Skipping remote update {} already covered by {synced}",
                update.revision
            );
            return Ok(());
        }
        self.merge(&mut book, &update.alarms).await
    }

    async fn merge(&self, book: &mut AlarmBook, remote: &[RemoteAlarm]) -> Result<()> {
        let result = reconcile(&book.running, &book.recent, remote, Utc::now());
        if !result.is_quiet() {
            info!(
                "Reconciled remote alarms: {} archived, {} dropped, {} added",
                result.archived.len(),
                result.dropped.len(),
                result.added.len()
            );
        }
        book.running = result.running;
        book.recent = result.recent;
        self.commit(book).await
    }

    pub(crate) fn note_authorization(&self, state: AuthorizationState) {
        match state {
            AuthorizationState::Authorized => info!("Alarm authorization granted"),
            AuthorizationState::Denied => warn!("Alarm authorization revoked"),
            other => warn!("Alarm authorization changed to {other:?}"),
        }
        match self.last_authorization.lock() {
            Ok(mut guard) => *guard = Some(state),
            Err(poisoned) => *poisoned.into_inner() = Some(state),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Create / edit / toggle / delete
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create(&self, draft: AlarmDraft) -> Result<AlarmRecord> {
        let configuration = draft.into_configuration(self.settings().default_icon)?;
        let mut book = self.book.lock().await;
        self.submit(&mut book, Uuid::new_v4(), configuration).await
    }

    pub async fn add_alarm(
        &self,
        title: &str,
        icon: IconKind,
        time: AlarmTime,
        repeats: BTreeSet<Weekday>,
    ) -> Result<AlarmRecord> {
        self.create(AlarmDraft::alarm(title, icon, time, repeats)).await
    }

    pub async fn add_timer(&self, title: &str, icon: IconKind, duration_ms: u64) -> Result<AlarmRecord> {
        self.create(AlarmDraft::timer(title, icon, duration_ms)).await
    }

    pub async fn add_custom(
        &self,
        title: &str,
        icon: IconKind,
        schedule: Option<Schedule>,
        countdown_ms: u64,
        snooze_ms: u64,
    ) -> Result<AlarmRecord> {
        self.create(AlarmDraft::custom(title, icon, schedule, countdown_ms, snooze_ms))
            .await
    }

    /// Start a new timer from a recent timer's title, icon and duration.
    pub async fn restart_timer(&self, recent_id: Uuid) -> Result<AlarmRecord> {
        let draft = {
            let book = self.book.lock().await;
            let recent = book
                .recent
                .iter()
                .find(|record| record.id() == recent_id && record.kind() == AlarmKind::Timer)
                .ok_or(AlarmError::AlarmNotFound(recent_id))?;
            AlarmDraft::timer(
                recent.title(),
                recent.icon(),
                recent.timer_duration_ms().unwrap_or(0),
            )
        };
        self.create(draft).await
    }

    /// Running alarms are cancelled and scheduled again under the same id.
    /// Recent alarms are reactivated with the new configuration; the recent
    /// entry only goes away once scheduling succeeds.
    pub async fn edit(&self, id: Uuid, draft: AlarmDraft) -> Result<AlarmRecord> {
        let configuration = draft.into_configuration(self.settings().default_icon)?;
        let mut book = self.book.lock().await;

        if let Some(index) = book.running_index(id) {
            self.service.cancel(id).await?;
            book.running.remove(index);
            self.commit(&mut book).await?;
            return self.submit(&mut book, id, configuration).await;
        }

        if let Some(index) = book.recent_index(id) {
            // Only alarms and custom alarms can be reactivated from recent.
            if book.recent[index].kind() == AlarmKind::Timer
                || configuration.kind() == AlarmKind::Timer
            {
                return Err(AlarmError::AlarmNotFound(id));
            }
            info!("Reactivating edited alarm {id}");
            return self.submit(&mut book, id, configuration).await;
        }

        Err(AlarmError::AlarmNotFound(id))
    }

    /// Move an alarm or custom alarm between running and recent.
    pub async fn toggle(&self, id: Uuid) -> Result<AlarmRecord> {
        let mut book = self.book.lock().await;
        self.toggle_locked(&mut book, id).await
    }

    async fn toggle_locked(&self, book: &mut AlarmBook, id: Uuid) -> Result<AlarmRecord> {
        let toggles = |record: &AlarmRecord| record.kind() != AlarmKind::Timer;

        if let Some(index) = book.running_index(id).filter(|i| toggles(&book.running[*i])) {
            self.service.cancel(id).await?;
            let record = book.running.remove(index);
            push_recent(&mut book.recent, record);
            self.commit(book).await?;
            info!("Deactivated alarm {id}");
            return book
                .recent
                .last()
                .cloned()
                .ok_or(AlarmError::AlarmNotFound(id));
        }

        if let Some(index) = book.recent_index(id).filter(|i| toggles(&book.recent[*i])) {
            let recent = &book.recent[index];
            let configuration = AlarmConfiguration::new(
                recent.schedule().cloned(),
                recent.countdown_duration().copied(),
                recent.metadata().restamped(Utc::now()),
            );
            info!("Reactivating alarm {id}");
            return self.submit(book, id, configuration).await;
        }

        Err(AlarmError::AlarmNotFound(id))
    }

    /// Remove an alarm for good, cancelling it remotely if it is running.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut book = self.book.lock().await;

        if let Some(index) = book.running_index(id) {
            self.service.cancel(id).await?;
            book.running.remove(index);
        } else if let Some(index) = book.recent_index(id) {
            book.recent.remove(index);
        } else {
            return Err(AlarmError::AlarmNotFound(id));
        }

        info!("Deleted alarm {id}");
        self.commit(&mut book).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Countdown control
    // ─────────────────────────────────────────────────────────────────────

    pub async fn pause(&self, id: Uuid) -> Result<AlarmRecord> {
        let mut book = self.book.lock().await;
        self.running_or_missing(&book, id)?;
        self.service.pause(id).await?;
        self.apply_status(&mut book, id, AlarmStatus::Paused).await
    }

    pub async fn resume(&self, id: Uuid) -> Result<AlarmRecord> {
        let mut book = self.book.lock().await;
        self.running_or_missing(&book, id)?;
        self.service.resume(id).await?;
        self.apply_status(&mut book, id, AlarmStatus::Countdown).await
    }

    /// Snooze an alerting alarm, or repeat an alerting timer.
    pub async fn repeat(&self, id: Uuid) -> Result<AlarmRecord> {
        let mut book = self.book.lock().await;
        self.running_or_missing(&book, id)?;
        self.service.countdown(id).await?;
        self.apply_status(&mut book, id, AlarmStatus::Countdown).await
    }

    /// Stop an alerting alarm.
    pub async fn stop(&self, id: Uuid) -> Result<()> {
        let book = self.book.lock().await;
        let index = self.running_or_missing(&book, id)?;

        // The service's stop does not delete a one-shot alarm that has a
        // schedule, so one-shots are cancelled instead.
        if book.running[index].is_one_shot() {
            debug!("Stopping one-shot alarm {id} by cancelling it");
            self.service.cancel(id).await?;
        } else {
            self.service.stop(id).await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn running_or_missing(&self, book: &AlarmBook, id: Uuid) -> Result<usize> {
        book.running_index(id).ok_or(AlarmError::AlarmNotFound(id))
    }

    /// Optimistic status update; the next snapshot corrects it if wrong.
    async fn apply_status(
        &self,
        book: &mut AlarmBook,
        id: Uuid,
        status: AlarmStatus,
    ) -> Result<AlarmRecord> {
        let index = self.running_or_missing(book, id)?;
        book.running[index].apply_status(status, Utc::now());
        debug!("Alarm {id} optimistically set to {}", status.as_str());
        let record = book.running[index].clone();
        self.commit(book).await?;
        Ok(record)
    }

    async fn check_authorization(&self) -> Result<()> {
        if self.last_authorization() == Some(AuthorizationState::Denied) {
            return Err(AlarmError::NotAuthorized);
        }
        match self.service.authorization_state() {
            AuthorizationState::Authorized => Ok(()),
            AuthorizationState::Denied => Err(AlarmError::NotAuthorized),
            AuthorizationState::NotDetermined => {
                match self.service.request_authorization().await? {
                    AuthorizationState::Authorized => Ok(()),
                    _ => Err(AlarmError::NotAuthorized),
                }
            }
            AuthorizationState::Unknown => Err(AlarmError::UnknownAuthorizationState),
        }
    }

    /// Schedule `configuration` remotely and record the result as running.
    async fn submit(
        &self,
        book: &mut AlarmBook,
        id: Uuid,
        configuration: AlarmConfiguration,
    ) -> Result<AlarmRecord> {
        self.check_authorization().await?;
        let metadata = configuration.metadata.clone();
        let remote = self.service.schedule(id, configuration).await?;

        let record = AlarmRecord::new(remote, metadata, Utc::now());
        let kind = record.kind();
        book.running.retain(|existing| existing.id() != id);
        book.running.insert(0, record.clone());

        match kind {
            AlarmKind::Timer => {
                if !book.recent.iter().any(|recent| recent.same_template(&record)) {
                    // Fresh id: the running timer keeps its own.
                    let seed = RemoteAlarm {
                        id: Uuid::new_v4(),
                        ..record.remote().clone()
                    };
                    push_recent(
                        &mut book.recent,
                        AlarmRecord::archived(seed, record.metadata().clone()),
                    );
                }
            }
            AlarmKind::Alarm | AlarmKind::Custom => {
                book.recent.retain(|existing| existing.id() != id);
            }
        }

        info!("Scheduled {:?} {id} ({})", kind, record.title());
        self.commit(book).await?;
        Ok(record)
    }

    /// Persist both collections in full.
    async fn commit(&self, book: &mut AlarmBook) -> Result<()> {
        self.synced_revision
            .store(self.service.revision(), Ordering::SeqCst);
        let evicted = trim_recent(&mut book.recent, self.settings().recent_limit.max(1));
        if !evicted.is_empty() {
            debug!("Evicted {} recent alarms", evicted.len());
        }
        self.store.save_running(&book.running).await?;
        self.store.save_recent(&book.recent).await?;
        Ok(())
    }
}
