use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::{stream::BoxStream, StreamExt};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::remote::{AlarmUpdate, AuthorizationState};

use super::AlarmCoordinator;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const RESUBSCRIBE_DELAY: Duration = Duration::from_millis(200);

/// Keeps the coordinator in step with the remote service's update streams.
pub struct SyncController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SyncController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    /// True while the sync task is alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Subscribe to both streams and start applying their events.
    ///
    /// Subscription happens before this returns, so no change made after
    /// `start` is missed.
    pub fn start(&mut self, coordinator: AlarmCoordinator) -> Result<()> {
        if self.handle.is_some() {
            bail!("alarm sync already active");
        }

        let service = coordinator.service();
        let alarms = service.alarm_updates();
        let authorization = service.authorization_updates();

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sync_loop(
            coordinator,
            alarms,
            authorization,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("Alarm sync started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("alarm sync task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new()
    }
}

async fn sync_loop(
    coordinator: AlarmCoordinator,
    mut alarms: BoxStream<'static, AlarmUpdate>,
    mut authorization: BoxStream<'static, AuthorizationState>,
    cancel_token: CancellationToken,
) {
    let mut authorization_open = true;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("alarm sync loop shutting down");
                break;
            }
            update = alarms.next() => match update {
                Some(update) => {
                    log_debug!(
                        "remote update {} with {} alarms",
                        update.revision,
                        update.alarms.len()
                    );
                    if let Err(err) = coordinator.apply_remote_update(&update).await {
                        log_error!("failed to apply remote alarm update: {err:#}");
                    }
                }
                None => {
                    log_warn!("remote alarm updates ended, resubscribing");
                    let cancelled = tokio::select! {
                        _ = cancel_token.cancelled() => true,
                        _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => false,
                    };
                    if cancelled {
                        log_info!("alarm sync loop shutting down");
                        break;
                    }

                    // Subscribe before listing so nothing falls in between.
                    alarms = coordinator.service().alarm_updates();
                    if let Err(err) = coordinator.refresh().await {
                        log_error!("failed to catch up after resubscribing: {err:#}");
                    }
                }
            },
            state = authorization.next(), if authorization_open => match state {
                Some(state) => coordinator.note_authorization(state),
                None => authorization_open = false,
            },
        }
    }
}
