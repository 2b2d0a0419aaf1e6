//! Backend reachability
//!
//! `probe_health` bounds the service ping with a timeout and maps every
//! failure to "unreachable". `BackendWatcher` repeats the probe on a slow
//! cadence and, while the backend answers, refreshes the index totals.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::IndexService;

pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Status bar cadence
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// `true` only if the service answered within `timeout`
pub async fn probe_health(service: &dyn IndexService, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, service.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::debug!("Health probe failed: {}", e);
            false
        }
        Err(_) => {
            log::debug!("Health probe timed out after {:?}", timeout);
            false
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BackendStatus {
    pub reachable: bool,
    pub total_indexed: u64,
    pub is_indexing: bool,
}

/// One probe plus follow-up reads
///
/// Follow-up failures keep the values from `previous`.
pub async fn check_backend(
    service: &dyn IndexService,
    timeout: Duration,
    previous: &BackendStatus,
) -> BackendStatus {
    let mut status = previous.clone();
    status.reachable = probe_health(service, timeout).await;
    if !status.reachable {
        return status;
    }

    match service.stats().await {
        Ok(stats) => status.total_indexed = stats.total_files,
        Err(e) => log::debug!("Stats refresh failed: {}", e),
    }
    match service.progress().await {
        Ok(progress) => status.is_indexing = progress.is_running,
        Err(e) => log::debug!("Progress refresh failed: {}", e),
    }

    status
}

pub struct BackendWatcher {
    state: watch::Receiver<BackendStatus>,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackendWatcher {
    /// Spawn the watch loop; the first check runs immediately
    pub fn spawn(service: Arc<dyn IndexService>, interval: Duration, timeout: Duration) -> Self {
        let (tx, rx) = watch::channel(BackendStatus::default());
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let previous = tx.borrow().clone();
                let status = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    status = check_backend(service.as_ref(), timeout, &previous) => status,
                };

                if status.reachable != previous.reachable {
                    if status.reachable {
                        log::info!("Backend reachable ({} files indexed)", status.total_indexed);
                    } else {
                        log::warn!("Backend unreachable");
                    }
                }
                tx.send_if_modified(|current| {
                    if *current == status {
                        return false;
                    }
                    *current = status;
                    true
                });
            }
        });

        Self {
            state: rx,
            cancel_token,
            handle,
        }
    }

    pub fn status(&self) -> BackendStatus {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BackendStatus> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for BackendWatcher {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
