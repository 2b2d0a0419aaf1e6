//! Progress monitor - polls the indexing job on a fixed cadence
//!
//! One background task per run. The first poll happens immediately, then
//! one per interval tick. The task ends when the run completes or when
//! the monitor is stopped; a failed poll never ends it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{Acknowledgement, ApiError, IndexProgress, IndexService};

use super::tracker::{ProgressTracker, ProgressView, Transition};

/// Dashboard cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Invoked once with the final snapshot of a completed run
pub type CompletionCallback = Box<dyn FnOnce(IndexProgress) + Send + 'static>;

struct PollTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ProgressMonitor {
    service: Arc<dyn IndexService>,
    interval: Duration,
    state: Arc<watch::Sender<ProgressView>>,
    /// Bumped on every start and stop; only the current run may publish
    generation: Arc<AtomicU64>,
    task: Mutex<Option<PollTask>>,
}

impl ProgressMonitor {
    pub fn new(service: Arc<dyn IndexService>, interval: Duration) -> Self {
        let (state, _) = watch::channel(ProgressView::default());
        Self {
            service,
            interval: interval.max(Duration::from_millis(1)),
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling for a new run, replacing any poll task already running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, on_complete: Option<CompletionCallback>) {
        self.stop();

        let run = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut tracker = ProgressTracker::from_view(self.view());
        tracker.begin();
        self.state.send_replace(tracker.view());

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.service),
            self.interval,
            Publisher {
                state: Arc::clone(&self.state),
                generation: Arc::clone(&self.generation),
                run,
            },
            tracker,
            cancel_token.clone(),
            on_complete,
        ));

        log::info!("Progress monitor started ({}ms interval)", self.interval.as_millis());
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(PollTask {
            cancel_token,
            handle,
        });
    }

    /// Follow a job started elsewhere
    ///
    /// Returns `false` and leaves the running task alone if already polling.
    pub fn attach(&self, on_complete: Option<CompletionCallback>) -> bool {
        if self.is_polling() {
            log::debug!("Progress monitor already polling, not attaching");
            return false;
        }
        log::info!("Attaching progress monitor to running job");
        self.start(on_complete);
        true
    }

    /// Stop polling; a completed run stays `Completed`
    pub fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            self.generation.fetch_add(1, Ordering::SeqCst);
            task.cancel_token.cancel();
            let mut tracker = ProgressTracker::from_view(self.view());
            tracker.halt();
            self.state.send_replace(tracker.view());
        }
    }

    /// Forward a cancel request to the service
    ///
    /// The phase is untouched; polling continues until the service
    /// reports the job stopped.
    pub async fn request_cancel(&self) -> Result<Acknowledgement, ApiError> {
        log::info!("Requesting indexing cancellation");
        let ack = self.service.cancel_indexing().await?;
        log::debug!("Cancellation acknowledged: {}", ack.status);
        Ok(ack)
    }

    pub fn is_polling(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn view(&self) -> ProgressView {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressView> {
        self.state.subscribe()
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            task.cancel_token.cancel();
        }
    }
}

/// Write side of the view for one run
struct Publisher {
    state: Arc<watch::Sender<ProgressView>>,
    generation: Arc<AtomicU64>,
    run: u64,
}

impl Publisher {
    /// Publish unless a later start or stop superseded this run
    fn publish(&self, view: ProgressView) -> bool {
        self.state.send_if_modified(|slot| {
            if self.generation.load(Ordering::SeqCst) != self.run {
                return false;
            }
            *slot = view;
            true
        })
    }
}

async fn poll_loop(
    service: Arc<dyn IndexService>,
    interval: Duration,
    publisher: Publisher,
    mut tracker: ProgressTracker,
    cancel_token: CancellationToken,
    mut on_complete: Option<CompletionCallback>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let poll = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            result = service.progress() => result,
        };
        if cancel_token.is_cancelled() {
            break;
        }

        let transition = tracker.apply(poll);
        if !publisher.publish(tracker.view()) {
            log::debug!("Progress run {} superseded, dropping poll", publisher.run);
            break;
        }

        match transition {
            Transition::Completed(progress) => {
                log::info!(
                    "Indexing completed: {} processed, {} skipped, {} failed",
                    progress.processed,
                    progress.skipped,
                    progress.failed
                );
                if let Some(callback) = on_complete.take() {
                    callback(progress);
                }
                break;
            }
            Transition::BecameUnreachable => {
                log::warn!(
                    "Progress poll failed, backend unreachable: {}",
                    tracker.view().last_error.unwrap_or_default()
                );
            }
            Transition::Recovered => log::info!("Progress polling recovered"),
            Transition::None => {}
        }
    }

    log::debug!("Progress poll loop exited in phase {:?}", tracker.phase());
}
