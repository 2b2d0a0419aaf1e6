//! Indexing lifecycle as a pure reducer over poll results
//!
//! The polling task owns a [`ProgressTracker`] and feeds it every poll
//! outcome; the tracker decides the phase and whether this poll completed
//! the run. Keeping it free of timers lets the rules be tested directly.

use serde::{Deserialize, Serialize};

use crate::api::{ApiError, IndexProgress};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MonitorPhase {
    #[default]
    Idle,
    Polling,
    /// Last poll failed; polling goes on and the next success recovers
    Unreachable,
    Completed,
}

impl MonitorPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, MonitorPhase::Polling | MonitorPhase::Unreachable)
    }
}

/// What a single poll changed
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    None,
    /// The run finished; emitted at most once per `begin`
    Completed(IndexProgress),
    BecameUnreachable,
    Recovered,
}

/// Published monitor state
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProgressView {
    pub phase: MonitorPhase,
    /// Last snapshot that was read successfully
    pub snapshot: Option<IndexProgress>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    phase: MonitorPhase,
    snapshot: Option<IndexProgress>,
    last_error: Option<String>,
    completion_fired: bool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue from a previously published view (the snapshot carries over)
    pub fn from_view(view: ProgressView) -> Self {
        Self {
            phase: view.phase,
            snapshot: view.snapshot,
            last_error: view.last_error,
            completion_fired: view.phase == MonitorPhase::Completed,
        }
    }

    /// Enter `Polling` for a new job and re-arm the completion signal
    pub fn begin(&mut self) {
        self.phase = MonitorPhase::Polling;
        self.last_error = None;
        self.completion_fired = false;
    }

    /// Back to `Idle` unless the run already completed
    pub fn halt(&mut self) {
        if self.phase.is_active() {
            self.phase = MonitorPhase::Idle;
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn snapshot(&self) -> Option<&IndexProgress> {
        self.snapshot.as_ref()
    }

    pub fn apply(&mut self, poll: Result<IndexProgress, ApiError>) -> Transition {
        if !self.phase.is_active() {
            return Transition::None;
        }

        match poll {
            Ok(progress) => {
                let was_unreachable = self.phase == MonitorPhase::Unreachable;
                let completes = progress.has_finished() && !self.completion_fired;
                self.snapshot = Some(progress.clone());
                self.last_error = None;

                if completes {
                    self.completion_fired = true;
                    self.phase = MonitorPhase::Completed;
                    return Transition::Completed(progress);
                }

                self.phase = MonitorPhase::Polling;
                if was_unreachable {
                    Transition::Recovered
                } else {
                    Transition::None
                }
            }
            Err(error) => {
                // Snapshot stays as it was
                self.last_error = Some(error.to_string());
                if self.phase == MonitorPhase::Polling {
                    self.phase = MonitorPhase::Unreachable;
                    Transition::BecameUnreachable
                } else {
                    Transition::None
                }
            }
        }
    }

    pub fn view(&self) -> ProgressView {
        ProgressView {
            phase: self.phase,
            snapshot: self.snapshot.clone(),
            last_error: self.last_error.clone(),
        }
    }
}
