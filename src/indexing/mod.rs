pub mod format;
pub mod monitor;
pub mod tracker;

pub use format::format_duration;
pub use monitor::{CompletionCallback, ProgressMonitor, DEFAULT_POLL_INTERVAL};
pub use tracker::{MonitorPhase, ProgressTracker, ProgressView, Transition};
