//! Progress reporting for long-running construction tasks.

use log::info;

/// Receives named phase transitions from construction tasks.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, task: &str, step: &str);
}

/// Logs each phase at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn progress(&self, task: &str, step: &str) {
        info!("{task}: {step}");
    }
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&self, _task: &str, _step: &str) {}
}
