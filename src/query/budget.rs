//! Wall-clock budget for one search.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Deadline checked cooperatively between units of work.
///
/// Once expired the budget stays expired, even if the clock is later read
/// as being before the deadline.
#[derive(Debug)]
pub struct SearchBudget {
    start: Instant,
    deadline: Instant,
    expired: AtomicBool,
}

impl SearchBudget {
    pub fn new(timeout: Duration) -> Self {
        let start = Instant::now();
        // Timeouts too large to represent never expire in practice.
        let deadline = start
            .checked_add(timeout)
            .unwrap_or_else(|| start + Duration::from_secs(u32::MAX as u64));
        SearchBudget {
            start,
            deadline,
            expired: AtomicBool::new(false),
        }
    }

    pub fn has_time_left(&self) -> bool {
        if self.expired.load(Ordering::Relaxed) {
            return false;
        }
        if Instant::now() >= self.deadline {
            self.expired.store(true, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Whether the deadline was hit at any check so far.
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Relaxed)
    }

    pub fn time_left(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn limit(&self) -> Duration {
        self.deadline - self.start
    }
}
