//! Progress reporter implementation
//!
//! A single indicatif bar advanced once per completed task, with the
//! failure count in its message.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const BAR_TEMPLATE: &str =
    "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} tasks ({percent}%, ETA {eta}) {msg}";

/// Progress reporter for task dispatches
pub struct ProgressReporter {
    /// Task progress bar
    bar: ProgressBar,
    /// Start time
    start_time: Instant,
    /// Tasks that completed successfully
    succeeded: AtomicU64,
    /// Tasks that completed with a failure
    failed: AtomicU64,
    /// Is progress enabled
    enabled: AtomicBool,
}

impl ProgressReporter {
    /// Create a new progress reporter drawing to stderr
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        Self {
            bar,
            start_time: Instant::now(),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Create a disabled progress reporter (for quiet mode)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.enabled.store(false, Ordering::SeqCst);
        reporter.bar.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Add a batch of tasks to the total
    pub fn add_total(&self, tasks: u64) {
        self.bar.inc_length(tasks);
    }

    /// Record one completed task
    pub fn record(&self, success: bool) {
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
            self.bar.set_message(format!("{} failed", failed));
        }
        self.bar.inc(1);
    }

    /// Run `f` with the bar hidden so it can write to the terminal
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }

    /// Finish the bar, leaving it on screen
    pub fn finish(&self) {
        self.bar.finish();
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Check if progress is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Get progress summary
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            total: self.bar.length().unwrap_or(0),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a dispatch's progress
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    /// Tasks in the dispatch
    pub total: u64,
    /// Tasks that succeeded
    pub succeeded: u64,
    /// Tasks that failed
    pub failed: u64,
    /// Time since the reporter was created
    pub elapsed: Duration,
}

impl ProgressSummary {
    /// Tasks completed so far
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// One-line summary for the end of a run
    pub fn describe(&self) -> String {
        format!(
            "{}/{} tasks completed, {} failed, in {:.2?}",
            self.completed(),
            self.total,
            self.failed,
            self.elapsed
        )
    }
}
