use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Counters shared by every task of one pipeline run.
#[derive(Debug)]
pub struct PipelineStats {
    enqueued: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    batches: AtomicU64,
    progress_reports: AtomicU64,
    started: OnceLock<Instant>,
}

/// Final (or intermediate) view of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub enqueued: u64,
    pub published: u64,
    pub failed: u64,
    pub skipped: u64,
    pub batches: u64,
    pub elapsed: Duration,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            progress_reports: AtomicU64::new(0),
            started: OnceLock::new(),
        }
    }

    /// Starts the run clock. Later calls keep the first start time.
    pub fn mark_started(&self) {
        self.started.get_or_init(Instant::now);
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `count` published records and returns the previous and new totals.
    pub fn record_published(&self, count: u64) -> (u64, u64) {
        let previous = self.published.fetch_add(count, Ordering::Relaxed);
        (previous, previous + count)
    }

    pub fn record_failed(&self, count: u64) {
        self.failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_skipped(&self, count: u64) {
        self.skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_progress_report(&self) {
        self.progress_reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Progress log lines emitted so far.
    pub fn progress_reports(&self) -> u64 {
        self.progress_reports.load(Ordering::Relaxed)
    }

    /// Time since [`mark_started`](Self::mark_started); zero before that.
    pub fn elapsed(&self) -> Duration {
        self.started
            .get()
            .map(Instant::elapsed)
            .unwrap_or(Duration::ZERO)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    /// Published records per second.
    pub fn throughput(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.published as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// True when going from `previous` to `current` passed a multiple of `step`.
pub fn crossed_step(previous: u64, current: u64, step: u64) -> bool {
    step > 0 && previous / step != current / step
}
