// src/progress.rs
//
// Whole-operation completion counter, optionally rendered as a progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type Observer = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Counts terminal jobs across every chunk of a sync.
///
/// Cheap to clone; clones share the same counter.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

struct Inner {
    completed: AtomicU64,
    bytes: AtomicU64,
    total: u64,
    bar: Option<ProgressBar>,
    observer: Option<Observer>,
}

impl ProgressTracker {
    /// Silent tracker for `total` jobs.
    pub fn new(total: u64) -> Self {
        Self::build(total, None, None)
    }

    /// Tracker drawing a bar on stderr.
    pub fn with_bar(operation: &str, total: u64) -> Self {
        let pb = ProgressBar::new(total);
        let template = format!(
            "{}: {{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} objects ({{msg}}, ETA: {{eta}})",
            operation
        );
        if let Ok(style) = ProgressStyle::default_bar().template(&template) {
            pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        Self::build(total, Some(pb), None)
    }

    /// Tracker that calls `observer(completed, total)` after every update.
    pub fn with_observer<F>(total: u64, observer: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        Self::build(total, None, Some(Box::new(observer)))
    }

    fn build(total: u64, bar: Option<ProgressBar>, observer: Option<Observer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                completed: AtomicU64::new(0),
                bytes: AtomicU64::new(0),
                total,
                bar,
                observer,
            }),
        }
    }

    /// Record `n` more terminal jobs. Returns the new running total.
    pub fn report_completed(&self, n: u64) -> u64 {
        let completed = self.inner.completed.fetch_add(n, Ordering::AcqRel) + n;
        if let Some(pb) = &self.inner.bar {
            pb.set_position(completed);
        }
        if let Some(observer) = &self.inner.observer {
            observer(completed, self.inner.total);
        }
        completed
    }

    /// Add transferred bytes (display only).
    pub fn add_bytes(&self, bytes: u64) {
        let total = self.inner.bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if let Some(pb) = &self.inner.bar {
            pb.set_message(format!("{:.2} MB", total as f64 / 1_048_576.0));
        }
    }

    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.inner.total
    }

    pub fn bytes(&self) -> u64 {
        self.inner.bytes.load(Ordering::Relaxed)
    }

    /// Finish the bar with a throughput summary.
    pub fn finish(&self, operation: &str, duration: Duration) {
        if let Some(pb) = &self.inner.bar {
            let mb = self.bytes() as f64 / 1_048_576.0;
            let secs = duration.as_secs_f64().max(f64::EPSILON);
            pb.finish_with_message(format!(
                "{} complete! {:.2} MB in {:.2}s ({:.2} MB/s)",
                operation,
                mb,
                duration.as_secs_f64(),
                mb / secs
            ));
        }
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("completed", &self.completed())
            .field("total", &self.total())
            .finish()
    }
}
