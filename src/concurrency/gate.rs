// src/concurrency/gate.rs
//
// Admission gate: a counting semaphore bounding in-flight transfers across a
// whole sync, with in-flight and high-water-mark accounting.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate shared by every worker of one sync.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    max: usize,
    metrics: Arc<GateMetrics>,
}

#[derive(Debug, Default)]
struct GateMetrics {
    /// Current in-flight operations
    inflight: AtomicUsize,
    /// Highest in-flight count observed
    peak: AtomicUsize,
}

impl AdmissionGate {
    /// Gate admitting at most `max` holders (at least one).
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
            metrics: Arc::new(GateMetrics::default()),
        }
    }

    /// Gate sized `min(max_concurrency, total_jobs)`.
    pub fn for_jobs(max_concurrency: usize, total_jobs: usize) -> Self {
        Self::new(max_concurrency.min(total_jobs))
    }

    /// Wait for a slot. Returns `None` once the gate has been closed.
    pub async fn acquire(&self) -> Option<GatePermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        Some(self.admit(permit))
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> GatePermit {
        let now = self.metrics.inflight.fetch_add(1, Ordering::AcqRel) + 1;
        self.metrics.peak.fetch_max(now, Ordering::AcqRel);
        GatePermit {
            _permit: permit,
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Refuse all further admissions. Holders keep their slots until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Highest number of simultaneous holders seen so far.
    pub fn peak(&self) -> usize {
        self.metrics.peak.load(Ordering::Acquire)
    }
}

/// A held gate slot. Released on drop, whatever the outcome of the work.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    metrics: Arc<GateMetrics>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.metrics.inflight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sized_by_min_of_limit_and_jobs() {
        assert_eq!(AdmissionGate::for_jobs(10, 3).max(), 3);
        assert_eq!(AdmissionGate::for_jobs(4, 100).max(), 4);
        assert_eq!(AdmissionGate::for_jobs(10, 0).max(), 1);
    }

    #[tokio::test]
    async fn permits_release_on_drop_and_track_peak() {
        let gate = AdmissionGate::new(2);
        let a = gate.acquire().await.unwrap();
        let b = gate.acquire().await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(20), gate.acquire()).await;
        assert!(blocked.is_err());

        drop(a);
        let c = gate.acquire().await.unwrap();
        drop(b);
        drop(c);
        assert_eq!(gate.metrics.inflight.load(Ordering::Acquire), 0);
        assert_eq!(gate.peak(), 2);
    }

    #[tokio::test]
    async fn closed_gate_admits_nobody() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire().await.unwrap();
        gate.close();
        assert!(gate.acquire().await.is_none());
        drop(held);
        assert_eq!(gate.metrics.inflight.load(Ordering::Acquire), 0);
    }
}
