// src/concurrency/scheduler.rs
//
// Batch scheduler: sequential chunks of internally concurrent jobs.
//
// A listing of N objects is carved into `N / chunk_count_hint + 1` ordered
// chunks. Chunk K+1 starts only after every job of chunk K is terminal, and a
// chunk containing a failure stops the run before the next chunk. Inside a
// chunk, jobs are admitted in listing order through the shared AdmissionGate
// and then run concurrently.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::gate::AdmissionGate;
use super::job::{JobState, TransferJob};
use crate::error::SyncError;
use crate::object_store::RemoteObject;
use crate::progress::ProgressTracker;

/// Number of chunks for `total` items: `total / chunk_count_hint + 1`.
///
/// Note the hint is a divisor: 20 items with a hint of 5 gives 5 chunks of 4.
pub fn chunk_count(total: usize, chunk_count_hint: usize) -> usize {
    total / chunk_count_hint.max(1) + 1
}

/// Sizes of the chunks for `total` items.
///
/// Always exactly [`chunk_count`] entries summing to `total`. Chunks are filled
/// in order with `ceil(total / chunks)` items each; the last non-empty chunk
/// takes the remainder and any chunks after it are empty.
pub fn chunk_sizes(total: usize, chunk_count_hint: usize) -> Vec<usize> {
    let chunks = chunk_count(total, chunk_count_hint);
    let size = total.div_ceil(chunks);
    let mut remaining = total;
    (0..chunks)
        .map(|_| {
            let n = size.min(remaining);
            remaining -= n;
            n
        })
        .collect()
}

/// Split `items` into ordered chunks per [`chunk_sizes`].
pub fn partition_chunks<T>(items: Vec<T>, chunk_count_hint: usize) -> Vec<Vec<T>> {
    let sizes = chunk_sizes(items.len(), chunk_count_hint);
    let mut iter = items.into_iter();
    sizes
        .into_iter()
        .map(|n| iter.by_ref().take(n).collect())
        .collect()
}

/// Work performed for each admitted job.
#[async_trait]
pub trait JobWorker: Send + Sync + 'static {
    /// Local destination for `object`.
    fn destination(&self, object: &RemoteObject) -> PathBuf;

    /// Drive `job` to a terminal result. Returns bytes written.
    async fn process(&self, job: &mut TransferJob) -> Result<u64, SyncError>;
}

/// A job that ended in failure.
#[derive(Debug)]
pub struct JobFailure {
    pub name: String,
    /// Fetch attempts made before giving up (0 if it failed before fetching)
    pub attempts: u8,
    pub error: SyncError,
}

impl JobFailure {
    pub fn kind(&self) -> crate::error::ErrorKind {
        self.error.kind()
    }
}

/// What a scheduler run did.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub bytes: u64,
    /// Failures in completion order within each chunk, chunks in order.
    pub failures: Vec<JobFailure>,
    /// Jobs never admitted (later chunks after a failure, or cancellation).
    pub not_started: usize,
    /// Chunks that were dispatched.
    pub chunks_run: usize,
    /// Most jobs the gate admitted at once.
    pub peak_inflight: usize,
    pub cancelled: bool,
}

/// Sequential-chunk, gated-concurrency dispatcher.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    chunk_count_hint: usize,
    max_concurrency: usize,
}

type JobHandle = JoinHandle<(JobState, u8, Result<u64, SyncError>)>;

impl BatchScheduler {
    pub fn new(max_concurrency: usize, chunk_count_hint: usize) -> Self {
        Self { chunk_count_hint, max_concurrency }
    }

    /// Run every object of `objects` through `worker`.
    ///
    /// The gate is sized `min(max_concurrency, objects.len())` and shared by all
    /// chunks. `progress` is bumped once per terminal job. With a `cancel`
    /// token, cancellation stops admission; admitted jobs still finish.
    pub async fn run(
        &self,
        objects: Vec<RemoteObject>,
        worker: Arc<dyn JobWorker>,
        progress: &ProgressTracker,
        cancel: Option<&CancellationToken>,
    ) -> BatchOutcome {
        let total = objects.len();
        let gate = AdmissionGate::for_jobs(self.max_concurrency, total);
        let chunks = partition_chunks(objects, self.chunk_count_hint);
        let num_chunks = chunks.len();
        info!(
            "Scheduling {} objects in {} chunks, max {} in flight",
            total,
            num_chunks,
            gate.max()
        );

        let mut outcome = BatchOutcome::default();
        let mut chunks = chunks.into_iter().enumerate();

        while let Some((index, chunk)) = chunks.next() {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                outcome.cancelled = true;
                outcome.not_started += chunk.len();
                break;
            }
            if chunk.is_empty() {
                continue;
            }
            outcome.chunks_run += 1;
            debug!("Dispatching chunk {}/{} ({} jobs)", index + 1, num_chunks, chunk.len());

            let handles = self
                .dispatch_chunk(chunk, &worker, &gate, progress, cancel, &mut outcome)
                .await;
            let failures_before = outcome.failures.len();
            for (name, handle) in handles {
                self.collect(name, handle, progress, &mut outcome).await;
            }

            if outcome.failures.len() > failures_before {
                warn!(
                    "Chunk {}/{} had {} failed jobs; not starting remaining chunks",
                    index + 1,
                    num_chunks,
                    outcome.failures.len() - failures_before
                );
                break;
            }
        }

        outcome.not_started += chunks.map(|(_, c)| c.len()).sum::<usize>();
        outcome.peak_inflight = gate.peak();
        outcome
    }

    /// Admit the chunk's jobs in order, spawning each once it holds a slot.
    async fn dispatch_chunk(
        &self,
        chunk: Vec<RemoteObject>,
        worker: &Arc<dyn JobWorker>,
        gate: &AdmissionGate,
        progress: &ProgressTracker,
        cancel: Option<&CancellationToken>,
        outcome: &mut BatchOutcome,
    ) -> Vec<(String, JobHandle)> {
        let batch: Vec<TransferJob> = chunk
            .into_iter()
            .map(|object| {
                let destination = worker.destination(&object);
                TransferJob::new(object, destination)
            })
            .collect();

        let mut handles = Vec::with_capacity(batch.len());
        for mut job in batch {
            let permit = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        gate.close();
                        None
                    }
                    permit = gate.acquire() => permit,
                },
                None => gate.acquire().await,
            };
            let Some(permit) = permit else {
                outcome.cancelled = true;
                outcome.not_started += 1;
                continue;
            };

            let name = job.name().to_string();
            let worker = Arc::clone(worker);
            let progress = progress.clone();
            let handle = tokio::spawn(async move {
                job.state = JobState::InFlight;
                let result = worker.process(&mut job).await;
                drop(permit);
                job.state = if result.is_ok() { JobState::Done } else { JobState::Failed };
                if let Ok(bytes) = &result {
                    progress.add_bytes(*bytes);
                }
                progress.report_completed(1);
                (job.state, job.attempt_count, result)
            });
            handles.push((name, handle));
            tokio::task::yield_now().await;
        }
        handles
    }

    async fn collect(
        &self,
        name: String,
        handle: JobHandle,
        progress: &ProgressTracker,
        outcome: &mut BatchOutcome,
    ) {
        let joined = handle.await;
        if let Ok((state, attempts, _)) = &joined {
            debug!("{} ended {:?} after {} attempt(s)", name, state, attempts);
        }
        match joined {
            Ok((_, _, Ok(bytes))) => {
                outcome.succeeded += 1;
                outcome.bytes += bytes;
            }
            Ok((_, attempts, Err(error))) => {
                warn!("Failed to download {} after {} attempt(s): {}", name, attempts, error);
                outcome.failures.push(JobFailure { name, attempts, error });
            }
            Err(join_err) => {
                // the task never reached its progress update
                progress.report_completed(1);
                let message = join_err.to_string();
                warn!("Worker for {} aborted: {}", name, message);
                outcome.failures.push(JobFailure {
                    error: SyncError::Worker { name: name.clone(), message },
                    attempts: 0,
                    name,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_formula() {
        assert_eq!(chunk_count(20, 5), 5);
        assert_eq!(chunk_count(0, 20), 1);
        assert_eq!(chunk_count(19, 20), 1);
        assert_eq!(chunk_count(100, 20), 6);
    }

    #[test]
    fn sizes_sum_and_count() {
        for n in 0..200 {
            for c in 1..30 {
                let sizes = chunk_sizes(n, c);
                assert_eq!(sizes.len(), n / c + 1, "n={n} c={c}");
                assert_eq!(sizes.iter().sum::<usize>(), n, "n={n} c={c}");
                // full chunks first, then at most one partial, then empties
                let full = n.div_ceil(sizes.len());
                let mut seen_short = false;
                for &size in &sizes {
                    if seen_short {
                        assert_eq!(size, 0, "n={n} c={c} sizes {sizes:?}");
                    } else if size < full {
                        seen_short = true;
                    } else {
                        assert_eq!(size, full, "n={n} c={c} sizes {sizes:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn chunks_are_filled_in_order() {
        assert_eq!(chunk_sizes(10, 3), vec![3, 3, 3, 1]);
        assert_eq!(chunk_sizes(21, 5), vec![5, 5, 5, 5, 1]);
        assert_eq!(chunk_sizes(0, 20), vec![0]);

        let chunks = partition_chunks((1..=10).collect::<Vec<u32>>(), 3);
        assert_eq!(chunks, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9], vec![10]]);
    }

    #[test]
    fn partition_keeps_order() {
        let items: Vec<u32> = (0..20).collect();
        let chunks = partition_chunks(items, 5);
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0], vec![0, 1, 2, 3]);
        assert_eq!(chunks[4], vec![16, 17, 18, 19]);
        assert_eq!(chunks.concat(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn more_chunks_than_items_leaves_empty_tail() {
        let chunks = partition_chunks(vec!['a', 'b', 'c'], 1);
        assert_eq!(chunks, vec![vec!['a'], vec!['b'], vec!['c'], vec![]]);
    }
}
