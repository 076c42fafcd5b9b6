// src/sync.rs
//
// Folder-to-path synchronisation: the composition root of the download engine.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::concurrency::{
    BatchOutcome, BatchScheduler, JobFailure, JobState, JobWorker, TransferJob,
};
use crate::constants::{DEFAULT_CHUNK_COUNT_HINT, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CONCURRENCY};
use crate::directory::ensure_parent_dirs;
use crate::error::SyncError;
use crate::fetcher::BlobFetcher;
use crate::object_store::{ObjectStore, RemoteObject};
use crate::path_mapper::{map_destination, sublength_for_folder};
use crate::progress::ProgressTracker;

/// Options for a folder sync.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Keep only objects whose name ends with this suffix
    pub suffix: Option<String>,
    /// Drop remote sub-folders; every file lands directly in the local root
    pub flatten: bool,
    /// Use the chunked concurrent scheduler instead of one-at-a-time
    pub concurrent: bool,
    /// Upper bound on in-flight fetches (concurrent mode)
    pub max_concurrency: usize,
    /// Divisor for the chunk count (concurrent mode)
    pub chunk_count_hint: usize,
    /// Per-fetch timeout
    pub fetch_timeout: Duration,
    /// Treat a size different from the listing as corruption
    pub verify_size: bool,
    /// Stops admission of further jobs when cancelled
    pub cancel: Option<CancellationToken>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            suffix: None,
            flatten: false,
            concurrent: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            chunk_count_hint: DEFAULT_CHUNK_COUNT_HINT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            verify_size: true,
            cancel: None,
        }
    }
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn chunk_count_hint(mut self, hint: usize) -> Self {
        self.chunk_count_hint = hint;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn verify_size(mut self, verify: bool) -> Self {
        self.verify_size = verify;
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Outcome of a sync.
#[derive(Debug, Default)]
pub struct SyncResult {
    /// Objects selected for transfer after filtering
    pub listed: usize,
    pub succeeded: usize,
    /// Every failed object with its error, so callers can retry just those
    pub failed: Vec<JobFailure>,
    /// Objects never attempted (fail-fast stop or cancellation)
    pub not_started: usize,
    pub total_bytes: u64,
    /// Chunks dispatched (concurrent mode; 0 for a sequential run)
    pub chunks_run: usize,
    /// Most downloads in flight at once
    pub peak_inflight: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.not_started == 0 && !self.cancelled
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.name.as_str()).collect()
    }

    fn absorb(&mut self, outcome: BatchOutcome) {
        self.succeeded += outcome.succeeded;
        self.total_bytes += outcome.bytes;
        self.failed.extend(outcome.failures);
        self.not_started += outcome.not_started;
        self.chunks_run += outcome.chunks_run;
        self.peak_inflight = self.peak_inflight.max(outcome.peak_inflight);
        self.cancelled |= outcome.cancelled;
    }
}

/// Per-object work: map the key, prepare parents, fetch.
struct DownloadWorker {
    store: Arc<dyn ObjectStore>,
    fetcher: BlobFetcher,
    local_root: PathBuf,
    flatten: bool,
    sublength: usize,
}

#[async_trait]
impl JobWorker for DownloadWorker {
    fn destination(&self, object: &RemoteObject) -> PathBuf {
        map_destination(&object.name, &self.local_root, self.flatten, self.sublength)
    }

    async fn process(&self, job: &mut TransferJob) -> Result<u64, SyncError> {
        ensure_parent_dirs(&job.destination).await?;
        self.fetcher.fetch_job(self.store.as_ref(), job).await
    }
}

/// Downloads a remote folder to a local path.
///
/// The store is injected so any backend (or a test fake) can be used.
#[derive(Clone)]
pub struct SyncDownloader {
    store: Arc<dyn ObjectStore>,
}

impl SyncDownloader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Sync `remote_folder` into `local_root` with a silent progress counter.
    pub async fn sync(
        &self,
        remote_folder: &str,
        local_root: impl AsRef<Path>,
        options: &SyncOptions,
    ) -> Result<SyncResult, SyncError> {
        self.sync_with_progress(remote_folder, local_root, options, ProgressTracker::new)
            .await
    }

    /// Like [`sync`](Self::sync); `make_progress` receives the job count once
    /// the listing is known and returns the tracker to update.
    ///
    /// Only a listing failure is returned as `Err`. Job failures are collected
    /// in [`SyncResult::failed`]: sequential mode stops at the first one,
    /// concurrent mode finishes the current chunk and then stops.
    pub async fn sync_with_progress<P>(
        &self,
        remote_folder: &str,
        local_root: impl AsRef<Path>,
        options: &SyncOptions,
        make_progress: P,
    ) -> Result<SyncResult, SyncError>
    where
        P: FnOnce(u64) -> ProgressTracker,
    {
        let start = Instant::now();
        let local_root = local_root.as_ref();

        let objects = self.select_objects(remote_folder, options).await?;
        info!(
            "Syncing {} objects from '{}' to {} ({})",
            objects.len(),
            remote_folder,
            local_root.display(),
            if options.concurrent { "concurrent" } else { "sequential" }
        );

        let progress = make_progress(objects.len() as u64);
        let worker = Arc::new(DownloadWorker {
            store: Arc::clone(&self.store),
            fetcher: BlobFetcher::new(options.fetch_timeout).verify_size(options.verify_size),
            local_root: local_root.to_path_buf(),
            flatten: options.flatten,
            sublength: sublength_for_folder(remote_folder),
        });

        let mut result = SyncResult { listed: objects.len(), ..Default::default() };
        if options.concurrent {
            let scheduler = BatchScheduler::new(options.max_concurrency, options.chunk_count_hint);
            let outcome = scheduler
                .run(objects, worker, &progress, options.cancel.as_ref())
                .await;
            result.absorb(outcome);
        } else {
            let outcome =
                run_sequential(objects, worker.as_ref(), &progress, options.cancel.as_ref()).await;
            result.absorb(outcome);
        }
        result.elapsed = start.elapsed();

        info!(
            "Sync of '{}' finished: {} succeeded, {} failed, {} not started in {:.2}s",
            remote_folder,
            result.succeeded,
            result.failed.len(),
            result.not_started,
            result.elapsed.as_secs_f64()
        );
        Ok(result)
    }

    /// List once, then drop folder markers and apply the suffix filter.
    async fn select_objects(
        &self,
        remote_folder: &str,
        options: &SyncOptions,
    ) -> Result<Vec<RemoteObject>, SyncError> {
        let listed = self
            .store
            .list(remote_folder)
            .await
            .map_err(|source| SyncError::Listing { prefix: remote_folder.to_string(), source })?;
        let before = listed.len();

        let objects: Vec<RemoteObject> = listed
            .into_iter()
            .filter(|o| !o.is_directory_marker())
            .filter(|o| options.suffix.as_deref().is_none_or(|s| o.name.ends_with(s)))
            .collect();
        debug!("Listed {} objects under '{}', {} selected", before, remote_folder, objects.len());
        Ok(objects)
    }
}

/// One job at a time in listing order; the first failure stops the run.
async fn run_sequential(
    objects: Vec<RemoteObject>,
    worker: &DownloadWorker,
    progress: &ProgressTracker,
    cancel: Option<&CancellationToken>,
) -> BatchOutcome {
    let total = objects.len();
    let mut outcome = BatchOutcome::default();

    for (index, object) in objects.into_iter().enumerate() {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            outcome.cancelled = true;
            outcome.not_started = total - index;
            break;
        }

        let destination = worker.destination(&object);
        let mut job = TransferJob::new(object, destination);
        job.state = JobState::InFlight;
        outcome.peak_inflight = 1;
        let result = worker.process(&mut job).await;
        progress.report_completed(1);
        job.state = if result.is_ok() { JobState::Done } else { JobState::Failed };
        debug!("{} ended {:?} after {} attempt(s)", job.name(), job.state, job.attempt_count);

        match result {
            Ok(bytes) => {
                progress.add_bytes(bytes);
                outcome.succeeded += 1;
                outcome.bytes += bytes;
            }
            Err(error) => {
                warn!("Failed to download {}: {}; stopping", job.name(), error);
                outcome.failures.push(JobFailure {
                    attempts: job.attempt_count,
                    name: job.remote.name,
                    error,
                });
                outcome.not_started = total - index - 1;
                break;
            }
        }
    }
    outcome
}
