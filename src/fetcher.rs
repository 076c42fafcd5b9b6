// src/fetcher.rs
//
// Single-object download into a local file, with one retry on corruption.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::concurrency::TransferJob;
use crate::constants::{DEFAULT_FETCH_TIMEOUT, MAX_FETCH_ATTEMPTS};
use crate::error::{FetchError, SyncError};
use crate::object_store::{ObjectStore, RemoteObject};

/// Result of one fetch attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    Success { bytes: u64 },
    /// Not retried: not-found, permission, network, timeout.
    TransientError(FetchError),
    /// Integrity failure; eligible for the single retry.
    CorruptionError(FetchError),
}

impl FetchOutcome {
    fn from_error(err: FetchError) -> Self {
        if err.is_corruption() {
            FetchOutcome::CorruptionError(err)
        } else {
            FetchOutcome::TransientError(err)
        }
    }
}

/// Where a failure inside an attempt came from.
enum Step {
    Remote(FetchError),
    Local(std::io::Error),
}

/// Streams objects into local files.
#[derive(Debug, Clone)]
pub struct BlobFetcher {
    timeout: Duration,
    verify_size: bool,
}

impl Default for BlobFetcher {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            verify_size: true,
        }
    }
}

impl BlobFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, ..Self::default() }
    }

    /// Treat a byte count that differs from the listed size as corruption.
    pub fn verify_size(mut self, verify: bool) -> Self {
        self.verify_size = verify;
        self
    }

    /// One attempt: open the object's stream, truncate `dest`, copy, flush.
    ///
    /// `dest` is only touched once the store has produced a stream, so an
    /// object that cannot be opened leaves no file behind. Local I/O failures
    /// are returned as `Err`; remote failures are folded into the outcome.
    /// Expiry of the per-call timeout is a `TransientError`.
    pub async fn attempt(
        &self,
        store: &dyn ObjectStore,
        object: &RemoteObject,
        dest: &Path,
    ) -> Result<FetchOutcome, SyncError> {
        let local_io = |source| SyncError::LocalIo { path: dest.to_path_buf(), source };

        let transfer = async {
            let mut stream = store.fetch(object).await.map_err(Step::Remote)?;
            let mut file = File::create(dest).await.map_err(Step::Local)?;
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(Step::Remote)?;
                file.write_all(&chunk).await.map_err(Step::Local)?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(Step::Local)?;
            Ok::<u64, Step>(written)
        };

        let outcome = match tokio::time::timeout(self.timeout, transfer).await {
            Err(_) => FetchOutcome::TransientError(FetchError::Timeout(self.timeout)),
            Ok(Err(Step::Local(source))) => return Err(local_io(source)),
            Ok(Err(Step::Remote(err))) => FetchOutcome::from_error(err),
            Ok(Ok(bytes)) if self.verify_size && bytes != object.size => {
                FetchOutcome::CorruptionError(FetchError::Corruption(format!(
                    "size mismatch for {}: expected {} bytes, got {}",
                    object.name, object.size, bytes
                )))
            }
            Ok(Ok(bytes)) => FetchOutcome::Success { bytes },
        };
        Ok(outcome)
    }

    /// Run a job to a terminal result, updating its attempt count.
    ///
    /// Corruption is retried exactly once from a truncated file; everything
    /// else fails immediately. A partial file is left in place on failure.
    pub async fn fetch_job(
        &self,
        store: &dyn ObjectStore,
        job: &mut TransferJob,
    ) -> Result<u64, SyncError> {
        loop {
            job.attempt_count += 1;
            debug!(
                "Downloading {} to {} (attempt {})",
                job.name(),
                job.destination.display(),
                job.attempt_count
            );

            match self.attempt(store, &job.remote, &job.destination).await? {
                FetchOutcome::Success { bytes } => {
                    debug!(
                        "Downloaded {} to {} ({} bytes)",
                        job.name(),
                        job.destination.display(),
                        bytes
                    );
                    return Ok(bytes);
                }
                FetchOutcome::CorruptionError(err) if job.attempt_count < MAX_FETCH_ATTEMPTS => {
                    warn!("Corrupted transfer of {}, retrying: {}", job.name(), err);
                }
                FetchOutcome::CorruptionError(err) | FetchOutcome::TransientError(err) => {
                    return Err(SyncError::transfer(job.name(), &err));
                }
            }
        }
    }

    /// Convenience wrapper for a single object and a known destination path.
    pub async fn fetch_to_path(
        &self,
        store: &dyn ObjectStore,
        object: RemoteObject,
        dest: PathBuf,
    ) -> Result<u64, SyncError> {
        let mut job = TransferJob::new(object, dest);
        self.fetch_job(store, &mut job).await
    }
}
