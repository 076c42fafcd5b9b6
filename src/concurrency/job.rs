// src/concurrency/job.rs
//
// Per-object transfer bookkeeping.

use std::path::PathBuf;

use crate::object_store::RemoteObject;

/// Lifecycle of a [`TransferJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    InFlight,
    Done,
    Failed,
}

/// One remote object bound to its local destination.
///
/// Owned by whichever worker is processing it; dropped once terminal.
#[derive(Debug)]
pub struct TransferJob {
    pub remote: RemoteObject,
    pub destination: PathBuf,
    pub state: JobState,
    /// Fetch attempts made so far (1, or 2 after a corruption retry).
    pub attempt_count: u8,
}

impl TransferJob {
    pub fn new(remote: RemoteObject, destination: PathBuf) -> Self {
        Self {
            remote,
            destination,
            state: JobState::Pending,
            attempt_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.remote.name
    }
}
