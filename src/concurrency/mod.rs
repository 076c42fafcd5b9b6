// src/concurrency/mod.rs
//
// Admission control and chunked dispatch for bulk transfers.

pub mod gate;
pub mod job;
pub mod scheduler;

pub use gate::{AdmissionGate, GatePermit};
pub use job::{JobState, TransferJob};
pub use scheduler::{
    BatchOutcome, BatchScheduler, JobFailure, JobWorker, chunk_count, chunk_sizes, partition_chunks,
};
