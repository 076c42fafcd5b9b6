// src/lib.rs
//
// Crate root: public re-exports.
//
// caboodle moves pipeline artifacts between object storage and local disk.
// The heart of it is `sync`: list a remote folder once, then download every
// object either one at a time or in sequential chunks of gated concurrent jobs.

pub mod constants;
pub mod error;
pub mod uri_utils;
pub mod object_store;
pub mod file_store;

// Google Cloud Storage backend (feature-gated)
#[cfg(feature = "gcs")]
pub mod gcs_client;

pub mod path_mapper;
pub mod directory;
pub mod fetcher;
pub mod concurrency;
pub mod progress;
pub mod sync;
pub mod transfer;

pub use error::{ErrorKind, FetchError, SyncError, TransferCause};
pub use object_store::{
    ByteStream,
    ObjectStore,
    RemoteObject,
    Scheme,
    StorageBackend,
    infer_scheme,
    store_for_uri,
};
pub use file_store::FileSystemObjectStore;
#[cfg(feature = "gcs")]
pub use gcs_client::GcsObjectStore;

pub use concurrency::{AdmissionGate, BatchScheduler, JobFailure, JobState, TransferJob};
pub use fetcher::{BlobFetcher, FetchOutcome};
pub use path_mapper::{map_destination, sublength_for_folder};
pub use progress::ProgressTracker;
pub use sync::{SyncDownloader, SyncOptions, SyncResult};
pub use transfer::{
    UploadOptions,
    UploadResult,
    check_for_files,
    download_to_memory,
    download_to_path,
    list_names,
    upload_all,
    upload_string,
};
pub use uri_utils::{RemoteLocation, parse_gcs_path, parse_remote_uri};
