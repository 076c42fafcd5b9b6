// src/error.rs
//
// Error taxonomy for listing, directory preparation and blob transfer.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a storage backend for a single list/fetch/put call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Transfer-integrity failure (checksum or size mismatch). Retried once.
    #[error("data corruption: {0}")]
    Corruption(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// The cause tag surfaced to callers of a sync.
    pub fn cause(&self) -> TransferCause {
        match self {
            FetchError::NotFound(_) => TransferCause::NotFound,
            FetchError::PermissionDenied(_) => TransferCause::PermissionDenied,
            FetchError::Corruption(_) => TransferCause::Corruption,
            FetchError::Timeout(_) => TransferCause::Timeout,
            FetchError::Network(_) | FetchError::Other(_) => TransferCause::NetworkError,
        }
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, FetchError::Corruption(_))
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => FetchError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::TimedOut => FetchError::Network(format!("timed out: {err}")),
            _ => FetchError::Other(err.to_string()),
        }
    }
}

/// Why a transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferCause {
    NotFound,
    PermissionDenied,
    Corruption,
    Timeout,
    NetworkError,
}

impl fmt::Display for TransferCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferCause::NotFound => "not-found",
            TransferCause::PermissionDenied => "permission-denied",
            TransferCause::Corruption => "corruption",
            TransferCause::Timeout => "timeout",
            TransferCause::NetworkError => "network-error",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by a folder sync.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Listing the remote folder failed. Aborts the whole sync.
    #[error("failed to list objects under '{prefix}': {source}")]
    Listing {
        prefix: String,
        #[source]
        source: FetchError,
    },

    /// An ancestor directory of a destination could not be created.
    #[error("could not create directory {}: {source}", .path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The object could not be transferred.
    #[error("transfer of '{name}' failed ({cause}): {message}")]
    Transfer {
        name: String,
        cause: TransferCause,
        message: String,
    },

    /// The destination file could not be opened or written.
    #[error("local I/O error on {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A worker task ended without reporting a result (panic or abort).
    #[error("worker for '{name}' aborted: {message}")]
    Worker { name: String, message: String },
}

impl SyncError {
    pub(crate) fn transfer(name: &str, err: &FetchError) -> Self {
        SyncError::Transfer {
            name: name.to_string(),
            cause: err.cause(),
            message: err.to_string(),
        }
    }

    /// Coarse kind for reporting and for selecting what to retry.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Listing { .. } => ErrorKind::Listing,
            SyncError::DirectoryCreation { .. } => ErrorKind::DirectoryCreation,
            SyncError::Transfer { cause, .. } => ErrorKind::Transfer(*cause),
            SyncError::LocalIo { .. } => ErrorKind::LocalIo,
            SyncError::Worker { .. } => ErrorKind::Worker,
        }
    }
}

/// Flat error kind carried in a [`crate::concurrency::JobFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Listing,
    DirectoryCreation,
    Transfer(TransferCause),
    LocalIo,
    Worker,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Listing => f.write_str("listing"),
            ErrorKind::DirectoryCreation => f.write_str("directory-creation"),
            ErrorKind::Transfer(cause) => write!(f, "transfer/{cause}"),
            ErrorKind::LocalIo => f.write_str("local-io"),
            ErrorKind::Worker => f.write_str("worker"),
        }
    }
}
