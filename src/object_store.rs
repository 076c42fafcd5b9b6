// src/object_store.rs
//
// Object-store seam consumed by the sync engine.
// Supported schemes: gs:// (feature `gcs`), file://
//
// The engine only needs three things from a backend: a complete listing of a
// folder, a byte stream per object, and (for the upload helpers) put/exists.

use anyhow::{Result, bail};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, TryStreamExt};

use crate::constants::{FILE_SCHEME, GCS_SCHEME, GCS_SCHEME_ALT};
use crate::error::FetchError;
use crate::file_store::FileSystemObjectStore;
use crate::uri_utils::{RemoteLocation, parse_remote_uri};

#[cfg(feature = "gcs")]
use crate::gcs_client::GcsObjectStore;

/// Stream of object bytes. A `FetchError` item ends the transfer.
pub type ByteStream = BoxStream<'static, std::result::Result<Bytes, FetchError>>;

/// One entry of a listing: a flat, slash-delimited key and its size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub name: String,
    pub size: u64,
}

impl RemoteObject {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self { name: name.into(), size }
    }

    /// Final path segment of the key.
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Zero-length "folder" placeholders some consoles create.
    pub fn is_directory_marker(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// Routing tag inferred from a URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Gcs,
    File,
    Unknown,
}

/// Best-effort scheme inference from a URI.
pub fn infer_scheme(uri: &str) -> Scheme {
    if uri.starts_with(GCS_SCHEME) || uri.starts_with(GCS_SCHEME_ALT) { Scheme::Gcs }
    else if uri.starts_with(FILE_SCHEME) { Scheme::File }
    else { Scheme::Unknown }
}

/// ObjectStore trait for pluggable storage backends.
///
/// Names are keys relative to the store's container (bucket or root directory).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object whose name starts with `prefix`, in name order.
    /// The listing is complete; pagination is the backend's business.
    async fn list(&self, prefix: &str) -> std::result::Result<Vec<RemoteObject>, FetchError>;

    /// Open a byte stream for one object.
    async fn fetch(&self, object: &RemoteObject) -> std::result::Result<ByteStream, FetchError>;

    /// Store `data` under `name`, replacing any existing object.
    async fn put(&self, name: &str, data: Bytes) -> std::result::Result<(), FetchError>;

    /// Check if an object exists.
    async fn exists(&self, name: &str) -> std::result::Result<bool, FetchError>;

    /// Get entire object into memory.
    async fn get(&self, object: &RemoteObject) -> std::result::Result<Bytes, FetchError> {
        let stream = self.fetch(object).await?;
        let buf = stream
            .try_fold(BytesMut::with_capacity(object.size as usize), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;
        Ok(buf.freeze())
    }
}

/// Closed set of concrete backends, resolved once at configuration time.
pub enum StorageBackend {
    Local(FileSystemObjectStore),
    #[cfg(feature = "gcs")]
    Gcs(GcsObjectStore),
}

impl StorageBackend {
    /// Build the backend for a parsed location.
    pub async fn open(location: &RemoteLocation) -> Result<Self> {
        match location.scheme {
            Scheme::File => {
                Ok(StorageBackend::Local(FileSystemObjectStore::new(&location.container)))
            }
            #[cfg(feature = "gcs")]
            Scheme::Gcs => Ok(StorageBackend::Gcs(GcsObjectStore::new(&location.container).await?)),
            #[cfg(not(feature = "gcs"))]
            Scheme::Gcs => bail!("gs:// support requires building with the `gcs` feature"),
            Scheme::Unknown => {
                bail!("Unable to infer backend for container {}", location.container)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Local(_) => "file",
            #[cfg(feature = "gcs")]
            StorageBackend::Gcs(_) => "gcs",
        }
    }

    fn inner(&self) -> &dyn ObjectStore {
        match self {
            StorageBackend::Local(s) => s,
            #[cfg(feature = "gcs")]
            StorageBackend::Gcs(s) => s,
        }
    }
}

#[async_trait]
impl ObjectStore for StorageBackend {
    async fn list(&self, prefix: &str) -> std::result::Result<Vec<RemoteObject>, FetchError> {
        self.inner().list(prefix).await
    }

    async fn fetch(&self, object: &RemoteObject) -> std::result::Result<ByteStream, FetchError> {
        self.inner().fetch(object).await
    }

    async fn put(&self, name: &str, data: Bytes) -> std::result::Result<(), FetchError> {
        self.inner().put(name, data).await
    }

    async fn exists(&self, name: &str) -> std::result::Result<bool, FetchError> {
        self.inner().exists(name).await
    }
}

/// Convenience factory: parse `uri`, open its backend, and return it along
/// with the folder prefix inside the container.
pub async fn store_for_uri(uri: &str) -> Result<(StorageBackend, String)> {
    let location = parse_remote_uri(uri)?;
    let store = StorageBackend::open(&location).await?;
    Ok((store, location.path))
}
