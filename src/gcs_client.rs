// src/gcs_client.rs
//
// Google Cloud Storage backend using the gcloud-storage crate.
// Authentication follows Application Default Credentials (ADC), or anonymous
// access when an emulator endpoint is configured.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use gcloud_storage::client::{Client, ClientConfig};
use gcloud_storage::http::Error as GcsError;
use gcloud_storage::http::objects::download::Range;
use gcloud_storage::http::objects::get::GetObjectRequest;
use gcloud_storage::http::objects::list::ListObjectsRequest;
use gcloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::{ENV_GCS_ENDPOINT_URL, ENV_STORAGE_EMULATOR_HOST};
use crate::error::FetchError;
use crate::object_store::{ByteStream, ObjectStore, RemoteObject};

/// Map a client error onto the fetch taxonomy.
fn classify(err: GcsError) -> FetchError {
    match err {
        GcsError::Response(resp) => match resp.code {
            404 => FetchError::NotFound(resp.message),
            401 | 403 => FetchError::PermissionDenied(resp.message),
            code => FetchError::Network(format!("HTTP {code}: {}", resp.message)),
        },
        other => FetchError::Network(other.to_string()),
    }
}

/// Custom endpoint for fake-gcs-server or other emulators/proxies.
fn custom_endpoint() -> Option<String> {
    std::env::var(ENV_GCS_ENDPOINT_URL).ok().or_else(|| {
        // GCS emulator convention: STORAGE_EMULATOR_HOST=host:port
        std::env::var(ENV_STORAGE_EMULATOR_HOST).ok().map(|host| {
            if host.starts_with("http://") || host.starts_with("https://") {
                host
            } else {
                format!("http://{}", host)
            }
        })
    })
}

/// One bucket of Google Cloud Storage exposed as an [`ObjectStore`].
pub struct GcsObjectStore {
    client: Arc<Client>,
    bucket: String,
}

impl GcsObjectStore {
    /// Create a store for `bucket`.
    ///
    /// Credentials are discovered from `GOOGLE_APPLICATION_CREDENTIALS`, the
    /// metadata server, or gcloud CLI credentials. When `GCS_ENDPOINT_URL` or
    /// `STORAGE_EMULATOR_HOST` is set, anonymous auth against that endpoint is used.
    pub async fn new(bucket: &str) -> Result<Self> {
        let config = if let Some(endpoint) = custom_endpoint() {
            info!("Using custom GCS endpoint: {}", endpoint);
            ClientConfig {
                storage_endpoint: endpoint,
                ..ClientConfig::default()
            }
            .anonymous()
        } else {
            debug!("Initializing GCS client with Application Default Credentials");
            ClientConfig::default()
                .with_auth()
                .await
                .map_err(|e| {
                    anyhow!(
                        "Failed to initialize GCS authentication: {}. Try setting \
                         GOOGLE_APPLICATION_CREDENTIALS to point to your service account key file.",
                        e
                    )
                })?
        };

        Ok(Self::with_client(Arc::new(Client::new(config)), bucket))
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Arc<Client>, bucket: &str) -> Self {
        Self { client, bucket: bucket.to_string() }
    }

    fn get_request(&self, name: &str) -> GetObjectRequest {
        GetObjectRequest {
            bucket: self.bucket.clone(),
            object: name.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, FetchError> {
        debug!("GCS LIST: bucket={}, prefix={:?}", self.bucket, prefix);

        let mut results = Vec::new();
        let mut page_token: Option<String> = None;

        // Pagination loop - GCS returns max 1000 objects per page by default
        loop {
            let request = ListObjectsRequest {
                bucket: self.bucket.clone(),
                prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
                page_token: page_token.clone(),
                ..Default::default()
            };

            let response = self.client.list_objects(&request).await.map_err(classify)?;

            if let Some(items) = response.items {
                debug!("GCS LIST page received: {} objects", items.len());
                results.extend(
                    items
                        .into_iter()
                        .map(|obj| RemoteObject::new(obj.name, obj.size.max(0) as u64)),
                );
            }

            match response.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!("GCS LIST success: {} objects", results.len());
        Ok(results)
    }

    async fn fetch(&self, object: &RemoteObject) -> Result<ByteStream, FetchError> {
        debug!("GCS GET: bucket={}, object={}", self.bucket, object.name);
        let stream = self
            .client
            .download_streamed_object(&self.get_request(&object.name), &Range::default())
            .await
            .map_err(classify)?;
        Ok(Box::pin(stream.map_err(classify)))
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<(), FetchError> {
        debug!("GCS PUT: bucket={}, object={}, size={}", self.bucket, name, data.len());
        let upload_type = UploadType::Simple(Media::new(name.to_string()));
        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data.to_vec(),
                &upload_type,
            )
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, FetchError> {
        match self.client.get_object(&self.get_request(name)).await.map_err(classify) {
            Ok(_) => Ok(true),
            Err(FetchError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
