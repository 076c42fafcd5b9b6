// src/file_store.rs
//
// FileSystemObjectStore implementation for POSIX file I/O
// A local directory is treated as a flat object namespace: every regular file
// below the root is an object whose name is its `/`-joined relative path.

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::FetchError;
use crate::object_store::{ByteStream, ObjectStore, RemoteObject};

/// FileSystem adapter that implements ObjectStore over a root directory.
///
/// Name Mapping:
/// - `folder/sub/file.ext` -> `<root>/folder/sub/file.ext`
/// - names containing `..` or absolute components are rejected
#[derive(Debug, Clone)]
pub struct FileSystemObjectStore {
    root: PathBuf,
}

impl FileSystemObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert an object name to a filesystem path under the root
    fn name_to_path(&self, name: &str) -> Result<PathBuf, FetchError> {
        let rel = Path::new(name);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(FetchError::PermissionDenied(format!(
                "object name escapes store root: {name}"
            )));
        }
        Ok(self.root.join(rel))
    }

    /// Recursively collect files in a directory
    async fn collect_files_recursive(
        dir: &Path,
        prefix: &str,
        results: &mut Vec<RemoteObject>,
    ) -> Result<(), FetchError> {
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                debug!("skipping non-UTF-8 entry under {}", dir.display());
                continue;
            };
            let key = if prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{}/{}", prefix, file_name)
            };

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                Box::pin(Self::collect_files_recursive(&entry.path(), &key, results)).await?;
            } else if file_type.is_file() {
                let size = entry.metadata().await?.len();
                results.push(RemoteObject::new(key, size));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FileSystemObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, FetchError> {
        if !fs::try_exists(&self.root).await? {
            return Err(FetchError::NotFound(format!("store root {}", self.root.display())));
        }
        let mut all = Vec::new();
        Self::collect_files_recursive(&self.root, "", &mut all).await?;

        let mut matched: Vec<RemoteObject> = all
            .into_iter()
            .filter(|o| o.name.starts_with(prefix))
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("file LIST {} prefix={:?}: {} objects", self.root.display(), prefix, matched.len());
        Ok(matched)
    }

    async fn fetch(&self, object: &RemoteObject) -> Result<ByteStream, FetchError> {
        let path = self.name_to_path(&object.name)?;
        let file = fs::File::open(&path).await?;
        let stream = ReaderStream::new(file).map_err(FetchError::from);
        Ok(Box::pin(stream))
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<(), FetchError> {
        let path = self.name_to_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data).await?;
        debug!("file PUT {}: {} bytes", path.display(), data.len());
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, FetchError> {
        let path = self.name_to_path(name)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn list_is_sorted_and_prefix_filtered() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = FileSystemObjectStore::new(dir.path());
        store.put("data/b.txt", Bytes::from_static(b"bb")).await?;
        store.put("data/a/c.txt", Bytes::from_static(b"ccc")).await?;
        store.put("other/x.txt", Bytes::from_static(b"x")).await?;

        let listed = store.list("data").await?;
        let names: Vec<_> = listed.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["data/a/c.txt", "data/b.txt"]);
        assert_eq!(listed[0].size, 3);

        assert_eq!(store.list("").await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn fetch_and_get_round_trip() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = FileSystemObjectStore::new(dir.path());
        store.put("k/v.bin", Bytes::from_static(b"payload")).await?;

        let obj = RemoteObject::new("k/v.bin", 7);
        assert_eq!(store.get(&obj).await?.as_ref(), b"payload");
        assert!(store.exists("k/v.bin").await?);
        assert!(!store.exists("k/missing.bin").await?);
        Ok(())
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileSystemObjectStore::new(dir.path());
        let err = store.fetch(&RemoteObject::new("nope", 0)).await.err().unwrap();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn escaping_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileSystemObjectStore::new(dir.path());
        let err = store.put("../evil", Bytes::new()).await.err().unwrap();
        assert!(matches!(err, FetchError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn missing_root_fails_listing() {
        let store = FileSystemObjectStore::new("/definitely/not/here/caboodle");
        assert!(matches!(store.list("").await, Err(FetchError::NotFound(_))));
    }
}
