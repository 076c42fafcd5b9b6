// src/transfer.rs
//
// Single-object helpers and folder upload, built on the same store seam as the
// sync engine.

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::constants::MAX_FETCH_ATTEMPTS;
use crate::directory::ensure_parent_dirs;
use crate::error::{FetchError, SyncError};
use crate::fetcher::BlobFetcher;
use crate::object_store::{ObjectStore, RemoteObject};

/// Options for [`upload_all`].
#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Overwrite objects that already exist; otherwise skip them
    pub replace: bool,
    /// Keep the local sub-path (from the uploaded directory's own name down)
    /// in the key; otherwise only the file name is used
    pub use_filepaths: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self { replace: true, use_filepaths: true }
    }
}

/// Keys written and skipped by [`upload_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
}

/// Join key segments with `/`, dropping empty ones.
fn join_key<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Find the listing entry for exactly `name`.
async fn lookup(store: &dyn ObjectStore, name: &str) -> Result<RemoteObject, SyncError> {
    let listed = store
        .list(name)
        .await
        .map_err(|source| SyncError::Listing { prefix: name.to_string(), source })?;
    listed
        .into_iter()
        .find(|o| o.name == name)
        .ok_or_else(|| SyncError::transfer(name, &FetchError::NotFound(name.to_string())))
}

/// Download one object fully into memory.
///
/// A corrupted transfer is retried once, as in a sync.
pub async fn download_to_memory(store: &dyn ObjectStore, name: &str) -> Result<Bytes, SyncError> {
    let object = lookup(store, name).await?;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match store.get(&object).await {
            Ok(data) => return Ok(data),
            Err(err) if err.is_corruption() && attempt < MAX_FETCH_ATTEMPTS => {
                debug!("Corrupted in-memory read of {}, retrying", name);
            }
            Err(err) => return Err(SyncError::transfer(name, &err)),
        }
    }
}

/// Download one object to `path`, creating parent directories.
pub async fn download_to_path(
    store: &dyn ObjectStore,
    name: &str,
    path: impl AsRef<Path>,
    fetcher: &BlobFetcher,
) -> Result<u64, SyncError> {
    let path = path.as_ref().to_path_buf();
    let object = lookup(store, name).await?;
    ensure_parent_dirs(&path).await?;
    fetcher.fetch_to_path(store, object, path).await
}

/// Store `data` under `name`.
pub async fn upload_string(
    store: &dyn ObjectStore,
    name: &str,
    data: impl Into<Bytes>,
) -> Result<()> {
    store
        .put(name, data.into())
        .await
        .with_context(|| format!("Failed to upload {name}"))
}

/// Names of every object under `folder`.
pub async fn list_names(store: &dyn ObjectStore, folder: &str) -> Result<Vec<String>> {
    let listed = store
        .list(folder)
        .await
        .with_context(|| format!("Failed to list {folder}"))?;
    Ok(listed.into_iter().map(|o| o.name).collect())
}

/// True when every name in `names` is the basename of some object under `folder`.
pub async fn check_for_files<S: AsRef<str>>(
    store: &dyn ObjectStore,
    folder: &str,
    names: &[S],
) -> Result<bool> {
    let listed = store
        .list(folder)
        .await
        .with_context(|| format!("Failed to list {folder}"))?;
    let present: HashSet<&str> = listed.iter().map(|o| o.basename()).collect();
    Ok(names.iter().all(|n| present.contains(n.as_ref())))
}

/// Recursively collect regular files below `dir`.
async fn walk_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            Box::pin(walk_files(&entry.path(), out)).await?;
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}

/// Upload a file, or every file below a directory, under `folder`.
///
/// For a directory `data/run7` containing `a/x.bin`, the key is
/// `folder/run7/a/x.bin` with `use_filepaths`, else `folder/x.bin`.
/// For a single file the key is `folder/<file name>` with `use_filepaths`,
/// else `folder` itself.
pub async fn upload_all(
    store: &dyn ObjectStore,
    local_path: impl AsRef<Path>,
    folder: &str,
    options: UploadOptions,
) -> Result<UploadResult> {
    let local_path = local_path.as_ref();
    let meta = fs::metadata(local_path).await.ok();

    let plan: Vec<(PathBuf, String)> = match meta {
        Some(m) if m.is_file() => {
            let key = if options.use_filepaths {
                let file_name = local_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                join_key([folder, file_name])
            } else {
                join_key([folder])
            };
            vec![(local_path.to_path_buf(), key)]
        }
        Some(m) if m.is_dir() => {
            let mut files = Vec::new();
            walk_files(local_path, &mut files).await?;
            files.sort();
            let top = local_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            files
                .into_iter()
                .map(|file| {
                    let rel = file.strip_prefix(local_path).unwrap_or(&file);
                    let rel = rel
                        .components()
                        .filter_map(|c| c.as_os_str().to_str())
                        .collect::<Vec<_>>()
                        .join("/");
                    let key = if options.use_filepaths {
                        join_key([folder, top, rel.as_str()])
                    } else {
                        let file_name =
                            file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                        join_key([folder, file_name])
                    };
                    (file, key)
                })
                .collect()
        }
        _ => bail!(
            "The provided path does not point to a file or directory: {}",
            local_path.display()
        ),
    };

    let mut result = UploadResult::default();
    for (file, key) in plan {
        let skip = !options.replace
            && store
                .exists(&key)
                .await
                .with_context(|| format!("Failed to check {key}"))?;
        if skip {
            info!("Skipping {}", key);
            result.skipped.push(key);
            continue;
        }
        info!("Uploading {}", file.display());
        let data = fs::read(&file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        store
            .put(&key, Bytes::from(data))
            .await
            .with_context(|| format!("Failed to upload {} as {}", file.display(), key))?;
        result.uploaded.push(key);
    }

    info!(
        "Uploaded {} files from {} under {}",
        result.uploaded.len(),
        local_path.display(),
        folder
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_store::FileSystemObjectStore;
    use tempfile::TempDir;

    fn local_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let run = dir.path().join("run7");
        std::fs::create_dir_all(run.join("a")).unwrap();
        std::fs::write(run.join("a/x.bin"), b"xx").unwrap();
        std::fs::write(run.join("top.txt"), b"top").unwrap();
        dir
    }

    #[tokio::test]
    async fn upload_directory_with_filepaths() -> Result<()> {
        let src = local_tree();
        let bucket = TempDir::new()?;
        let store = FileSystemObjectStore::new(bucket.path());

        let res =
            upload_all(&store, src.path().join("run7"), "artifacts", UploadOptions::default())
                .await?;
        assert_eq!(res.uploaded, vec!["artifacts/run7/a/x.bin", "artifacts/run7/top.txt"]);
        assert!(store.exists("artifacts/run7/a/x.bin").await?);
        Ok(())
    }

    #[tokio::test]
    async fn upload_flat_and_no_replace() -> Result<()> {
        let src = local_tree();
        let bucket = TempDir::new()?;
        let store = FileSystemObjectStore::new(bucket.path());
        store.put("out/x.bin", Bytes::from_static(b"old")).await?;

        let opts = UploadOptions { replace: false, use_filepaths: false };
        let res = upload_all(&store, src.path().join("run7"), "out", opts).await?;
        assert_eq!(res.skipped, vec!["out/x.bin"]);
        assert_eq!(res.uploaded, vec!["out/top.txt"]);
        assert_eq!(download_to_memory(&store, "out/x.bin").await?.as_ref(), b"old");
        Ok(())
    }

    #[tokio::test]
    async fn upload_single_file() -> Result<()> {
        let src = local_tree();
        let bucket = TempDir::new()?;
        let store = FileSystemObjectStore::new(bucket.path());

        let file = src.path().join("run7/top.txt");
        let res = upload_all(&store, &file, "one", UploadOptions::default()).await?;
        assert_eq!(res.uploaded, vec!["one/top.txt"]);
        let exact = UploadOptions { replace: true, use_filepaths: false };
        let res = upload_all(&store, &file, "exact/key.txt", exact).await?;
        assert_eq!(res.uploaded, vec!["exact/key.txt"]);
        Ok(())
    }

    #[tokio::test]
    async fn upload_missing_path_fails() {
        let bucket = TempDir::new().unwrap();
        let store = FileSystemObjectStore::new(bucket.path());
        let res = upload_all(&store, "/no/such/caboodle/path", "x", UploadOptions::default()).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn single_object_helpers() -> Result<()> {
        let bucket = TempDir::new()?;
        let local = TempDir::new()?;
        let store = FileSystemObjectStore::new(bucket.path());
        upload_string(&store, "cfg/params.json", "{\"lr\":0.1}").await?;
        upload_string(&store, "cfg/seed.txt", "42").await?;

        assert_eq!(download_to_memory(&store, "cfg/seed.txt").await?.as_ref(), b"42");
        let dest = local.path().join("nested/params.json");
        let n = download_to_path(&store, "cfg/params.json", &dest, &BlobFetcher::default()).await?;
        assert_eq!(n, 10);
        assert_eq!(std::fs::read_to_string(dest)?, "{\"lr\":0.1}");

        assert_eq!(list_names(&store, "cfg").await?, vec!["cfg/params.json", "cfg/seed.txt"]);
        assert!(check_for_files(&store, "cfg", &["seed.txt", "params.json"]).await?);
        assert!(!check_for_files(&store, "cfg", &["missing.txt"]).await?);

        let err = download_to_memory(&store, "cfg/nope").await.unwrap_err();
        use crate::error::{ErrorKind, TransferCause};
        assert_eq!(err.kind(), ErrorKind::Transfer(TransferCause::NotFound));
        Ok(())
    }
}
