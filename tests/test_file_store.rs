// tests/test_file_store.rs
//
// Upload a local tree into a file:// store and sync it back down.

use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;

use caboodle::{
    BlobFetcher, ObjectStore, SyncDownloader, SyncOptions, UploadOptions, check_for_files,
    download_to_path, list_names, store_for_uri, upload_all,
};

fn seed_tree(root: &std::path::Path) -> Result<()> {
    let run = root.join("run7");
    std::fs::create_dir_all(run.join("ckpt/step-100"))?;
    std::fs::write(run.join("params.json"), "{}")?;
    std::fs::write(run.join("ckpt/step-100/model.bin"), vec![7u8; 4096])?;
    std::fs::write(run.join("ckpt/step-100/optim.bin"), vec![1u8; 512])?;
    Ok(())
}

#[tokio::test]
async fn test_upload_then_sync_round_trip() -> Result<()> {
    let src = TempDir::new()?;
    let bucket = TempDir::new()?;
    let dest = TempDir::new()?;
    seed_tree(src.path())?;

    let uri = format!("file://{}", bucket.path().display());
    let (store, prefix) = store_for_uri(&uri).await?;
    assert_eq!(prefix, "");

    let uploaded =
        upload_all(&store, src.path().join("run7"), "experiments", UploadOptions::default())
            .await?;
    assert_eq!(uploaded.uploaded.len(), 3);
    assert!(check_for_files(&store, "experiments/run7", &["params.json", "model.bin"]).await?);
    assert_eq!(list_names(&store, "experiments/run7/ckpt").await?.len(), 2);

    let downloader = SyncDownloader::new(Arc::new(store));
    let opts = SyncOptions::new().concurrent(true).max_concurrency(2).chunk_count_hint(1);
    let result = downloader.sync("experiments/run7", dest.path(), &opts).await?;

    assert!(result.is_success());
    assert_eq!(result.succeeded, 3);
    assert_eq!(result.total_bytes, 2 + 4096 + 512);
    assert_eq!(std::fs::read(dest.path().join("ckpt/step-100/model.bin"))?, vec![7u8; 4096]);
    assert_eq!(std::fs::read_to_string(dest.path().join("params.json"))?, "{}");
    Ok(())
}

#[tokio::test]
async fn test_suffix_sync_into_existing_tree() -> Result<()> {
    let src = TempDir::new()?;
    let bucket = TempDir::new()?;
    let dest = TempDir::new()?;
    seed_tree(src.path())?;
    std::fs::create_dir_all(dest.path().join("ckpt"))?;

    let uri = format!("file://{}", bucket.path().display());
    let (store, _) = store_for_uri(&uri).await?;
    upload_all(&store, src.path().join("run7"), "", UploadOptions::default()).await?;

    let downloader = SyncDownloader::new(Arc::new(store));
    let opts = SyncOptions::new().suffix(".bin");
    let result = downloader.sync("run7", dest.path(), &opts).await?;

    assert_eq!(result.listed, 2);
    assert!(dest.path().join("ckpt/step-100/optim.bin").is_file());
    assert!(!dest.path().join("params.json").exists());
    assert!(downloader.store().exists("run7/params.json").await?);
    Ok(())
}

#[tokio::test]
async fn test_file_uri_folder_prefix() -> Result<()> {
    let bucket = TempDir::new()?;
    let (store, _) = store_for_uri(&format!("file://{}", bucket.path().display())).await?;
    assert_eq!(store.name(), "file");
    assert!(list_names(&store, "missing/").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_file_uri_fragment_selects_folder_and_object() -> Result<()> {
    let src = TempDir::new()?;
    let bucket = TempDir::new()?;
    let dest = TempDir::new()?;
    seed_tree(src.path())?;

    let root = format!("file://{}", bucket.path().display());
    let (store, _) = store_for_uri(&root).await?;
    upload_all(&store, src.path().join("run7"), "", UploadOptions::default()).await?;

    let (store, folder) = store_for_uri(&format!("{root}#run7/ckpt")).await?;
    assert_eq!(folder, "run7/ckpt");
    let result = SyncDownloader::new(Arc::new(store))
        .sync(&folder, dest.path().join("ckpt"), &SyncOptions::new())
        .await?;
    assert_eq!(result.succeeded, 2);
    assert!(dest.path().join("ckpt/step-100/model.bin").is_file());

    let (store, key) = store_for_uri(&format!("{root}#run7/params.json")).await?;
    let out = dest.path().join("params.json");
    let n = download_to_path(&store, &key, &out, &BlobFetcher::default()).await?;
    assert_eq!(n, 2);
    assert_eq!(std::fs::read_to_string(out)?, "{}");
    Ok(())
}
