// src/directory.rs
//
// Parent-directory preparation for download destinations.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::trace;

use crate::error::SyncError;

/// Ensure every ancestor directory of `file_path` exists.
///
/// Ancestors are created one at a time from the shallowest to the deepest, so
/// each `create_dir` has an existing parent. An `AlreadyExists` failure is
/// accepted when the path now is a directory (another worker won the race);
/// anything else is a [`SyncError::DirectoryCreation`] naming the offending path.
pub async fn ensure_parent_dirs(file_path: &Path) -> Result<(), SyncError> {
    let Some(parent) = file_path.parent() else {
        return Ok(());
    };

    let mut ancestors: Vec<PathBuf> = parent
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .collect();
    ancestors.reverse();

    for dir in ancestors {
        if is_dir(&dir).await {
            continue;
        }
        match fs::create_dir(&dir).await {
            Ok(()) => trace!("created directory {}", dir.display()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && is_dir(&dir).await => {}
            Err(source) => return Err(SyncError::DirectoryCreation { path: dir, source }),
        }
    }
    Ok(())
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}
