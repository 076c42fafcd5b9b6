// src/uri_utils.rs
//! Storage URI parsing.
//!
//! Two forms are understood:
//!
//! - `gs://bucket/folder/sub` (or `gcs://`) → container `bucket`, path `folder/sub`
//! - `file:///data/root` → container `/data/root`, path empty. A local directory
//!   plays the role of a bucket; keys are paths relative to it.
//! - `file:///data/root#runs/7` → container `/data/root`, path `runs/7`. The
//!   fragment selects a folder or object key inside the directory.

use anyhow::{Result, bail};

use crate::constants::{FILE_SCHEME, GCS_SCHEME, GCS_SCHEME_ALT};
use crate::object_store::{Scheme, infer_scheme};

/// A parsed storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub scheme: Scheme,
    /// Bucket name, or root directory for `file://`
    pub container: String,
    /// Folder / key prefix inside the container, without a leading `/`
    pub path: String,
}

/// Strip stray quotes that shells and config files tend to leave around URIs.
fn clean(uri: &str) -> String {
    uri.replace(['"', '\''], "")
}

/// Parse a `gs://{bucket}/{path}` string into bucket and path components.
///
/// ```
/// use caboodle::uri_utils::parse_gcs_path;
///
/// let (bucket, path) = parse_gcs_path("gs://my-bucket/runs/7/model.bin").unwrap();
/// assert_eq!(bucket, "my-bucket");
/// assert_eq!(path, "runs/7/model.bin");
/// ```
pub fn parse_gcs_path(gcs_path: &str) -> Result<(String, String)> {
    let uri = clean(gcs_path);
    let rest = uri
        .strip_prefix(GCS_SCHEME)
        .or_else(|| uri.strip_prefix(GCS_SCHEME_ALT));
    let Some(rest) = rest else {
        bail!(
            "Argument must be a gcs path string of the form gs://{{bucket-name}}/{{path}}, got: {gcs_path}"
        );
    };

    let (bucket, path) = match rest.split_once('/') {
        Some((b, p)) => (b, p),
        None => (rest, ""),
    };
    if bucket.is_empty() {
        bail!("Missing bucket name in {gcs_path}");
    }
    Ok((bucket.to_string(), normalize_key(path)))
}

/// Drop empty segments: `a//b/` becomes `a/b`.
fn normalize_key(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse any supported storage URI.
pub fn parse_remote_uri(uri: &str) -> Result<RemoteLocation> {
    let cleaned = clean(uri);
    match infer_scheme(&cleaned) {
        Scheme::Gcs => {
            let (container, path) = parse_gcs_path(&cleaned)?;
            Ok(RemoteLocation { scheme: Scheme::Gcs, container, path })
        }
        Scheme::File => {
            let rest = &cleaned[FILE_SCHEME.len()..];
            let (root, key) = rest.split_once('#').unwrap_or((rest, ""));
            if root.is_empty() {
                bail!("Missing directory in {uri}");
            }
            Ok(RemoteLocation {
                scheme: Scheme::File,
                container: root.to_string(),
                path: normalize_key(key),
            })
        }
        Scheme::Unknown => {
            bail!("Unable to infer backend from URI: {uri}. Supported schemes: gs://, file://")
        }
    }
}
