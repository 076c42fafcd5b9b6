// src/path_mapper.rs
//
// Mapping from flat remote keys to local destination paths.

use std::path::{Path, PathBuf};

/// Number of leading key segments that belong to the sync folder itself.
///
/// `"runs/7"` and `"/runs/7/"` both give 2, so `runs/7/out/a.bin` lands at
/// `<root>/out/a.bin`. Empty segments are not counted.
pub fn sublength_for_folder(folder: &str) -> usize {
    folder.split('/').filter(|s| !s.is_empty()).count()
}

/// Map remote key `key` to a path below `local_root`.
///
/// With `flatten`, only the final segment is kept, so distinct keys sharing a
/// basename collide and the later download overwrites the earlier one.
/// Otherwise the first `sublength` segments are dropped and the rest are
/// joined below `local_root`; if nothing is left the result is `local_root`.
///
/// Empty, `.` and `..` segments are skipped so a key can never climb out of
/// `local_root`.
pub fn map_destination(key: &str, local_root: &Path, flatten: bool, sublength: usize) -> PathBuf {
    let segments: Vec<&str> = key.split('/').collect();
    let kept: &[&str] = if flatten {
        &segments[segments.len() - 1..]
    } else {
        segments.get(sublength..).unwrap_or(&[])
    };

    let mut path = local_root.to_path_buf();
    for seg in kept.iter().filter(|s| !s.is_empty() && **s != "." && **s != "..") {
        path.push(seg);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_keeps_basename_only() {
        let root = Path::new("/dst");
        assert_eq!(map_destination("a/b/c.txt", root, true, 0), PathBuf::from("/dst/c.txt"));
        assert_eq!(map_destination("x/c.txt", root, true, 5), PathBuf::from("/dst/c.txt"));
        assert_eq!(map_destination("plain", root, true, 0), PathBuf::from("/dst/plain"));
    }

    #[test]
    fn hierarchy_preserved_below_sublength() {
        let root = Path::new("/dst");
        assert_eq!(map_destination("a/b/c.txt", root, false, 1), PathBuf::from("/dst/b/c.txt"));
        assert_eq!(map_destination("a/b/c.txt", root, false, 0), PathBuf::from("/dst/a/b/c.txt"));
        assert_eq!(map_destination("a/b/c.txt", root, false, 2), PathBuf::from("/dst/c.txt"));
    }

    #[test]
    fn sublength_past_end_maps_to_root() {
        let root = Path::new("/dst");
        assert_eq!(map_destination("a/b", root, false, 2), PathBuf::from("/dst"));
        assert_eq!(map_destination("a/b", root, false, 9), PathBuf::from("/dst"));
    }

    #[test]
    fn dot_segments_cannot_escape() {
        let root = Path::new("/dst");
        assert_eq!(
            map_destination("a/../../etc/passwd", root, false, 1),
            PathBuf::from("/dst/etc/passwd")
        );
        assert_eq!(map_destination("a//b", root, false, 0), PathBuf::from("/dst/a/b"));
    }

    #[test]
    fn folder_sublength() {
        assert_eq!(sublength_for_folder("runs/7"), 2);
        assert_eq!(sublength_for_folder("/runs/7/"), 2);
        assert_eq!(sublength_for_folder(""), 0);
    }
}
