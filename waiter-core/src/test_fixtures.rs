//! Test fixtures for media library testing.
//!
//! Provides a temporary media root with the standard mount layout and sparse
//! media files, so size thresholds can be exercised without writing gigabytes.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

/// Creates a temporary media root containing `Movies` and `tv shows`.
///
/// # Panics
///
/// Panics if the temporary directory or its subdirectories cannot be created.
/// This is acceptable in test fixtures where failures indicate environment issues.
pub fn create_media_root() -> tempfile::TempDir {
    let temp_dir = tempfile::tempdir().unwrap();
    create_dir_all(temp_dir.path().join("Movies")).unwrap();
    create_dir_all(temp_dir.path().join("tv shows")).unwrap();
    temp_dir
}

/// Creates a sparse file of `size` bytes at `root/relative`, with parent directories.
///
/// # Panics
///
/// Panics if the file cannot be created or resized.
pub fn create_media_file(root: &Path, relative: &str, size: u64) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        create_dir_all(parent).unwrap();
    }
    File::create(&path).unwrap().set_len(size).unwrap();
    path
}

/// Creates a file at `root/relative` holding exactly `contents`.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn create_media_file_with_contents(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_root_layout() {
        let root = create_media_root();

        assert!(root.path().join("Movies").is_dir());
        assert!(root.path().join("tv shows").is_dir());
    }

    #[test]
    fn test_sparse_file_has_requested_size() {
        let root = create_media_root();
        let path = create_media_file(root.path(), "Movies/A/a.mp4", 10_000_000);

        assert_eq!(std::fs::metadata(path).unwrap().len(), 10_000_000);
    }
}
