//! Candidate file enumeration
//!
//! Walks the root folder recursively and yields absolute paths whose file
//! name ends with one of the configured extensions (case-sensitive). Entries
//! are visited in file-name order so a given filesystem state always yields
//! the same sequence.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Extensions scanned when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &[".mp4"];

#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirectoryScanner {
    /// Create a scanner over `root`; the root is made absolute up front.
    pub fn new(root: impl AsRef<Path>, extensions: &[String]) -> Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;
        let extensions = if extensions.is_empty() {
            DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
        } else {
            extensions.to_vec()
        };
        Ok(Self { root, extensions })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn matches(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|ext| file_name.ends_with(ext.as_str()))
    }

    /// Lazily enumerate matching files. Calling it again restarts the walk.
    pub fn scan(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    None
                },
            })
            .filter(is_regular_file)
            .filter(move |entry| self.matches(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.into_path())
    }
}

/// Regular files, and symlinks resolving to one. Linked directories are
/// listed but never descended into.
fn is_regular_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_scan_filters_by_extension_recursively() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b-cam-2.mp4");
        touch(dir.path(), "a-cam-1.mp4");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "day2/c-cam-3.mp4");
        touch(dir.path(), "day2/upper.MP4");

        let scanner = DirectoryScanner::new(dir.path(), &[]).unwrap();
        let names: Vec<String> = scanner
            .scan()
            .map(|p| p.strip_prefix(scanner.root()).unwrap().display().to_string())
            .collect();

        assert_eq!(names, vec!["a-cam-1.mp4", "b-cam-2.mp4", "day2/c-cam-3.mp4"]);
    }

    #[test]
    fn test_scan_yields_absolute_paths_and_restarts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "x-cam-1.mp4");

        let scanner = DirectoryScanner::new(dir.path(), &[]).unwrap();
        let first: Vec<PathBuf> = scanner.scan().collect();
        let second: Vec<PathBuf> = scanner.scan().collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_custom_extensions() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.mov");
        touch(dir.path(), "b.mp4");

        let scanner = DirectoryScanner::new(dir.path(), &[".mov".to_string()]).unwrap();
        assert_eq!(scanner.scan().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_listed() {
        let dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        touch(elsewhere.path(), "real-cam-2.mp4");
        touch(elsewhere.path(), "nested/inner-cam-3.mp4");
        touch(dir.path(), "videos/cam-clip-1.mp4");

        let videos = dir.path().join("videos");
        std::os::unix::fs::symlink(elsewhere.path().join("real-cam-2.mp4"), videos.join("cam-link-2.mp4"))
            .unwrap();
        std::os::unix::fs::symlink(elsewhere.path().join("nested"), videos.join("linked-dir")).unwrap();
        std::os::unix::fs::symlink(elsewhere.path().join("gone.mp4"), videos.join("dangling.mp4")).unwrap();

        let scanner = DirectoryScanner::new(&videos, &[]).unwrap();
        let names: Vec<String> = scanner
            .scan()
            .map(|p| p.strip_prefix(scanner.root()).unwrap().display().to_string())
            .collect();

        assert_eq!(names, vec!["cam-clip-1.mp4", "cam-link-2.mp4"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(DirectoryScanner::new(dir.path().join("absent"), &[]).is_err());
    }
}
