//! Directory scanning for deployable files.
//!
//! Recursively walks a root directory and yields every regular file as an
//! upload candidate, excluding hidden entries and archive-extraction
//! artefacts. Relative paths use `/` separators to match the wire format.
//! The scan is fail-fast: the first filesystem error abandons it entirely
//! rather than returning a partial listing.

use std::fs;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Directory segment left behind by macOS zip extraction; never deployed.
const MACOS_ARTIFACT_SEGMENT: &str = "__MACOSX";

/// One deployable file discovered under the scan root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileEntry {
    /// Path relative to the scan root, `/`-separated; unique within a scan.
    pub relative: String,
    /// Absolute path used to read the file's contents.
    pub absolute: Utf8PathBuf,
}

/// Errors raised while scanning a directory.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Raised when the scan root is missing or not a directory.
    #[error("scan root is not a directory: {root}")]
    RootNotDirectory {
        /// Root path the caller asked to scan.
        root: Utf8PathBuf,
    },
    /// Raised when a directory entry or its metadata cannot be read.
    #[error("failed to read {}: {message}", .path.display())]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a path under the root is not valid UTF-8; deploy paths
    /// travel as JSON strings, so there is no faithful encoding for it.
    #[error("path is not valid UTF-8: {}", .path.display())]
    NonUtf8Path {
        /// Offending path.
        path: PathBuf,
    },
}

/// Scans `root` recursively and returns every deployable file, sorted by
/// relative path.
///
/// Entries whose name starts with `.` and `__MACOSX` subtrees are excluded
/// at every depth. Directories, symlinks, and other non-regular entries are
/// skipped silently.
///
/// # Errors
///
/// Returns [`ScanError`] when the root is not a directory, when any entry
/// or its metadata cannot be read, or when a path is not valid UTF-8. No
/// partial result is returned on failure.
pub fn scan_directory(root: &Utf8Path) -> Result<Vec<FileEntry>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::RootNotDirectory {
            root: root.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    walk(root.as_std_path(), "", &mut entries)?;
    entries.sort_by(|lhs, rhs| lhs.relative.cmp(&rhs.relative));
    Ok(entries)
}

fn walk(dir: &Path, prefix: &str, out: &mut Vec<FileEntry>) -> Result<(), ScanError> {
    let reader = fs::read_dir(dir).map_err(|err| ScanError::Io {
        path: dir.to_path_buf(),
        message: err.to_string(),
    })?;

    for dirent in reader {
        let entry = dirent.map_err(|err| ScanError::Io {
            path: dir.to_path_buf(),
            message: err.to_string(),
        })?;

        let raw_name = entry.file_name();
        let Some(name) = raw_name.to_str() else {
            return Err(ScanError::NonUtf8Path { path: entry.path() });
        };
        if name.starts_with('.') || name == MACOS_ARTIFACT_SEGMENT {
            continue;
        }

        let file_type = entry.file_type().map_err(|err| ScanError::Io {
            path: entry.path(),
            message: err.to_string(),
        })?;
        let relative = if prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{prefix}/{name}")
        };

        if file_type.is_dir() {
            walk(&entry.path(), &relative, out)?;
        } else if file_type.is_file() {
            let absolute = Utf8PathBuf::from_path_buf(entry.path())
                .map_err(|path| ScanError::NonUtf8Path { path })?;
            out.push(FileEntry { relative, absolute });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()))
    }

    fn create_site_tree() -> TempDir {
        let dir = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let root = dir.path();

        fs::write(root.join("index.html"), b"<html></html>")
            .unwrap_or_else(|err| panic!("write: {err}"));
        fs::create_dir_all(root.join("css")).unwrap_or_else(|err| panic!("mkdir: {err}"));
        fs::write(root.join("css").join("site.css"), b"body{}")
            .unwrap_or_else(|err| panic!("write: {err}"));
        fs::create_dir_all(root.join("img").join("icons"))
            .unwrap_or_else(|err| panic!("mkdir: {err}"));
        fs::write(root.join("img").join("icons").join("star.svg"), b"<svg/>")
            .unwrap_or_else(|err| panic!("write: {err}"));

        dir
    }

    #[test]
    fn scan_finds_every_regular_file_once() {
        let dir = create_site_tree();
        let entries = scan_directory(&utf8_root(&dir))
            .unwrap_or_else(|err| panic!("scan should succeed: {err}"));

        let relative: Vec<&str> = entries.iter().map(|entry| entry.relative.as_str()).collect();
        assert_eq!(relative, vec!["css/site.css", "img/icons/star.svg", "index.html"]);
    }

    #[test]
    fn scan_excludes_hidden_segments_at_every_depth() {
        let dir = create_site_tree();
        let root = dir.path();
        fs::write(root.join(".deploy-state"), b"x").unwrap_or_else(|err| panic!("write: {err}"));
        fs::create_dir_all(root.join(".git")).unwrap_or_else(|err| panic!("mkdir: {err}"));
        fs::write(root.join(".git").join("HEAD"), b"ref").unwrap_or_else(|err| panic!("write: {err}"));
        fs::write(root.join("css").join(".swapfile"), b"x")
            .unwrap_or_else(|err| panic!("write: {err}"));

        let entries = scan_directory(&utf8_root(&dir))
            .unwrap_or_else(|err| panic!("scan should succeed: {err}"));

        assert!(entries.iter().all(|entry| !entry.relative.contains("/.")
            && !entry.relative.starts_with('.')));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn scan_excludes_macos_archive_artifacts() {
        let dir = create_site_tree();
        let root = dir.path();
        fs::create_dir_all(root.join("__MACOSX").join("img"))
            .unwrap_or_else(|err| panic!("mkdir: {err}"));
        fs::write(root.join("__MACOSX").join("img").join("._star.svg"), b"x")
            .unwrap_or_else(|err| panic!("write: {err}"));

        let entries = scan_directory(&utf8_root(&dir))
            .unwrap_or_else(|err| panic!("scan should succeed: {err}"));

        assert!(entries
            .iter()
            .all(|entry| !entry.relative.contains(MACOS_ARTIFACT_SEGMENT)));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn scan_of_empty_directory_is_empty() {
        let dir = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let entries = scan_directory(&utf8_root(&dir))
            .unwrap_or_else(|err| panic!("scan should succeed: {err}"));
        assert!(entries.is_empty());
    }

    #[test]
    fn scan_of_missing_root_fails() {
        let result = scan_directory(Utf8Path::new("/nonexistent/halyard/site"));
        assert!(matches!(result, Err(ScanError::RootNotDirectory { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn scan_skips_symlinks_silently() {
        let dir = create_site_tree();
        let root = dir.path();
        std::os::unix::fs::symlink(root.join("index.html"), root.join("link.html"))
            .unwrap_or_else(|err| panic!("symlink: {err}"));

        let entries = scan_directory(&utf8_root(&dir))
            .unwrap_or_else(|err| panic!("scan should succeed: {err}"));

        assert!(entries.iter().all(|entry| entry.relative != "link.html"));
        assert_eq!(entries.len(), 3);
    }
}
