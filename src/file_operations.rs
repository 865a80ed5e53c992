use crate::temp::TempGuard;
use crate::torrent_index::DownloadedTorrent;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during file operations
#[derive(Debug, Error)]
pub enum FileOperationError {
    /// The destination directory could not be resolved or created
    #[error("Failed to prepare destination directory {path}: {source}")]
    Destination { path: PathBuf, source: io::Error },

    /// Neither renaming nor copying the artifact into place worked
    #[error("Failed to move {source_path} to {destination}: {source}")]
    Relocation {
        source_path: PathBuf,
        destination: PathBuf,
        source: io::Error,
    },

    /// The artifact name yields no usable file name
    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),
}

/// Sanitizes a string for use in filenames by replacing problematic characters
///
/// Replaces characters that are invalid or problematic in filenames across platforms:
/// - Path separators: / \
/// - Reserved characters: : * ? " < > |
/// - Control characters
/// - Trim leading/trailing whitespace and dots
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    sanitized.trim_matches(|c: char| c.is_whitespace() || c == '.').to_string()
}

/// Resolves the destination directory to an absolute path and creates it if absent
pub fn ensure_destination(path: &Path) -> Result<PathBuf, FileOperationError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| FileOperationError::Destination {
                path: path.to_path_buf(),
                source: e,
            })?
            .join(path)
    };

    fs::create_dir_all(&absolute).map_err(|e| FileOperationError::Destination {
        path: absolute.clone(),
        source: e,
    })?;

    Ok(absolute)
}

/// Moves downloaded torrent files into the destination directory
#[derive(Debug, Clone)]
pub struct Relocator {
    destination: PathBuf,
    /// Fixed suffix appended to every relocated file name, if not already present
    extension: Option<String>,
}

impl Relocator {
    pub fn new(destination: impl Into<PathBuf>, extension: Option<String>) -> Self {
        Self {
            destination: destination.into(),
            extension,
        }
    }

    /// Destination path for an artifact
    fn target_for(&self, torrent: &DownloadedTorrent) -> Result<PathBuf, FileOperationError> {
        let mut name = sanitize_filename(torrent.name());
        if name.is_empty() {
            return Err(FileOperationError::InvalidFileName(torrent.name().to_string()));
        }

        if let Some(extension) = self.extension.as_deref() {
            if !name.ends_with(extension) {
                name.push_str(extension);
            }
        }

        Ok(self.destination.join(name))
    }

    /// Moves the artifact into the destination directory
    ///
    /// Tries an atomic rename first and falls back to copying, which covers
    /// temporary directories living on another device. The temporary file
    /// itself is removed when `torrent` is dropped, whatever the outcome.
    pub fn relocate(&self, torrent: &DownloadedTorrent) -> Result<PathBuf, FileOperationError> {
        let destination = self.target_for(torrent)?;

        if let Err(e) = fs::rename(torrent.path(), &destination) {
            debug!(error = %e, "rename failed, falling back to copy");
            copy_into_place(torrent.path(), &destination).map_err(|e| {
                FileOperationError::Relocation {
                    source_path: torrent.path().to_path_buf(),
                    destination: destination.clone(),
                    source: e,
                }
            })?;
        }

        Ok(destination)
    }
}

/// Copies `source` next to `destination`, syncs it, then renames it into place
///
/// The destination name only ever holds a complete file. The partial copy is
/// removed on every failure.
fn copy_into_place(source: &Path, destination: &Path) -> io::Result<()> {
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = TempGuard::File(
        destination.with_file_name(format!(".{}.{}.part", file_name, ulid::Ulid::new())),
    );

    let mut reader = File::open(source)?;
    let mut writer = File::create(partial.path())?;
    io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    drop(writer);

    fs::rename(partial.path(), destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp::write_temp_file;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Normal Title"), "Normal Title");
        assert_eq!(sanitize_filename("Title: With Colon"), "Title- With Colon");
        assert_eq!(sanitize_filename("Path/With\\Slashes"), "Path-With-Slashes");
        assert_eq!(sanitize_filename("  Spaces  "), "Spaces");
        assert_eq!(sanitize_filename("...dots..."), "dots");
    }

    #[test]
    fn test_ensure_destination_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("torrents").join("tv");

        let resolved = ensure_destination(&target).unwrap();

        assert_eq!(resolved, target);
        assert!(target.is_dir());
        // Existing directories are fine too
        assert!(ensure_destination(&target).is_ok());
    }

    #[test]
    fn test_relocate_moves_file_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let relocator = Relocator::new(dir.path(), None);
        let torrent = DownloadedTorrent::new(
            write_temp_file("test", "torrent", b"payload").unwrap(),
            "Show.S01E01.torrent",
        );
        let temp_path = torrent.path().to_path_buf();

        let destination = relocator.relocate(&torrent).unwrap();
        drop(torrent);

        assert_eq!(destination, dir.path().join("Show.S01E01.torrent"));
        assert_eq!(fs::read(&destination).unwrap(), b"payload");
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_relocate_appends_extension_once() {
        let dir = tempfile::tempdir().unwrap();
        let relocator = Relocator::new(dir.path(), Some(".torrent".to_string()));

        let plain = DownloadedTorrent::new(write_temp_file("a", "tmp", b"a").unwrap(), "Show S02");
        let suffixed =
            DownloadedTorrent::new(write_temp_file("b", "tmp", b"b").unwrap(), "Other.torrent");

        assert_eq!(
            relocator.relocate(&plain).unwrap(),
            dir.path().join("Show S02.torrent")
        );
        assert_eq!(
            relocator.relocate(&suffixed).unwrap(),
            dir.path().join("Other.torrent")
        );
    }

    #[test]
    fn test_copy_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.torrent");
        fs::write(&source, b"payload").unwrap();
        let destination = dir.path().join("Show S01.torrent");

        copy_into_place(&source, &destination).unwrap();

        assert_eq!(fs::read(&destination).unwrap(), b"payload");
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Show S01.torrent", "source.torrent"]);
    }

    #[test]
    fn test_failed_copy_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory squatting on the target name defeats both
        // the direct rename and the final rename of the copy
        let blocker = dir.path().join("x.torrent");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"").unwrap();

        let relocator = Relocator::new(dir.path(), None);
        let torrent =
            DownloadedTorrent::new(write_temp_file("test", "torrent", b"x").unwrap(), "x.torrent");

        let result = relocator.relocate(&torrent);

        assert!(matches!(result, Err(FileOperationError::Relocation { .. })));
        let entries: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries, vec![blocker]);
    }

    #[test]
    fn test_relocate_into_missing_directory_fails_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let relocator = Relocator::new(dir.path().join("missing"), None);
        let torrent =
            DownloadedTorrent::new(write_temp_file("test", "torrent", b"x").unwrap(), "x.torrent");
        let temp_path = torrent.path().to_path_buf();

        let result = relocator.relocate(&torrent);
        assert!(matches!(result, Err(FileOperationError::Relocation { .. })));

        drop(torrent);
        assert!(!temp_path.exists());
    }
}
