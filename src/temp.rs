//! Temporary artifact management
//!
//! Downloaded `.torrent` files land in the system temporary directory first and
//! are only moved into the destination directory once a release was picked.
//! [`TempGuard`] owns such a file and removes it when dropped, no matter whether
//! the relocation succeeded, failed, or was never attempted.

use std::fs::{self, File};
use std::io::{self, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Guard for temporary resources that automatically cleans up on drop
#[derive(Debug)]
pub(crate) enum TempGuard {
    /// Temporary file that will be deleted when dropped
    File(PathBuf),
}

impl TempGuard {
    /// Get the path to the temporary resource
    pub(crate) fn path(&self) -> &Path {
        match self {
            TempGuard::File(path) => path,
        }
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        match self {
            TempGuard::File(path) => match fs::remove_file(path.as_path()) {
                Ok(()) => {}
                // Already moved away by a successful rename
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => debug!(path = %path.display(), error = %e, "failed to remove temporary file"),
            },
        }
    }
}

impl Deref for TempGuard {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

/// Creates an empty temporary file and returns a guard that will clean it up on drop
///
/// The file is created in the system's temporary directory with a unique name
/// generated using ULID, so concurrent downloads of identically named releases
/// never collide.
pub(crate) fn create_temp_file(prefix: &str, extension: &str) -> io::Result<TempGuard> {
    let filename = format!("{}_{}.{}", prefix, ulid::Ulid::new(), extension);
    let path = std::env::temp_dir().join(filename);

    File::create(&path)?;

    Ok(TempGuard::File(path))
}

/// Creates a temporary file holding `contents`
///
/// If writing fails the guard is dropped before returning, so no partial file
/// is left behind.
pub(crate) fn write_temp_file(prefix: &str, extension: &str, contents: &[u8]) -> io::Result<TempGuard> {
    let guard = create_temp_file(prefix, extension)?;

    let mut file = File::create(guard.path())?;
    file.write_all(contents)?;
    file.sync_all()?;

    Ok(guard)
}
