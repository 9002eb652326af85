//! Write-temp-then-rename helpers.
//!
//! The catalog snapshot, downloaded artifacts and rendered documents all
//! reach their final path through a rename, so readers only ever see a
//! complete file or the previous one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Suffix of in-progress downloads.
pub const PARTIAL_SUFFIX: &str = ".part";

const TEMP_SUFFIX: &str = ".tmp";

/// Returns the hidden in-progress sibling of `dest` (`dir/.name.part`).
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    hidden_sibling(dest, PARTIAL_SUFFIX)
}

fn temp_path(dest: &Path) -> PathBuf {
    hidden_sibling(dest, TEMP_SUFFIX)
}

fn hidden_sibling(dest: &Path, suffix: &str) -> PathBuf {
    let name = dest
        .file_name()
        .map_or_else(|| "out".into(), |n| n.to_string_lossy());
    dest.with_file_name(format!(".{name}{suffix}"))
}

/// Writes `bytes` to `dest` via a hidden temp file and a rename.
///
/// The parent directory is created when missing. On failure the temp file
/// is removed and `dest` keeps its previous content.
///
/// # Errors
///
/// Returns the first IO error from creating, writing, syncing or renaming.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(dest);
    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, dest)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Removes leftover `.part` files in `dir`, returning how many were deleted.
///
/// A missing directory counts as clean.
///
/// # Errors
///
/// Returns an IO error if the directory exists but cannot be listed.
pub fn remove_stale_partials(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX) {
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => debug!(path = %entry.path().display(), error = %e, "could not remove partial file"),
            }
        }
    }
    Ok(removed)
}
