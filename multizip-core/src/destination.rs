use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ArchiveError, Result};

pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Append `.zip` unless the file name already ends with it (any case).
pub fn normalize_destination(path: &Path) -> PathBuf {
    let has_ext = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase().ends_with(ARCHIVE_EXTENSION))
        .unwrap_or(false);
    if has_ext {
        return path.to_path_buf();
    }
    let mut s = OsString::from(path.as_os_str());
    s.push(ARCHIVE_EXTENSION);
    PathBuf::from(s)
}

/// Create the destination's parent directory if it does not exist yet.
pub fn prepare_destination(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if parent.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(|source| ArchiveError::DestinationUnwritable {
        path: parent.to_path_buf(),
        source,
    })?;
    debug!(dir = %parent.display(), "created destination directory");
    Ok(())
}

/// Drop `destination` itself from `files`, so re-archiving a folder that
/// already holds the previous archive does not pack the file being written.
pub fn exclude_destination(files: &mut Vec<PathBuf>, destination: &Path) {
    let Ok(target) = fs::canonicalize(destination) else {
        return;
    };
    let Some(target_name) = target.file_name() else {
        return;
    };
    files.retain(|f| {
        let same = f.file_name() == Some(target_name)
            && fs::canonicalize(f).map(|c| c == target).unwrap_or(false);
        if same {
            debug!(path = %f.display(), "skipping the destination archive");
        }
        !same
    });
}
