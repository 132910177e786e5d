use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{ArchiveError, Result};

/// What to do when a directory (or a selected root) cannot be listed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnreadablePolicy {
    /// Log a warning and carry on with the rest of the selection.
    #[default]
    Skip,
    /// Abort collection with [`ArchiveError::SourceUnreadable`].
    Fail,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WalkPolicy {
    pub follow_symlinks: bool,
    pub unreadable: UnreadablePolicy,
}

/// Expand `roots` into the regular files beneath them.
///
/// Roots are visited in order. Directories are walked depth-first with
/// children in the order the filesystem lists them. Symlinks, sockets and
/// devices are skipped unless `follow_symlinks` resolves them to a file or
/// directory. Overlapping roots yield the same file more than once.
pub fn collect(roots: &[PathBuf], policy: WalkPolicy) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for root in roots {
        let before = files.len();
        for ent in WalkDir::new(root).follow_links(policy.follow_symlinks) {
            let ent = match ent {
                Ok(ent) => ent,
                Err(err) => {
                    unreadable(root, err, policy.unreadable)?;
                    continue;
                }
            };
            let ft = ent.file_type();
            if ft.is_file() {
                files.push(ent.into_path());
            } else if !ft.is_dir() {
                debug!(path = %ent.path().display(), "skipping non-regular entry");
            }
        }
        debug!(root = %root.display(), files = files.len() - before, "root collected");
    }
    if files.is_empty() {
        info!(roots = roots.len(), "selection contains no regular files");
    }
    Ok(files)
}

fn unreadable(root: &Path, err: walkdir::Error, policy: UnreadablePolicy) -> Result<()> {
    let path = err.path().unwrap_or(root).to_path_buf();
    match policy {
        UnreadablePolicy::Skip => {
            warn!(path = %path.display(), error = %err, "skipping unreadable path");
            Ok(())
        }
        UnreadablePolicy::Fail => {
            Err(ArchiveError::SourceUnreadable { path, source: io::Error::from(err) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn file_root_is_taken_as_is() {
        let td = tempfile::tempdir().unwrap();
        let f = td.path().join("one.txt");
        fs::write(&f, b"1").unwrap();
        let files = collect(&[f.clone()], WalkPolicy::default()).unwrap();
        assert_eq!(files, vec![f]);
    }

    #[test]
    fn empty_directories_yield_nothing() {
        let td = tempfile::tempdir().unwrap();
        fs::create_dir_all(td.path().join("a/b/c")).unwrap();
        let files = collect(&[td.path().to_path_buf()], WalkPolicy::default()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn missing_root_obeys_policy() {
        let td = tempfile::tempdir().unwrap();
        let gone = td.path().join("gone");

        let skipped = collect(&[gone.clone()], WalkPolicy::default()).unwrap();
        assert!(skipped.is_empty());

        let strict = WalkPolicy { unreadable: UnreadablePolicy::Fail, ..Default::default() };
        let err = collect(&[gone.clone()], strict).unwrap_err();
        match err {
            ArchiveError::SourceUnreadable { path, .. } => assert_eq!(path, gone),
            other => panic!("unexpected error: {other}"),
        }
    }
}
