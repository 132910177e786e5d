use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ArchiveError, Result};

/// One file scheduled for the archive: the name it is stored under and the
/// file its bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub source: PathBuf,
}

#[derive(Clone, Debug)]
struct Root {
    canonical: PathBuf,
    label: String,
}

/// Maps collected files to archive entry names of the form
/// `<root label>/<path relative to the root>`.
///
/// Each root's label is its base name. Distinct roots that share a base name
/// are labelled `name`, `name-2`, `name-3`, ... in selection order; the same
/// root selected twice keeps a single label.
#[derive(Clone, Debug)]
pub struct EntryNamer {
    roots: Vec<Root>,
}

impl EntryNamer {
    pub fn new(roots: &[PathBuf]) -> Self {
        let mut out: Vec<Root> = Vec::with_capacity(roots.len());
        let mut used: HashSet<String> = HashSet::new();
        for root in roots {
            // A vanished root still gets a label; its files fail later.
            let canonical = fs::canonicalize(root).unwrap_or_else(|_| root.clone());
            if let Some(prev) = out.iter().find(|r| r.canonical == canonical) {
                let label = prev.label.clone();
                out.push(Root { canonical, label });
                continue;
            }
            let base = base_name(root, &canonical);
            let mut label = base.clone();
            let mut n = 1usize;
            while !used.insert(label.clone()) {
                n += 1;
                label = format!("{}-{}", base, n);
            }
            if n > 1 {
                debug!(root = %root.display(), %label, "root base name already taken");
            }
            out.push(Root { canonical, label });
        }
        Self { roots: out }
    }

    /// Labels in selection order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.roots.iter().map(|r| r.label.as_str())
    }

    /// Archive name for `file`. The first root (in selection order) that
    /// contains the file's canonical path owns it. A file selected directly
    /// as a root is stored under its own name. A file outside every root
    /// falls back to its base name.
    pub fn name_for(&self, file: &Path) -> Result<String> {
        let canonical = fs::canonicalize(file).map_err(|source| ArchiveError::SourceUnreadable {
            path: file.to_path_buf(),
            source,
        })?;
        for root in &self.roots {
            if let Ok(rest) = canonical.strip_prefix(&root.canonical) {
                return Ok(join_name(&root.label, rest));
            }
        }
        Ok(file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| canonical.to_string_lossy().into_owned()))
    }

    /// Name every file, keeping collector order. Names that repeat (the same
    /// file reached through overlapping roots) are kept as separate entries
    /// and renamed `stem (2).ext`, `stem (3).ext`, ...
    pub fn plan(&self, files: &[PathBuf]) -> Result<Vec<ArchiveEntry>> {
        let mut used: HashSet<String> = HashSet::with_capacity(files.len());
        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let name = self.name_for(file)?;
            let name = unique_name(name, &mut used);
            entries.push(ArchiveEntry { name, source: file.clone() });
        }
        Ok(entries)
    }
}

fn base_name(root: &Path, canonical: &Path) -> String {
    root.file_name()
        .or_else(|| canonical.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "root".to_string())
}

fn join_name(label: &str, rest: &Path) -> String {
    let parts: Vec<String> = rest
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => Some(p.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        label.to_string()
    } else {
        format!("{}/{}", label, parts.join("/"))
    }
}

fn unique_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let (dir, file) = match name.rfind('/') {
        Some(i) => name.split_at(i + 1),
        None => ("", name.as_str()),
    };
    let (stem, ext) = match file.rfind('.') {
        Some(i) if i > 0 => file.split_at(i),
        _ => (file, ""),
    };
    let mut n = 2usize;
    loop {
        let candidate = format!("{}{} ({}){}", dir, stem, n, ext);
        if used.insert(candidate.clone()) {
            warn!(original = %name, renamed = %candidate, "duplicate entry name");
            return candidate;
        }
        n += 1;
    }
}
