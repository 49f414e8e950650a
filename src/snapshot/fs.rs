//! Loading snapshots from, and exporting them to, the host filesystem.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use walkdir::WalkDir;

use super::{Node, Snapshot};
use crate::error::WorkspaceError;

/// Directory names skipped when loading a host directory by default.
const DEFAULT_EXCLUDES: &[&str] = &[".git", "target", "node_modules"];

/// Options for loading a snapshot from disk.
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    /// Directory names to skip anywhere in the tree.
    pub exclude: Vec<String>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Snapshot {
    /// Loads a host directory into a snapshot.
    ///
    /// Symlinks are skipped; directories whose name is in
    /// `options.exclude` are skipped with everything below them.
    pub fn from_dir(root: &Path, options: &SnapshotOptions) -> Result<Self, WorkspaceError> {
        if !root.is_dir() {
            return Err(WorkspaceError::NotFound(root.display().to_string()));
        }

        let mut nodes = BTreeMap::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !options
                        .exclude
                        .iter()
                        .any(|name| entry.file_name().to_string_lossy() == name.as_str())
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                WorkspaceError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(ErrorKind::Other, "filesystem loop detected")
                }))
            })?;
            if entry.depth() == 0 {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| WorkspaceError::InvalidPath(entry.path().display().to_string()))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let file_type = entry.file_type();
            if file_type.is_dir() {
                nodes.insert(key, Node::Dir);
            } else if file_type.is_file() {
                let data = fs::read(entry.path())?;
                nodes.insert(key, Node::File(Arc::from(data)));
            }
        }

        tracing::debug!(root = %root.display(), entries = nodes.len(), "Loaded snapshot");
        Ok(Self::from_nodes(nodes))
    }

    /// Writes every directory and file of the snapshot under `dest`.
    pub fn export(&self, dest: &Path) -> Result<(), WorkspaceError> {
        fs::create_dir_all(dest)?;
        for dir in self.directories() {
            fs::create_dir_all(dest.join(dir))?;
        }
        for (key, data) in self.files() {
            fs::write(dest.join(key), data)?;
        }
        Ok(())
    }

    /// Applies the changes from `base` to `self` onto `dest`.
    ///
    /// Removals go first: directories `base` has and `self` lacks are
    /// deleted with their contents, then removed files. Directories new in
    /// `self` are created and added or modified files written last, so a
    /// path may switch between file and directory. Files that did not change
    /// are left alone, so `dest` may be the directory `base` was loaded from.
    pub fn export_changes(&self, base: &Snapshot, dest: &Path) -> Result<(), WorkspaceError> {
        let diff = base.diff(self);
        let dirs: BTreeSet<&str> = self.directories().collect();
        let base_dirs: BTreeSet<&str> = base.directories().collect();

        let mut removed_dirs: Vec<&str> = Vec::new();
        for dir in base_dirs.difference(&dirs) {
            // children go with their parent
            if removed_dirs
                .last()
                .is_some_and(|parent| dir.starts_with(&format!("{parent}/")))
            {
                continue;
            }
            ignore_missing(fs::remove_dir_all(dest.join(dir)))?;
            removed_dirs.push(*dir);
        }
        for key in &diff.removed {
            ignore_missing(fs::remove_file(dest.join(key)))?;
        }

        for dir in dirs.difference(&base_dirs) {
            fs::create_dir_all(dest.join(dir))?;
        }
        for key in diff.added.iter().chain(diff.modified.iter()) {
            let target = dest.join(key);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, self.file_bytes(key)?)?;
        }

        tracing::debug!(
            dest = %dest.display(),
            added = diff.added.len(),
            modified = diff.modified.len(),
            removed = diff.removed.len(),
            removed_dirs = removed_dirs.len(),
            "Exported snapshot changes"
        );
        Ok(())
    }
}

fn ignore_missing(result: std::io::Result<()>) -> Result<(), WorkspaceError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
