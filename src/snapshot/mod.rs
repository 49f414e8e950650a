//! Immutable directory snapshots.
//!
//! A [`Snapshot`] is a point-in-time tree of files and directories. It is a
//! value: every "mutation" returns a new snapshot and leaves the receiver
//! untouched. File contents are reference-counted, so derived snapshots share
//! everything they did not change.
//!
//! ```ignore
//! use toolbox::snapshot::Snapshot;
//!
//! let base = Snapshot::empty();
//! let next = base.with_new_file("src/main.go", "package main\n")?;
//! assert!(base.file("src/main.go").is_err());
//! assert_eq!(next.file("src/main.go")?, "package main\n");
//! ```

mod fs;
pub mod path;

pub use fs::SnapshotOptions;

use std::collections::BTreeMap;
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::WorkspaceError;

/// Glob options matching container build conventions: `*` stops at `/`,
/// `**` spans directories, dotfiles are not special.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    File(Arc<[u8]>),
    Dir,
}

/// An immutable directory tree.
///
/// Keys are normalized relative paths; every ancestor of a key is present as
/// a directory node.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    nodes: Arc<BTreeMap<String, Node>>,
}

/// Files that differ between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    /// Files present only in the newer snapshot.
    pub added: Vec<String>,
    /// Files present in both with different contents.
    pub modified: Vec<String>,
    /// Files present only in the older snapshot.
    pub removed: Vec<String>,
}

impl SnapshotDiff {
    /// Whether the two snapshots hold the same files.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of files in the snapshot.
    pub fn len(&self) -> usize {
        self.files().count()
    }

    /// Whether the snapshot holds no files.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over `(path, contents)` of every file, in path order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.nodes.iter().filter_map(|(key, node)| match node {
            Node::File(data) => Some((key.as_str(), &data[..])),
            Node::Dir => None,
        })
    }

    /// Iterates over every directory key, in path order. The root is implicit.
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|(key, node)| match node {
            Node::Dir => Some(key.as_str()),
            Node::File(_) => None,
        })
    }

    /// Reads a file as text. Invalid UTF-8 is replaced lossily.
    pub fn file(&self, path: &str) -> Result<String, WorkspaceError> {
        let bytes = self.file_bytes(path)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Reads a file's raw bytes.
    pub fn file_bytes(&self, path: &str) -> Result<&[u8], WorkspaceError> {
        let key = path::normalize(path)?;
        match self.nodes.get(&key) {
            Some(Node::File(data)) => Ok(&data[..]),
            Some(Node::Dir) => Err(WorkspaceError::IsADirectory(key)),
            None if key.is_empty() => Err(WorkspaceError::IsADirectory("/".to_string())),
            None => Err(WorkspaceError::NotFound(key)),
        }
    }

    /// Returns a snapshot with `path` set to `content`, creating parents.
    pub fn with_new_file(
        &self,
        path: &str,
        content: impl AsRef<[u8]>,
    ) -> Result<Self, WorkspaceError> {
        let key = path::normalize(path)?;
        if key.is_empty() {
            return Err(WorkspaceError::IsADirectory("/".to_string()));
        }

        let mut nodes = (*self.nodes).clone();
        insert_file(&mut nodes, &key, Arc::from(content.as_ref()))?;
        Ok(Self::from_nodes(nodes))
    }

    /// Returns a snapshot with `source` copied under `path`.
    ///
    /// Existing content is overwritten at file granularity: files under
    /// `path` that `source` does not contain are kept.
    pub fn with_directory(&self, path: &str, source: &Snapshot) -> Result<Self, WorkspaceError> {
        let base = path::normalize(path)?;

        let mut nodes = (*self.nodes).clone();
        if !base.is_empty() {
            insert_dir(&mut nodes, &base)?;
        }
        for (key, node) in source.nodes.iter() {
            let target = path::join(&base, key);
            match node {
                Node::Dir => insert_dir(&mut nodes, &target)?,
                Node::File(data) => insert_file(&mut nodes, &target, Arc::clone(data))?,
            }
        }
        Ok(Self::from_nodes(nodes))
    }

    /// Returns a snapshot without the file at `path`. Absent paths are a no-op.
    pub fn without_file(&self, path: &str) -> Result<Self, WorkspaceError> {
        let key = path::normalize(path)?;
        match self.nodes.get(&key) {
            Some(Node::File(_)) => {
                let mut nodes = (*self.nodes).clone();
                nodes.remove(&key);
                Ok(Self::from_nodes(nodes))
            }
            Some(Node::Dir) => Err(WorkspaceError::IsADirectory(key)),
            None if key.is_empty() => Err(WorkspaceError::IsADirectory("/".to_string())),
            None => Ok(self.clone()),
        }
    }

    /// Returns a snapshot without the directory at `path` and everything
    /// below it. Removing the root yields an empty snapshot; absent paths are
    /// a no-op.
    pub fn without_directory(&self, path: &str) -> Result<Self, WorkspaceError> {
        let key = path::normalize(path)?;
        if key.is_empty() {
            return Ok(Self::empty());
        }
        match self.nodes.get(&key) {
            Some(Node::Dir) => {
                let prefix = format!("{key}/");
                let mut nodes = (*self.nodes).clone();
                nodes.retain(|existing, _| existing != &key && !existing.starts_with(&prefix));
                Ok(Self::from_nodes(nodes))
            }
            Some(Node::File(_)) => Err(WorkspaceError::NotADirectory(key)),
            None => Ok(self.clone()),
        }
    }

    /// Returns the tree under `path` as a snapshot rooted there.
    pub fn subdirectory(&self, path: &str) -> Result<Self, WorkspaceError> {
        let key = path::normalize(path)?;
        if key.is_empty() {
            return Ok(self.clone());
        }
        match self.nodes.get(&key) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(WorkspaceError::NotADirectory(key)),
            None => return Err(WorkspaceError::NotFound(key)),
        }

        let prefix = format!("{key}/");
        let nodes = self
            .nodes
            .range(prefix.clone()..)
            .take_while(|(existing, _)| existing.starts_with(&prefix))
            .map(|(existing, node)| (existing[prefix.len()..].to_string(), node.clone()))
            .collect();
        Ok(Self::from_nodes(nodes))
    }

    /// Returns the sorted names of the direct children of `path`.
    pub fn entries(&self, path: &str) -> Result<Vec<String>, WorkspaceError> {
        let key = path::normalize(path)?;
        if !key.is_empty() {
            match self.nodes.get(&key) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(WorkspaceError::NotADirectory(key)),
                None => return Err(WorkspaceError::NotFound(key)),
            }
        }

        let names = self
            .nodes
            .keys()
            .filter(|existing| path::parent(existing) == key && existing.as_str() != key)
            .map(|existing| {
                let name = if key.is_empty() {
                    existing.as_str()
                } else {
                    &existing[key.len() + 1..]
                };
                name.to_string()
            })
            .collect();
        Ok(names)
    }

    /// Returns the sorted paths of all files matching a glob pattern.
    ///
    /// The pattern is interpreted relative to the root; `**` matches any
    /// number of directories, including none.
    pub fn glob(&self, pattern: &str) -> Result<Vec<String>, WorkspaceError> {
        let trimmed = pattern.trim_start_matches("./").trim_start_matches('/');
        let trimmed = if trimmed.is_empty() { "**" } else { trimmed };
        let compiled = Pattern::new(trimmed).map_err(|e| WorkspaceError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.msg.to_string(),
        })?;

        Ok(self
            .files()
            .filter(|(key, _)| compiled.matches_with(key, GLOB_OPTIONS))
            .map(|(key, _)| key.to_string())
            .collect())
    }

    /// Content digest of the tree: equal trees have equal digests.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, node) in self.nodes.iter() {
            match node {
                Node::Dir => {
                    hasher.update(b"D");
                    hasher.update(key.as_bytes());
                    hasher.update([0u8]);
                }
                Node::File(data) => {
                    hasher.update(b"F");
                    hasher.update(key.as_bytes());
                    hasher.update([0u8]);
                    hasher.update((data.len() as u64).to_le_bytes());
                    hasher.update(data);
                }
            }
        }
        hex::encode(hasher.finalize())
    }

    /// Computes the file-level changes from `self` to `newer`.
    pub fn diff(&self, newer: &Snapshot) -> SnapshotDiff {
        let mut diff = SnapshotDiff::default();

        for (key, data) in newer.files() {
            match self.nodes.get(key) {
                Some(Node::File(old)) if old[..] == data[..] => {}
                Some(Node::File(_)) => diff.modified.push(key.to_string()),
                _ => diff.added.push(key.to_string()),
            }
        }
        for (key, _) in self.files() {
            if !matches!(newer.nodes.get(key), Some(Node::File(_))) {
                diff.removed.push(key.to_string());
            }
        }

        diff
    }

    fn from_nodes(nodes: BTreeMap<String, Node>) -> Self {
        Self {
            nodes: Arc::new(nodes),
        }
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes) || self.nodes == other.nodes
    }
}

impl Eq for Snapshot {}

/// Ensures `key` and all its ancestors exist as directories.
fn insert_dir(nodes: &mut BTreeMap<String, Node>, key: &str) -> Result<(), WorkspaceError> {
    for ancestor in path::ancestors(key).chain(std::iter::once(key)) {
        match nodes.get(ancestor) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(WorkspaceError::NotADirectory(ancestor.to_string())),
            None => {
                nodes.insert(ancestor.to_string(), Node::Dir);
            }
        }
    }
    Ok(())
}

/// Writes a file node, creating parent directories.
fn insert_file(
    nodes: &mut BTreeMap<String, Node>,
    key: &str,
    data: Arc<[u8]>,
) -> Result<(), WorkspaceError> {
    let parent = path::parent(key);
    if !parent.is_empty() {
        insert_dir(nodes, parent)?;
    }
    if let Some(Node::Dir) = nodes.get(key) {
        return Err(WorkspaceError::IsADirectory(key.to_string()));
    }
    nodes.insert(key.to_string(), Node::File(data));
    Ok(())
}
