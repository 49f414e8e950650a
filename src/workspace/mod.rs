//! Workspaces: a snapshot plus file-level operations.
//!
//! Every mutator is a pure function of (current snapshot, arguments) and
//! returns a new workspace; the receiver is never modified. Workspaces are
//! cheap to clone since the underlying snapshot is shared.
//!
//! Two flavors exist:
//!
//! - [`SimpleWorkspace`]: file operations only.
//! - [`JavaWorkspace`]: the same file operations plus Maven `build`/`test`.
//!
//! ```ignore
//! use toolbox::workspace::SimpleWorkspace;
//!
//! let ws = SimpleWorkspace::new(snapshot);
//! let ws = ws.write("README.md", "# hello\n")?;
//! assert_eq!(ws.read("README.md")?, "# hello\n");
//! ```

pub mod java;

pub use java::JavaWorkspace;

use crate::error::{BuildError, WorkspaceError};
use crate::snapshot::Snapshot;

/// Directory listed when no path is given.
pub const ROOT: &str = "/";

/// Pattern walked when no pattern is given.
pub const DEFAULT_WALK_PATTERN: &str = "**";

/// File operations over a single snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleWorkspace {
    snapshot: Snapshot,
}

impl SimpleWorkspace {
    /// Wraps a snapshot.
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Reads a file as text.
    pub fn read(&self, path: &str) -> Result<String, WorkspaceError> {
        self.snapshot.file(path)
    }

    /// Returns a workspace with `path` set to `content`.
    pub fn write(&self, path: &str, content: &str) -> Result<Self, WorkspaceError> {
        Ok(Self::new(self.snapshot.with_new_file(path, content)?))
    }

    /// Returns a workspace with `source` copied under `path`.
    pub fn copy_dir(&self, path: &str, source: &Snapshot) -> Result<Self, WorkspaceError> {
        Ok(Self::new(self.snapshot.with_directory(path, source)?))
    }

    /// Returns a workspace without the file at `path`.
    pub fn rm(&self, path: &str) -> Result<Self, WorkspaceError> {
        Ok(Self::new(self.snapshot.without_file(path)?))
    }

    /// Returns a workspace without the directory at `path`.
    pub fn rm_dir(&self, path: &str) -> Result<Self, WorkspaceError> {
        Ok(Self::new(self.snapshot.without_directory(path)?))
    }

    /// Sorted names of the entries directly under `path`.
    pub fn list_dir(&self, path: &str) -> Result<Vec<String>, WorkspaceError> {
        self.snapshot.entries(path)
    }

    /// Sorted paths of the files matching `pattern`.
    pub fn walk(&self, pattern: &str) -> Result<Vec<String>, WorkspaceError> {
        self.snapshot.glob(pattern)
    }

    /// The current snapshot.
    pub fn dir(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// A workspace of either flavor.
///
/// File operations keep the flavor: writing to a Java workspace yields a Java
/// workspace with the same builder.
#[derive(Debug, Clone)]
pub enum Workspace {
    Simple(SimpleWorkspace),
    Java(JavaWorkspace),
}

impl Workspace {
    fn files(&self) -> &SimpleWorkspace {
        match self {
            Workspace::Simple(ws) => ws,
            Workspace::Java(ws) => ws.files(),
        }
    }

    fn with_files(&self, files: SimpleWorkspace) -> Self {
        match self {
            Workspace::Simple(_) => Workspace::Simple(files),
            Workspace::Java(ws) => Workspace::Java(ws.with_files(files)),
        }
    }

    /// Short name of the flavor, for logs.
    pub fn flavor(&self) -> &'static str {
        match self {
            Workspace::Simple(_) => "simple",
            Workspace::Java(_) => "java",
        }
    }

    pub fn read(&self, path: &str) -> Result<String, WorkspaceError> {
        self.files().read(path)
    }

    pub fn write(&self, path: &str, content: &str) -> Result<Self, WorkspaceError> {
        Ok(self.with_files(self.files().write(path, content)?))
    }

    pub fn copy_dir(&self, path: &str, source: &Snapshot) -> Result<Self, WorkspaceError> {
        Ok(self.with_files(self.files().copy_dir(path, source)?))
    }

    pub fn rm(&self, path: &str) -> Result<Self, WorkspaceError> {
        Ok(self.with_files(self.files().rm(path)?))
    }

    pub fn rm_dir(&self, path: &str) -> Result<Self, WorkspaceError> {
        Ok(self.with_files(self.files().rm_dir(path)?))
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<String>, WorkspaceError> {
        self.files().list_dir(path)
    }

    pub fn walk(&self, pattern: &str) -> Result<Vec<String>, WorkspaceError> {
        self.files().walk(pattern)
    }

    pub fn dir(&self) -> &Snapshot {
        self.files().dir()
    }

    /// Whether the workspace can build itself.
    pub fn can_build(&self) -> bool {
        matches!(self, Workspace::Java(_))
    }

    /// Builds the current snapshot with the workspace's own toolchain.
    pub async fn build(&self) -> Result<(), BuildError> {
        match self {
            Workspace::Java(ws) => ws.build().await,
            Workspace::Simple(_) => Err(BuildError::Unsupported(
                "simple workspaces have no build toolchain".to_string(),
            )),
        }
    }

    /// Tests the current snapshot with the workspace's own toolchain.
    pub async fn test(&self) -> Result<(), BuildError> {
        match self {
            Workspace::Java(ws) => ws.test().await,
            Workspace::Simple(_) => Err(BuildError::Unsupported(
                "simple workspaces have no test toolchain".to_string(),
            )),
        }
    }
}

impl From<SimpleWorkspace> for Workspace {
    fn from(ws: SimpleWorkspace) -> Self {
        Workspace::Simple(ws)
    }
}

impl From<JavaWorkspace> for Workspace {
    fn from(ws: JavaWorkspace) -> Self {
        Workspace::Java(ws)
    }
}
