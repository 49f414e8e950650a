//! Java workspace: file operations plus Maven build and test.

use std::fmt;
use std::sync::Arc;

use super::SimpleWorkspace;
use crate::builder::{Builder, MavenBuilder};
use crate::error::{BuildError, WorkspaceError};
use crate::snapshot::Snapshot;

/// A workspace holding a Maven project.
#[derive(Clone)]
pub struct JavaWorkspace {
    files: SimpleWorkspace,
    maven: Arc<MavenBuilder>,
}

impl fmt::Debug for JavaWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JavaWorkspace")
            .field("files", &self.files)
            .field("image", &self.maven.image())
            .finish()
    }
}

impl JavaWorkspace {
    /// Pairs a snapshot with the Maven builder used for `build`/`test`.
    pub fn new(snapshot: Snapshot, maven: Arc<MavenBuilder>) -> Self {
        Self {
            files: SimpleWorkspace::new(snapshot),
            maven,
        }
    }

    pub(crate) fn files(&self) -> &SimpleWorkspace {
        &self.files
    }

    pub(crate) fn with_files(&self, files: SimpleWorkspace) -> Self {
        Self {
            files,
            maven: Arc::clone(&self.maven),
        }
    }

    pub fn read(&self, path: &str) -> Result<String, WorkspaceError> {
        self.files.read(path)
    }

    pub fn write(&self, path: &str, content: &str) -> Result<Self, WorkspaceError> {
        Ok(self.with_files(self.files.write(path, content)?))
    }

    pub fn copy_dir(&self, path: &str, source: &Snapshot) -> Result<Self, WorkspaceError> {
        Ok(self.with_files(self.files.copy_dir(path, source)?))
    }

    pub fn rm(&self, path: &str) -> Result<Self, WorkspaceError> {
        Ok(self.with_files(self.files.rm(path)?))
    }

    pub fn rm_dir(&self, path: &str) -> Result<Self, WorkspaceError> {
        Ok(self.with_files(self.files.rm_dir(path)?))
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<String>, WorkspaceError> {
        self.files.list_dir(path)
    }

    pub fn walk(&self, pattern: &str) -> Result<Vec<String>, WorkspaceError> {
        self.files.walk(pattern)
    }

    pub fn dir(&self) -> &Snapshot {
        self.files.dir()
    }

    /// Runs `mvn package` on the current snapshot.
    pub async fn build(&self) -> Result<(), BuildError> {
        self.maven.build(self.dir()).await
    }

    /// Runs `mvn test` on the current snapshot.
    pub async fn test(&self) -> Result<(), BuildError> {
        self.maven.test(self.dir()).await
    }
}
