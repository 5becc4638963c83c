//! Run workspace: one private, uniquely named scratch directory per run.
//!
//! The directory holds every channel of the run. [`Workspace::release`]
//! removes it and is the normal exit path; if a `Workspace` is dropped
//! without being released, the directory is still removed.

use std::path::Path;

use lanemerge_core::error::{PipelineError, PipelineResult};
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "lanemerge-";

/// Exclusively owned scratch directory for one run.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `root`, or under the system temp
    /// directory when `root` is `None`.
    pub fn acquire(root: Option<&Path>) -> PipelineResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);

        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| PipelineError::Resource {
            action: "create workspace in",
            path: root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            source,
        })?;

        tracing::debug!(workspace = %dir.path().display(), "Workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Recursively delete the workspace.
    ///
    /// A deletion failure is logged and returned; it never changes the
    /// outcome of the run.
    pub fn release(self) -> PipelineResult<()> {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                tracing::debug!(workspace = %path.display(), "Workspace removed");
                Ok(())
            }
            Err(source) => {
                tracing::error!(
                    workspace = %path.display(),
                    error = %source,
                    "Failed to remove workspace",
                );
                Err(PipelineError::Resource {
                    action: "remove workspace",
                    path,
                    source,
                })
            }
        }
    }
}
