//! Per-invocation scratch workspace.
//!
//! One fresh temporary directory per bridge call, holding exactly the entry
//! script. It is the only host directory the child gets to see. Workspaces
//! are never pooled or reused; they are removed when released or dropped.

use crate::error::{Result, SandboxError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name of the entry script inside the workspace
pub const SCRIPT_FILE_NAME: &str = "main.py";

const DIR_PREFIX: &str = "safeeval-";

#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
    script_path: PathBuf,
}

impl ScratchWorkspace {
    /// Create a workspace in the system temp directory and write `code`
    /// verbatim as the entry script.
    pub fn create(code: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir()
            .map_err(|e| SandboxError::io("failed to create scratch workspace", e))?;
        Self::populate(dir, code)
    }

    /// Create a workspace under `parent` instead of the system temp directory.
    pub fn create_in(parent: &Path, code: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| SandboxError::io("failed to create scratch workspace", e))?;
        Self::populate(dir, code)
    }

    fn populate(dir: TempDir, code: &str) -> Result<Self> {
        // Canonical path: the runtime maps `--dir=<path>` to the same guest
        // path, so the script argument must sit under the exact string passed.
        let path = dir
            .path()
            .canonicalize()
            .map_err(|e| SandboxError::io("failed to resolve scratch workspace", e))?;
        let script_path = path.join(SCRIPT_FILE_NAME);

        let mut file = std::fs::File::create(&script_path)
            .map_err(|e| SandboxError::io("failed to create entry script", e))?;
        file.write_all(code.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| SandboxError::io("failed to write entry script", e))?;

        Ok(Self {
            dir: Some(dir),
            path,
            script_path,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.path
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// Remove the workspace. Failures are logged, never returned: cleanup must
    /// not mask the result of the execution it follows.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove scratch workspace"
                );
            }
        }
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        self.remove();
    }
}
