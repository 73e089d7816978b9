//! Run-scoped scratch artifacts
//!
//! Every request stages its files inside a uniquely named directory under a
//! process-wide root. Uniqueness comes from UUIDv4 naming, which keeps
//! concurrent requests collision-free without locks. Release is best-effort
//! and runs on every exit path via `Drop`; a stray file left behind is a
//! logged warning, never a caller-visible failure.

use crate::config::types::{ExecError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Kind of artifact staged for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Source text written before the compile stage
    SourceFile,
    /// Compiled JVM class file
    ClassFile,
    /// Native executable produced by the compiler
    Executable,
}

/// One registered artifact path
#[derive(Debug, Clone)]
pub struct ScratchArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

/// Per-request scratch directory with registered artifacts
pub struct Scratch {
    /// Unique run ID, also the directory name
    run_id: String,
    /// The per-request directory
    dir: PathBuf,
    /// Artifacts to delete on release
    artifacts: Vec<ScratchArtifact>,
    released: bool,
}

impl Scratch {
    fn new(root: &Path) -> Result<Self> {
        let run_id = Uuid::new_v4().to_string();
        let dir = root.join(&run_id);

        fs::create_dir_all(&dir).map_err(|e| {
            ExecError::Scratch(format!(
                "failed to create scratch directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Scratch {
            run_id,
            dir,
            artifacts: Vec::new(),
            released: false,
        })
    }

    /// Get run ID
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the scratch directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a source artifact into the directory and register it
    pub fn stage_source(&mut self, file_name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);

        fs::write(&path, contents).map_err(|e| {
            ExecError::Scratch(format!(
                "failed to write source file {}: {}",
                path.display(),
                e
            ))
        })?;

        self.artifacts.push(ScratchArtifact {
            path: path.clone(),
            kind: ArtifactKind::SourceFile,
        });
        Ok(path)
    }

    /// Register an expected build product for cleanup accounting. The file
    /// does not need to exist yet.
    pub fn register(&mut self, path: PathBuf, kind: ArtifactKind) {
        self.artifacts.push(ScratchArtifact { path, kind });
    }

    /// Registered artifacts, in staging order
    pub fn artifacts(&self) -> &[ScratchArtifact] {
        &self.artifacts
    }

    /// Delete registered artifacts, then the directory itself (which also
    /// reclaims unregistered build products such as inner-class files).
    /// Idempotent; failures are logged and swallowed.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        for artifact in &self.artifacts {
            if artifact.path.exists() {
                if let Err(e) = fs::remove_file(&artifact.path) {
                    log::warn!(
                        "failed to remove {:?} artifact {}: {}",
                        artifact.kind,
                        artifact.path.display(),
                        e
                    );
                }
            }
        }

        if self.dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                log::warn!(
                    "failed to remove scratch directory {}: {}",
                    self.dir.display(),
                    e
                );
            }
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.release();
    }
}

/// Factory for per-request scratch directories under one root
pub struct ScratchRoot {
    root: PathBuf,
}

impl ScratchRoot {
    /// Create the root directory if it does not exist yet
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).map_err(|e| {
            ExecError::Scratch(format!(
                "failed to create scratch root {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(ScratchRoot { root })
    }

    /// Get the root path
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh per-request directory
    pub fn create_scratch(&self) -> Result<Scratch> {
        Scratch::new(&self.root)
    }
}
