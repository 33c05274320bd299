//! Staged writes for one adapter-extension run
//!
//! Files are held in memory until [`AdapterSandbox`] is committed. Commit writes each staged
//! file once through the injected [`FileWriter`]; rollback drops the queue. Both are idempotent.

use crate::error::PipelineError;
use crate::pipeline::Transaction;
use crate::sandbox::containment::{canonical_boundary, resolve_within};
use crate::writer::{FileWriteRecord, FileWriter, WriteSummary};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// A file waiting for commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Absolute target, already checked for containment
    pub target_path: PathBuf,
    pub contents: Vec<u8>,
    /// Position in the queue across all extensions
    pub staged_at: u64,
    /// Name of the extension that queued it
    pub extension: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Pending,
    Committed,
    RolledBack,
}

struct SandboxInner {
    state: SandboxState,
    queue: Vec<StagedFile>,
    next_sequence: u64,
    records: Vec<FileWriteRecord>,
}

pub struct AdapterSandbox {
    output_dir: PathBuf,
    writer: Arc<dyn FileWriter>,
    temp_dir: Option<TempDir>,
    inner: Mutex<SandboxInner>,
}

impl AdapterSandbox {
    /// Sandbox rooted at `output_dir`, with a scratch directory for extensions
    pub fn new(output_dir: &Path, writer: Arc<dyn FileWriter>) -> Result<Self, PipelineError> {
        let temp_dir = tempfile::Builder::new()
            .prefix("genpipe-adapter-")
            .tempdir()
            .map_err(|e| PipelineError::Environment {
                message: "Failed to create adapter scratch directory".to_string(),
                source: e,
            })?;
        Self::build(output_dir, writer, Some(temp_dir))
    }

    /// Sandbox that will never hold files
    pub fn inert(output_dir: &Path, writer: Arc<dyn FileWriter>) -> Result<Self, PipelineError> {
        Self::build(output_dir, writer, None)
    }

    fn build(
        output_dir: &Path,
        writer: Arc<dyn FileWriter>,
        temp_dir: Option<TempDir>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            output_dir: canonical_boundary(output_dir)?,
            writer,
            temp_dir,
            inner: Mutex::new(SandboxInner {
                state: SandboxState::Pending,
                queue: Vec::new(),
                next_sequence: 0,
                records: Vec::new(),
            }),
        })
    }

    /// Canonical output directory every staged file must live under
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(|dir| dir.path())
    }

    pub fn state(&self) -> SandboxState {
        self.inner.lock().state
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Records of the files written by commit
    pub fn summary(&self) -> WriteSummary {
        WriteSummary::from_records(self.inner.lock().records.clone())
    }

    /// Check containment, then queue the file.
    ///
    /// Returns the resolved absolute target.
    pub(crate) fn stage(
        &self,
        extension: &str,
        path: &Path,
        contents: Vec<u8>,
    ) -> Result<PathBuf, PipelineError> {
        let target_path = resolve_within(&self.output_dir, path)?;

        let mut inner = self.inner.lock();
        if inner.state != SandboxState::Pending {
            return Err(PipelineError::HelperRejected {
                key: extension.to_string(),
                message: format!("sandbox already {:?}, cannot queue files", inner.state),
            });
        }
        let staged_at = inner.next_sequence;
        inner.next_sequence += 1;
        debug!(
            extension = %extension,
            path = %target_path.display(),
            staged_at,
            "Staged adapter file"
        );
        inner.queue.push(StagedFile {
            target_path: target_path.clone(),
            contents,
            staged_at,
            extension: extension.to_string(),
        });
        Ok(target_path)
    }

    /// Drop everything queued. Later commits write nothing.
    pub fn discard(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SandboxState::Pending {
            let dropped = inner.queue.len();
            inner.queue.clear();
            inner.state = SandboxState::RolledBack;
            debug!(dropped, "Discarded adapter staging queue");
        }
    }

    /// Resolve a staged target again right before it is written. Directories may have been
    /// swapped for symlinks since staging, including the output directory itself.
    fn recheck(&self, target: &Path) -> Result<PathBuf, PipelineError> {
        let resolved = resolve_within(&self.output_dir, target)?;
        if !resolved.starts_with(&self.output_dir) {
            return Err(PipelineError::PathEscape {
                path: target.to_path_buf(),
                boundary: self.output_dir.clone(),
            });
        }
        Ok(resolved)
    }

    fn commit_staged(&self) -> Result<(), PipelineError> {
        let queue = {
            let mut inner = self.inner.lock();
            if inner.state != SandboxState::Pending {
                debug!(state = ?inner.state, "Adapter sandbox commit is a no-op");
                return Ok(());
            }
            inner.state = SandboxState::Committed;
            std::mem::take(&mut inner.queue)
        };

        let count = queue.len();
        for staged in queue {
            let target = self.recheck(&staged.target_path)?;
            let record = self.writer.write(&target, &staged.contents)?;
            self.inner.lock().records.push(record);
        }
        if count > 0 {
            info!(files = count, output_dir = %self.output_dir.display(), "Committed adapter files");
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for AdapterSandbox {
    async fn commit(&self) -> Result<(), PipelineError> {
        self.commit_staged()
    }

    async fn rollback(&self) -> Result<(), PipelineError> {
        self.discard();
        Ok(())
    }
}

impl std::fmt::Debug for AdapterSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AdapterSandbox")
            .field("output_dir", &self.output_dir)
            .field("state", &inner.state)
            .field("pending", &inner.queue.len())
            .finish()
    }
}
