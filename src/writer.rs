//! File writer
//!
//! Materializes generated files. Contents are hashed with BLAKE3 and compared with what is on
//! disk, so unchanged files are never rewritten. Writes go through a temporary file and a rename.

use crate::error::PipelineError;
use crate::pipeline::WriteAction;
use crate::sandbox::containment::resolve_within;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    Written,
    Unchanged,
    Skipped,
}

/// Outcome for a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileWriteRecord {
    pub path: PathBuf,
    pub status: WriteStatus,
    /// Hex BLAKE3 digest of the requested contents
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub records: Vec<FileWriteRecord>,
    pub written: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl WriteSummary {
    pub fn from_records(records: Vec<FileWriteRecord>) -> Self {
        let count = |status| records.iter().filter(|r| r.status == status).count();
        Self {
            written: count(WriteStatus::Written),
            unchanged: count(WriteStatus::Unchanged),
            skipped: count(WriteStatus::Skipped),
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, path: &Path) -> Option<&FileWriteRecord> {
        self.records.iter().find(|r| r.path == path)
    }
}

/// Sink for generated files
pub trait FileWriter: Send + Sync {
    /// Write `contents` to the absolute `path`
    fn write(&self, path: &Path, contents: &[u8]) -> Result<FileWriteRecord, PipelineError>;

    /// Everything written so far, one entry per path
    fn summary(&self) -> WriteSummary;
}

pub fn content_hash(contents: &[u8]) -> String {
    hex::encode(blake3::hash(contents).as_bytes())
}

/// Filesystem-backed writer
pub struct FsFileWriter {
    dry_run: bool,
    records: Mutex<Vec<FileWriteRecord>>,
}

impl FsFileWriter {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn remember(&self, record: FileWriteRecord) {
        let mut records = self.records.lock();
        match records.iter_mut().find(|r| r.path == record.path) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        let mut temp_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        temp_name.push(".genpipe.tmp");
        let temp_path = path.with_file_name(temp_name);

        fs::write(&temp_path, contents).map_err(|e| PipelineError::io(&temp_path, e))?;
        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            PipelineError::io(path, e)
        })
    }
}

impl FileWriter for FsFileWriter {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<FileWriteRecord, PipelineError> {
        let hash = content_hash(contents);

        let unchanged = match fs::read(path) {
            Ok(existing) => content_hash(&existing) == hash,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(PipelineError::io(path, e)),
        };

        let (status, reason) = if unchanged {
            (WriteStatus::Unchanged, None)
        } else if self.dry_run {
            (WriteStatus::Skipped, Some("dry-run".to_string()))
        } else {
            Self::write_atomic(path, contents)?;
            (WriteStatus::Written, None)
        };

        debug!(path = %path.display(), status = ?status, "File write");
        let record = FileWriteRecord {
            path: path.to_path_buf(),
            status,
            hash,
            reason,
        };
        self.remember(record.clone());
        Ok(record)
    }

    fn summary(&self) -> WriteSummary {
        WriteSummary::from_records(self.records.lock().clone())
    }
}

/// Apply a builder write queue beneath `root`.
///
/// Every target is checked for containment before anything is written.
pub fn apply_write_actions(
    writer: &dyn FileWriter,
    root: &Path,
    actions: &[WriteAction],
) -> Result<Vec<FileWriteRecord>, PipelineError> {
    let targets = actions
        .iter()
        .map(|action| resolve_within(root, &action.path))
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(actions.len());
    for (target, action) in targets.iter().zip(actions) {
        records.push(writer.write(target, &action.contents)?);
    }

    info!(files = records.len(), root = %root.display(), "Applied builder writes");
    Ok(records)
}
