//! Workspace root and previous generation state

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Project workspace the pipeline reads from and writes into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path; absolute paths are returned unchanged
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }
}

/// Files produced by the previous generation run, keyed by workspace-relative path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationState {
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

impl GenerationState {
    /// Read the `files` table of a previous manifest; a missing manifest is an empty state
    pub fn load(manifest_path: &Path) -> Result<Self, PipelineError> {
        if !manifest_path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(manifest_path).map_err(|e| PipelineError::io(manifest_path, e))?;
        let state: GenerationState = serde_json::from_slice(&bytes)?;
        Ok(state)
    }

    /// Paths present in the previous run but not in `current`
    pub fn stale_paths<'a, I>(&self, current: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let current: std::collections::BTreeSet<&str> = current.into_iter().collect();
        self.files
            .keys()
            .filter(|path| !current.contains(path.as_str()))
            .cloned()
            .collect()
    }
}
