//! Path containment for staged writes
//!
//! A target is accepted only when its fully resolved location lies beneath the canonical
//! boundary directory. `.` and `..` are removed lexically, then the deepest existing ancestor is
//! canonicalized so symlinked directories are followed before the comparison.

use crate::error::PipelineError;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Remove `.` and `..` components without touching the filesystem.
///
/// `..` at the root is dropped, matching how the OS resolves `/..`.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if at_root {
                    if normalized.as_os_str().is_empty() {
                        normalized.push("..");
                    }
                } else if normalized.file_name().is_some() {
                    normalized.pop();
                } else {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Anchor a relative path at the current directory.
fn absolutize(path: &Path) -> Result<PathBuf, PipelineError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| PipelineError::Environment {
        message: "Failed to read current directory".to_string(),
        source: e,
    })?;
    Ok(cwd.join(path))
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the rest.
///
/// Relative paths are resolved against the current directory first.
pub fn resolve_existing_prefix(path: &Path) -> Result<PathBuf, PipelineError> {
    let normalized = normalize_lexically(&absolutize(path)?);
    let mut existing = normalized.as_path();
    let mut remainder = Vec::new();

    loop {
        if existing.exists() {
            break;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                remainder.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = if existing.as_os_str().is_empty() || !existing.exists() {
        existing.to_path_buf()
    } else {
        dunce::canonicalize(existing).map_err(|e| PipelineError::io(existing, e))?
    };
    for name in remainder.into_iter().rev() {
        resolved.push(name);
    }
    Ok(nfc(&resolved))
}

/// Canonical form of a boundary directory, which need not exist yet.
pub fn canonical_boundary(boundary: &Path) -> Result<PathBuf, PipelineError> {
    resolve_existing_prefix(boundary)
}

/// Resolve `candidate` against `boundary` and reject anything that lands outside it.
///
/// Relative candidates are joined onto the boundary; absolute ones are checked as given.
pub fn resolve_within(boundary: &Path, candidate: &Path) -> Result<PathBuf, PipelineError> {
    let boundary = canonical_boundary(boundary)?;
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        boundary.join(candidate)
    };
    let resolved = resolve_existing_prefix(&joined)?;

    if resolved == boundary || !resolved.starts_with(&boundary) {
        return Err(PipelineError::PathEscape {
            path: candidate.to_path_buf(),
            boundary,
        });
    }
    Ok(resolved)
}

fn nfc(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(s.nfc().collect::<String>()),
        None => path.to_path_buf(),
    }
}
