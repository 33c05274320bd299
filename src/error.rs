//! Error types for the generation pipeline.
//!
//! Every fault surfaces as a [`PipelineError`]. Callers that need to branch on the broad
//! category use [`PipelineError::kind`], which maps each variant onto the closed
//! [`ErrorKind`] taxonomy.

use crate::helper::HelperKind;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Closed error taxonomy shared by every pipeline component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Misconfigured pipeline wiring or invalid input; never retried
    Validation,
    /// Malformed extension or helper code supplied by a developer
    Developer,
    /// Filesystem or environment failure
    Environmental,
    /// Anything that could not be classified
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Developer => "DeveloperError",
            ErrorKind::Environmental => "EnvironmentalError",
            ErrorKind::Unknown => "UnknownError",
        };
        f.write_str(name)
    }
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Helper '{key}' is a {actual} helper and cannot be registered on the {expected} surface")]
    KindMismatch {
        key: String,
        expected: HelperKind,
        actual: HelperKind,
    },

    #[error("{kind} helper key cannot be empty")]
    EmptyHelperKey { kind: HelperKind },

    #[error(
        "Override conflict for fragment '{key}': already overridden by {existing_origin}, \
         attempted again by {attempted_origin}"
    )]
    OverrideConflict {
        key: String,
        existing_origin: String,
        attempted_origin: String,
    },

    #[error("Fragment dependency cycle detected: {}", keys.join(" -> "))]
    DependencyCycle { keys: Vec<String> },

    #[error("Fragment '{key}' depends on unknown fragment '{dependency}'")]
    UnknownDependency { key: String, dependency: String },

    #[error(
        "Required fragment family '{family}' was registered ({}) but no helper in it executed",
        registered.join(", ")
    )]
    FamilyNotExecuted {
        family: String,
        registered: Vec<String>,
    },

    #[error("IR draft is missing required field '{field}'")]
    MissingArtifactField { field: String },

    #[error("Fragment '{writer}' cannot assign '{field}': field is owned by '{owner}'")]
    FieldConflict {
        field: String,
        owner: String,
        writer: String,
    },

    #[error("Invalid adapter extension: {message}")]
    InvalidAdapterExtension { message: String },

    #[error("IR snapshot version {actual} is not supported (expected {expected})")]
    SnapshotVersion { expected: u32, actual: u32 },

    #[error("Adapter extensions must write inside {}: {} resolves outside it", boundary.display(), path.display())]
    PathEscape { path: PathBuf, boundary: PathBuf },

    #[error("Helper '{key}' failed: {message}")]
    HelperRejected { key: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}: {source}")]
    Environment {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl PipelineError {
    /// Category of this error within the taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::KindMismatch { .. }
            | PipelineError::EmptyHelperKey { .. }
            | PipelineError::OverrideConflict { .. }
            | PipelineError::DependencyCycle { .. }
            | PipelineError::UnknownDependency { .. }
            | PipelineError::FamilyNotExecuted { .. }
            | PipelineError::MissingArtifactField { .. }
            | PipelineError::FieldConflict { .. }
            | PipelineError::HelperRejected { .. }
            | PipelineError::ConfigError(_) => ErrorKind::Validation,
            PipelineError::InvalidAdapterExtension { .. }
            | PipelineError::SnapshotVersion { .. }
            | PipelineError::PathEscape { .. } => ErrorKind::Developer,
            PipelineError::Io { .. } | PipelineError::Environment { .. } => {
                ErrorKind::Environmental
            }
            PipelineError::Serialization(_) | PipelineError::External(_) => ErrorKind::Unknown,
        }
    }

    /// Structured context for reporting: offending keys, paths and origins
    pub fn context(&self) -> Value {
        match self {
            PipelineError::KindMismatch {
                key,
                expected,
                actual,
            } => json!({ "key": key, "expected": expected, "actual": actual }),
            PipelineError::EmptyHelperKey { kind } => json!({ "kind": kind }),
            PipelineError::OverrideConflict {
                key,
                existing_origin,
                attempted_origin,
            } => json!({
                "key": key,
                "origins": [existing_origin, attempted_origin],
            }),
            PipelineError::DependencyCycle { keys } => json!({ "keys": keys }),
            PipelineError::UnknownDependency { key, dependency } => {
                json!({ "key": key, "dependency": dependency })
            }
            PipelineError::FamilyNotExecuted { family, registered } => {
                json!({ "family": family, "registered": registered })
            }
            PipelineError::MissingArtifactField { field } => json!({ "field": field }),
            PipelineError::FieldConflict {
                field,
                owner,
                writer,
            } => json!({ "field": field, "owner": owner, "writer": writer }),
            PipelineError::PathEscape { path, boundary } => json!({
                "path": path.display().to_string(),
                "boundary": boundary.display().to_string(),
            }),
            PipelineError::HelperRejected { key, .. } => json!({ "key": key }),
            PipelineError::Io { path, .. } => json!({ "path": path.display().to_string() }),
            PipelineError::SnapshotVersion { expected, actual } => {
                json!({ "expected": expected, "actual": actual })
            }
            _ => json!({}),
        }
    }

    /// Fold an arbitrary failure back into the taxonomy.
    ///
    /// Pipeline errors pass through untouched, I/O errors become environmental, and anything
    /// else is kept as an external error so callers can still downcast it.
    pub fn normalize(error: anyhow::Error) -> Self {
        match error.downcast::<PipelineError>() {
            Ok(pipeline) => pipeline,
            Err(error) => match error.downcast::<std::io::Error>() {
                Ok(io) => PipelineError::Environment {
                    message: "I/O failure".to_string(),
                    source: io,
                },
                Err(other) => PipelineError::External(other),
            },
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}
