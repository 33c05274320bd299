//! Builder phase: run builders against the final artifact and collect write actions.

use crate::error::PipelineError;
use crate::helper::{schedule_builders, HelperRegistry};
use crate::ir::IrArtifact;
use crate::pipeline::{RunOptions, Step, StepPhase};
use crate::reporter::Reporter;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// A file write requested by a builder; applied by the caller, never by the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteAction {
    /// Workspace-relative target
    pub path: PathBuf,
    pub contents: Vec<u8>,
    /// Key of the builder that queued it
    pub origin: String,
}

/// Read-only input handed to builders
pub struct BuilderInput<'a> {
    pub artifact: &'a IrArtifact,
    pub options: &'a RunOptions,
}

pub struct BuilderContext<'a> {
    pub input: BuilderInput<'a>,
    pub reporter: Reporter,
    key: &'a str,
    output: &'a mut Vec<WriteAction>,
}

impl BuilderContext<'_> {
    pub fn key(&self) -> &str {
        self.key
    }

    pub fn artifact(&self) -> &IrArtifact {
        self.input.artifact
    }

    pub fn queue_write(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        let action = WriteAction {
            path: path.into(),
            contents: contents.into(),
            origin: self.key.to_string(),
        };
        debug!(builder = %self.key, path = %action.path.display(), "Queued write");
        self.output.push(action);
    }
}

/// Run builders in `(priority desc, key asc, registration asc)` order.
///
/// The first failure aborts the remaining builders and is returned unchanged.
pub(crate) async fn run_builders(
    registry: &HelperRegistry,
    artifact: &IrArtifact,
    options: &RunOptions,
    steps: &mut Vec<Step>,
) -> Result<Vec<WriteAction>, PipelineError> {
    let builders = registry.builders();
    let mut output = Vec::new();

    for index in schedule_builders(builders) {
        let helper = &builders[index];
        debug!(key = %helper.key, priority = helper.priority, "Running builder");
        let mut ctx = BuilderContext {
            input: BuilderInput { artifact, options },
            reporter: options.reporter.child(&helper.key),
            key: &helper.key,
            output: &mut output,
        };
        helper.apply.apply(&mut ctx).await?;
        steps.push(Step::new(StepPhase::Builder, &helper.key));
    }

    info!(builders = builders.len(), writes = output.len(), "Builder phase complete");
    Ok(output)
}
