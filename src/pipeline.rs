//! Pipeline: registration surfaces and the two-phase run
//!
//! A run goes through four stages, strictly one after another:
//! 1. every extension produces its hook for this run;
//! 2. fragments build the draft, which is finalized into the artifact;
//! 3. extension hooks run as a saga, possibly replacing the artifact;
//! 4. builders queue writes; the saga is then committed, or rolled back if a builder failed.

use crate::config::GenpipeConfig;
use crate::error::PipelineError;
use crate::helper::{schedule_builders, schedule_fragments, Helper, HelperMode, HelperRegistry};
use crate::ir::IrArtifact;
use crate::reporter::{Diagnostic, Reporter};
use crate::workspace::{GenerationState, Workspace};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

pub mod builder;
pub mod extension;
pub mod fragment;
pub mod saga;

pub use builder::{BuilderContext, BuilderInput, WriteAction};
pub use extension::{
    ExecutionContext, ExtensionHook, HookOutcome, PipelineExtension, RegistrationContext,
    Transaction,
};
pub use fragment::FragmentContext;
pub use saga::TransactionLedger;

/// Fragment families that must execute whenever they are registered
pub const DEFAULT_REQUIRED_FAMILIES: [&str; 4] =
    ["ir.meta", "ir.capability-map", "ir.layout", "ir.artifacts"];

/// Inputs of a single run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub phase: String,
    pub config: Arc<GenpipeConfig>,
    pub namespace: String,
    pub origin: String,
    pub source_path: PathBuf,
    pub workspace: Workspace,
    pub reporter: Reporter,
    pub generation_state: GenerationState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepPhase {
    Fragment,
    Extension,
    ExtensionCommit,
    Builder,
}

/// One entry of the execution trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub phase: StepPhase,
    pub key: String,
}

impl Step {
    pub fn new(phase: StepPhase, key: &str) -> Self {
        Self {
            phase,
            key: key.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct RunResult {
    pub artifact: IrArtifact,
    pub diagnostics: Vec<Diagnostic>,
    /// Fragments, then extension activity, then builders
    pub steps: Vec<Step>,
    pub writes: Vec<WriteAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledFragment {
    pub key: String,
    pub depends_on: Vec<String>,
    pub mode: HelperMode,
    pub origin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledBuilder {
    pub key: String,
    pub priority: i32,
    pub origin: Option<String>,
}

/// Execution order a run would use, without running anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSchedule {
    pub fragments: Vec<ScheduledFragment>,
    pub superseded: Vec<String>,
    pub builders: Vec<ScheduledBuilder>,
    pub extensions: Vec<String>,
}

pub struct Pipeline {
    registry: HelperRegistry,
    extensions: Vec<Arc<dyn PipelineExtension>>,
    required_families: Vec<String>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            registry: HelperRegistry::new(),
            extensions: Vec::new(),
            required_families: DEFAULT_REQUIRED_FAMILIES
                .iter()
                .map(|family| family.to_string())
                .collect(),
        }
    }

    pub fn with_required_families<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_families = families.into_iter().map(Into::into).collect();
        self
    }

    /// Fragment surface
    pub fn ir(&mut self) -> FragmentSurface<'_> {
        FragmentSurface {
            registry: &mut self.registry,
        }
    }

    /// Builder surface
    pub fn builders(&mut self) -> BuilderSurface<'_> {
        BuilderSurface {
            registry: &mut self.registry,
        }
    }

    /// Extension surface
    pub fn extensions(&mut self) -> ExtensionSurface<'_> {
        ExtensionSurface {
            extensions: &mut self.extensions,
        }
    }

    pub fn registry(&self) -> &HelperRegistry {
        &self.registry
    }

    pub fn required_families(&self) -> &[String] {
        &self.required_families
    }

    pub fn schedule(&self) -> Result<PipelineSchedule, PipelineError> {
        let fragments = self.registry.fragments();
        let fragment_schedule = schedule_fragments(fragments)?;
        let builders = self.registry.builders();

        Ok(PipelineSchedule {
            fragments: fragment_schedule
                .order
                .iter()
                .map(|&index| {
                    let helper = &fragments[index];
                    ScheduledFragment {
                        key: helper.key.clone(),
                        depends_on: helper.depends_on.clone(),
                        mode: helper.mode,
                        origin: helper.origin.clone(),
                    }
                })
                .collect(),
            superseded: fragment_schedule
                .superseded
                .iter()
                .map(|&index| fragments[index].key.clone())
                .collect(),
            builders: schedule_builders(builders)
                .into_iter()
                .map(|index| {
                    let helper = &builders[index];
                    ScheduledBuilder {
                        key: helper.key.clone(),
                        priority: helper.priority,
                        origin: helper.origin.clone(),
                    }
                })
                .collect(),
            extensions: self
                .extensions
                .iter()
                .map(|extension| extension.key().to_string())
                .collect(),
        })
    }

    pub async fn run(&self, options: RunOptions) -> Result<RunResult, PipelineError> {
        let span = info_span!("pipeline_run", phase = %options.phase, namespace = %options.namespace);
        let result = self.run_stages(&options).instrument(span).await;
        if let Err(err) = &result {
            options.reporter.error(err);
        }
        result
    }

    async fn run_stages(&self, options: &RunOptions) -> Result<RunResult, PipelineError> {
        let mut steps = Vec::new();

        let registration = RegistrationContext { options };
        let mut hooks: Vec<(String, Arc<dyn ExtensionHook>)> = Vec::new();
        for extension in &self.extensions {
            if let Some(hook) = extension.register(&registration).await? {
                hooks.push((extension.key().to_string(), hook));
            }
        }

        let artifact = fragment::run_fragments(
            &self.registry,
            &self.required_families,
            options,
            &mut steps,
        )
        .await?;

        let (artifact, ledger) = saga::run_hooks(&hooks, artifact, options, &mut steps).await?;

        let writes = match builder::run_builders(&self.registry, &artifact, options, &mut steps)
            .await
        {
            Ok(writes) => writes,
            Err(err) => {
                ledger.rollback_all().await;
                return Err(err);
            }
        };

        ledger.commit_all(&mut steps).await?;

        info!(steps = steps.len(), writes = writes.len(), "Pipeline run complete");
        Ok(RunResult {
            artifact,
            diagnostics: options.reporter.diagnostics(),
            steps,
            writes,
        })
    }
}

pub struct FragmentSurface<'a> {
    registry: &'a mut HelperRegistry,
}

impl FragmentSurface<'_> {
    pub fn use_helper(&mut self, helper: impl Into<Helper>) -> Result<(), PipelineError> {
        self.registry.register_fragment(helper.into())
    }
}

pub struct BuilderSurface<'a> {
    registry: &'a mut HelperRegistry,
}

impl BuilderSurface<'_> {
    pub fn use_helper(&mut self, helper: impl Into<Helper>) -> Result<(), PipelineError> {
        self.registry.register_builder(helper.into())
    }
}

pub struct ExtensionSurface<'a> {
    extensions: &'a mut Vec<Arc<dyn PipelineExtension>>,
}

impl ExtensionSurface<'_> {
    pub fn use_extension(&mut self, extension: impl PipelineExtension + 'static) {
        self.extensions.push(Arc::new(extension));
    }
}
