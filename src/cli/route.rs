//! CLI route: single route table and run context.

use crate::builtin::{register_core_helpers, MANIFEST_FILE};
use crate::config::{workspace_config_path, ConfigLoader, GenpipeConfig};
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, RunOptions};
use crate::reporter::Reporter;
use crate::sandbox::AdapterExtensions;
use crate::workspace::{GenerationState, Workspace};
use crate::writer::{apply_write_actions, FileWriter, FsFileWriter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::cli::parse::{Commands, PlanFormat};
use crate::cli::presentation::{
    format_generate_summary, format_plan_json, format_plan_text, format_validation_result,
};

/// Runtime context for CLI execution: workspace, loaded config and where it came from.
pub struct RunContext {
    workspace: Workspace,
    config: Arc<GenpipeConfig>,
    source_path: PathBuf,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, PipelineError> {
        let (config, source_path) = match config_path {
            Some(path) => (ConfigLoader::load_from_file(&path)?, path),
            None => (
                ConfigLoader::load(&workspace_root)?,
                workspace_config_path(&workspace_root),
            ),
        };
        Ok(Self {
            workspace: Workspace::new(workspace_root),
            config: Arc::new(config),
            source_path,
        })
    }

    pub fn config(&self) -> &GenpipeConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn execute(&self, command: &Commands) -> Result<String, PipelineError> {
        match command {
            Commands::Generate { dry_run } => self.generate(*dry_run),
            Commands::Plan { format } => self.plan(*format),
            Commands::Validate => self.validate(),
        }
    }

    fn ensure_valid(&self) -> Result<(), PipelineError> {
        self.config.validate().map_err(|errors| {
            PipelineError::ConfigError(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }

    fn pipeline(&self, writer: Arc<dyn FileWriter>) -> Result<Pipeline, PipelineError> {
        let mut pipeline =
            Pipeline::new().with_required_families(self.config.generation.required_families.clone());
        register_core_helpers(&mut pipeline)?;
        pipeline
            .extensions()
            .use_extension(AdapterExtensions::new(writer));
        Ok(pipeline)
    }

    fn generate(&self, dry_run: bool) -> Result<String, PipelineError> {
        self.ensure_valid()?;
        let dry_run = dry_run || self.config.generation.dry_run;
        let writer = Arc::new(FsFileWriter::new(dry_run));
        let pipeline = self.pipeline(writer.clone())?;

        let manifest_path = self
            .workspace
            .resolve(&self.config.output.dir)
            .join(MANIFEST_FILE);
        let options = RunOptions {
            phase: "generate".to_string(),
            config: Arc::clone(&self.config),
            namespace: self.config.project.namespace.clone(),
            origin: self
                .source_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "genpipe".to_string()),
            source_path: self.source_path.clone(),
            workspace: self.workspace.clone(),
            reporter: Reporter::new("genpipe"),
            generation_state: GenerationState::load(&manifest_path)?,
        };

        let runtime = tokio::runtime::Runtime::new().map_err(|e| PipelineError::Environment {
            message: "Failed to start async runtime".to_string(),
            source: e,
        })?;
        let result = runtime.block_on(pipeline.run(options))?;

        apply_write_actions(writer.as_ref(), self.workspace.root(), &result.writes)?;
        let summary = writer.summary();
        info!(
            written = summary.written,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            "Generation complete"
        );
        Ok(format_generate_summary(
            &summary,
            &result.diagnostics,
            self.workspace.root(),
            dry_run,
        ))
    }

    fn plan(&self, format: PlanFormat) -> Result<String, PipelineError> {
        let writer = Arc::new(FsFileWriter::new(true));
        let schedule = self.pipeline(writer)?.schedule()?;
        match format {
            PlanFormat::Text => Ok(format_plan_text(&schedule)),
            PlanFormat::Json => format_plan_json(&schedule),
        }
    }

    fn validate(&self) -> Result<String, PipelineError> {
        let result = self.config.validate();
        let text = format_validation_result(&result);
        match result {
            Ok(()) => Ok(text),
            Err(_) => Err(PipelineError::ConfigError(text)),
        }
    }
}
