//! Adapter extension sandbox
//!
//! Adapter extensions are third-party code that may adjust the IR and emit extra files. They
//! never touch the filesystem directly: each one works on its own [`IrSnapshot`] and queues
//! files into a shared [`AdapterSandbox`], which only writes them when the pipeline commits.
//!
//! All candidates are validated before any of them runs. If one fails, the queue is discarded
//! and nothing is written.

use crate::config::GenpipeConfig;
use crate::error::PipelineError;
use crate::ir::{IrArtifact, IrSnapshot, SNAPSHOT_VERSION};
use crate::pipeline::{
    ExecutionContext, ExtensionHook, HookOutcome, PipelineExtension, RegistrationContext,
    RunOptions,
};
use crate::reporter::Reporter;
use crate::writer::FileWriter;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

pub mod containment;
pub mod format;
pub mod staging;

pub use format::{SourceFormatter, WhitespaceFormatter};
pub use staging::{AdapterSandbox, SandboxState, StagedFile};

/// Key under which the sandbox runs as a pipeline extension
pub const ADAPTER_EXTENSIONS_KEY: &str = "genpipe.adapter-extensions";

#[async_trait]
pub trait AdapterExtension: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, ctx: &mut AdapterContext<'_>) -> anyhow::Result<()>;
}

/// Produces adapter extensions for a run
///
/// Implemented for closures taking the artifact and the config.
pub trait AdapterExtensionFactory: Send + Sync {
    fn create(
        &self,
        artifact: &IrArtifact,
        config: &GenpipeConfig,
    ) -> anyhow::Result<Vec<Box<dyn AdapterExtension>>>;
}

impl<F> AdapterExtensionFactory for F
where
    F: Fn(&IrArtifact, &GenpipeConfig) -> anyhow::Result<Vec<Box<dyn AdapterExtension>>>
        + Send
        + Sync,
{
    fn create(
        &self,
        artifact: &IrArtifact,
        config: &GenpipeConfig,
    ) -> anyhow::Result<Vec<Box<dyn AdapterExtension>>> {
        self(artifact, config)
    }
}

#[derive(Clone)]
pub struct Formatters {
    pub php: Arc<dyn SourceFormatter>,
    pub ts: Arc<dyn SourceFormatter>,
}

impl Default for Formatters {
    fn default() -> Self {
        Self {
            php: Arc::new(WhitespaceFormatter::php()),
            ts: Arc::new(WhitespaceFormatter::typescript()),
        }
    }
}

/// What one extension sees while it runs
pub struct AdapterContext<'a> {
    name: &'a str,
    ir: IrSnapshot,
    submitted: Option<IrSnapshot>,
    sandbox: &'a AdapterSandbox,
    config_directory: &'a Path,
    temp_dir: &'a Path,
    formatters: &'a Formatters,
    pub reporter: Reporter,
}

impl AdapterContext<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    /// This extension's private copy of the IR
    pub fn ir(&self) -> &IrSnapshot {
        &self.ir
    }

    pub fn ir_mut(&mut self) -> &mut IrSnapshot {
        &mut self.ir
    }

    /// Make `next` the working IR for later extensions and the pipeline
    pub fn update_ir(&mut self, next: IrSnapshot) -> Result<(), PipelineError> {
        if next.version != SNAPSHOT_VERSION {
            return Err(PipelineError::SnapshotVersion {
                expected: SNAPSHOT_VERSION,
                actual: next.version,
            });
        }
        self.submitted = Some(next);
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        self.sandbox.output_dir()
    }

    pub fn config_directory(&self) -> &Path {
        self.config_directory
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir
    }

    /// Stage a file relative to the output directory; returns the resolved target
    pub fn queue_file(
        &self,
        path: impl AsRef<Path>,
        contents: impl Into<Vec<u8>>,
    ) -> Result<PathBuf, PipelineError> {
        self.sandbox.stage(self.name, path.as_ref(), contents.into())
    }

    pub fn format_php(
        &self,
        path: impl AsRef<Path>,
        contents: &str,
    ) -> Result<String, PipelineError> {
        self.formatters.php.format(path.as_ref(), contents)
    }

    pub fn format_ts(
        &self,
        path: impl AsRef<Path>,
        contents: &str,
    ) -> Result<String, PipelineError> {
        self.formatters.ts.format(path.as_ref(), contents)
    }
}

/// Where and how a sandbox run writes
pub struct AdapterRunOptions {
    pub output_dir: PathBuf,
    pub config_directory: PathBuf,
    pub writer: Arc<dyn FileWriter>,
    pub formatters: Formatters,
    pub reporter: Reporter,
}

#[derive(Debug)]
pub struct AdapterRunResult {
    pub artifact: IrArtifact,
    pub sandbox: AdapterSandbox,
}

/// Instantiate and validate every candidate; nothing runs if any is malformed.
fn collect_extensions(
    factories: &[Arc<dyn AdapterExtensionFactory>],
    artifact: &IrArtifact,
    config: &GenpipeConfig,
) -> Result<Vec<Box<dyn AdapterExtension>>, PipelineError> {
    let mut extensions = Vec::new();
    let mut seen = HashSet::new();

    for (index, factory) in factories.iter().enumerate() {
        let produced = factory.create(artifact, config).map_err(|e| {
            PipelineError::InvalidAdapterExtension {
                message: format!("factory #{} failed: {:#}", index, e),
            }
        })?;
        for extension in produced {
            let name = extension.name().trim().to_string();
            if name.is_empty() {
                return Err(PipelineError::InvalidAdapterExtension {
                    message: format!("factory #{} produced an extension without a name", index),
                });
            }
            if !seen.insert(name.clone()) {
                return Err(PipelineError::InvalidAdapterExtension {
                    message: format!("duplicate adapter extension name '{}'", name),
                });
            }
            extensions.push(extension);
        }
    }
    Ok(extensions)
}

/// Run adapter extensions one after another against isolated IR snapshots.
///
/// On success the returned sandbox holds every queued file, uncommitted. On failure the queue
/// is discarded, the error is normalized and reported, then returned.
pub async fn run_adapter_extensions(
    factories: &[Arc<dyn AdapterExtensionFactory>],
    artifact: IrArtifact,
    config: &GenpipeConfig,
    options: &AdapterRunOptions,
) -> Result<AdapterRunResult, PipelineError> {
    let extensions = match collect_extensions(factories, &artifact, config) {
        Ok(extensions) => extensions,
        Err(err) => {
            options.reporter.error(&err);
            return Err(err);
        }
    };

    if extensions.is_empty() {
        debug!("No adapter extensions, skipping sandbox");
        return Ok(AdapterRunResult {
            artifact,
            sandbox: AdapterSandbox::inert(&options.output_dir, Arc::clone(&options.writer))?,
        });
    }

    let sandbox = AdapterSandbox::new(&options.output_dir, Arc::clone(&options.writer))?;
    let temp_dir = sandbox
        .temp_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    let mut current = artifact;

    for extension in &extensions {
        let name = extension.name().trim();
        let span = info_span!("adapter_extension", extension = %name);
        let mut ctx = AdapterContext {
            name,
            ir: current.snapshot(),
            submitted: None,
            sandbox: &sandbox,
            config_directory: &options.config_directory,
            temp_dir: &temp_dir,
            formatters: &options.formatters,
            reporter: options.reporter.child(name),
        };

        let applied = extension.apply(&mut ctx).instrument(span).await;
        let submitted = ctx.submitted.take();
        let next = applied.map_err(PipelineError::normalize).and_then(|()| match submitted {
            Some(snapshot) => current.apply_snapshot(snapshot).map(Some),
            None => Ok(None),
        });

        match next {
            Ok(Some(next)) => {
                debug!(extension = %name, "Adapter extension updated the IR");
                current = next;
            }
            Ok(None) => {}
            Err(err) => {
                sandbox.discard();
                options.reporter.child(name).error(&err);
                return Err(err);
            }
        }
    }

    info!(
        extensions = extensions.len(),
        staged = sandbox.pending(),
        "Adapter extensions complete"
    );
    Ok(AdapterRunResult {
        artifact: current,
        sandbox,
    })
}

/// Runs the adapter sandbox inside the extension saga
pub struct AdapterExtensionsHook {
    factories: Vec<Arc<dyn AdapterExtensionFactory>>,
    writer: Arc<dyn FileWriter>,
    formatters: Formatters,
}

#[async_trait]
impl ExtensionHook for AdapterExtensionsHook {
    async fn apply(
        &self,
        artifact: &IrArtifact,
        options: &RunOptions,
        ctx: &ExecutionContext<'_>,
    ) -> Result<HookOutcome, PipelineError> {
        let config_directory = options
            .source_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| options.workspace.resolve(dir))
            .unwrap_or_else(|| options.workspace.root().to_path_buf());

        let run_options = AdapterRunOptions {
            output_dir: options.workspace.resolve(&options.config.output.dir),
            config_directory,
            writer: Arc::clone(&self.writer),
            formatters: self.formatters.clone(),
            reporter: ctx.reporter.clone(),
        };

        let result =
            run_adapter_extensions(&self.factories, artifact.clone(), &options.config, &run_options)
                .await?;

        let mut outcome = HookOutcome::unchanged().with_transaction(result.sandbox);
        if !result.artifact.same_data(artifact) {
            outcome = outcome.with_artifact(result.artifact);
        }
        Ok(outcome)
    }
}

/// Pipeline extension that contributes the adapter sandbox hook
pub struct AdapterExtensions {
    factories: Vec<Arc<dyn AdapterExtensionFactory>>,
    writer: Arc<dyn FileWriter>,
    formatters: Formatters,
}

impl AdapterExtensions {
    pub fn new(writer: Arc<dyn FileWriter>) -> Self {
        Self {
            factories: Vec::new(),
            writer,
            formatters: Formatters::default(),
        }
    }

    pub fn factory(mut self, factory: impl AdapterExtensionFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn formatters(mut self, formatters: Formatters) -> Self {
        self.formatters = formatters;
        self
    }
}

#[async_trait]
impl PipelineExtension for AdapterExtensions {
    fn key(&self) -> &str {
        ADAPTER_EXTENSIONS_KEY
    }

    async fn register(
        &self,
        _ctx: &RegistrationContext<'_>,
    ) -> Result<Option<Arc<dyn ExtensionHook>>, PipelineError> {
        Ok(Some(Arc::new(AdapterExtensionsHook {
            factories: self.factories.clone(),
            writer: Arc::clone(&self.writer),
            formatters: self.formatters.clone(),
        })))
    }
}
