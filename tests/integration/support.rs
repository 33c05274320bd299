//! Shared fixtures for integration tests

use async_trait::async_trait;
use genpipe::config::{GenpipeConfig, ResourceConfig};
use genpipe::helper::{FragmentApply, FragmentHelper};
use genpipe::ir::{
    ArtifactPlan, CapabilityMap, IrArtifact, IrData, IrMeta, IrResource, ProjectLayout,
};
use genpipe::pipeline::{FragmentContext, RunOptions};
use genpipe::reporter::Reporter;
use genpipe::workspace::{GenerationState, Workspace};
use genpipe::PipelineError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

pub fn sample_config() -> GenpipeConfig {
    let mut config = GenpipeConfig::default();
    config.project.namespace = "Acme Demo".to_string();
    config.project.resources = vec![
        ResourceConfig {
            name: "books".to_string(),
            route: "/acme/v1/books".to_string(),
            capability: Some("manage_books".to_string()),
        },
        ResourceConfig {
            name: "authors".to_string(),
            route: "/acme/v1/authors".to_string(),
            capability: Some("unmapped".to_string()),
        },
    ];
    config
        .project
        .capabilities
        .insert("manage_books".to_string(), "edit_posts".to_string());
    config
}

pub const SAMPLE_TOML: &str = r#"
[project]
namespace = "Acme Demo"

[[project.resources]]
name = "books"
route = "/acme/v1/books"
capability = "manage_books"

[project.capabilities]
manage_books = "edit_posts"

[logging]
enabled = false
"#;

fn meta() -> IrMeta {
    IrMeta {
        namespace: "t".to_string(),
        sanitized_namespace: "t".to_string(),
        version: "0".to_string(),
        origin: "test".to_string(),
        source_path: String::new(),
    }
}

fn layout() -> ProjectLayout {
    ProjectLayout {
        output_dir: "out".to_string(),
        php_dir: "php".to_string(),
        ts_dir: "ts".to_string(),
    }
}

/// Minimal finalized artifact with one resource
pub fn sample_artifact() -> IrArtifact {
    IrArtifact::new(IrData {
        meta: meta(),
        capability_map: CapabilityMap::default(),
        layout: layout(),
        artifact_plan: ArtifactPlan::default(),
        resources: vec![IrResource {
            name: "books".to_string(),
            route: "/acme/v1/books".to_string(),
            capability: None,
        }],
        extras: BTreeMap::new(),
    })
}

pub fn run_options(root: &Path, config: GenpipeConfig) -> RunOptions {
    RunOptions {
        phase: "test".to_string(),
        namespace: config.project.namespace.clone(),
        config: Arc::new(config),
        origin: "genpipe.toml".to_string(),
        source_path: root.join("genpipe.toml"),
        workspace: Workspace::new(root),
        reporter: Reporter::new("test"),
        generation_state: GenerationState::default(),
    }
}

/// Fragment that appends its key to a shared log and optionally fills the mandatory fields
pub struct Recorder {
    pub log: Log,
    pub fill: bool,
}

#[async_trait]
impl FragmentApply for Recorder {
    async fn apply(&self, ctx: &mut FragmentContext<'_>) -> Result<(), PipelineError> {
        self.log.lock().push(ctx.key().to_string());
        if self.fill {
            let mut writer = ctx.assign();
            writer.set_meta(meta())?;
            writer.set_capability_map(CapabilityMap::default())?;
            writer.set_layout(layout())?;
            writer.set_artifact_plan(ArtifactPlan::default())?;
        }
        Ok(())
    }
}

pub fn recorder(key: &str, log: &Log) -> FragmentHelper {
    FragmentHelper::new(
        key,
        Recorder {
            log: Arc::clone(log),
            fill: false,
        },
    )
}

/// Fragment that fills every mandatory field so finalization succeeds
pub fn filler(key: &str, log: &Log) -> FragmentHelper {
    FragmentHelper::new(
        key,
        Recorder {
            log: Arc::clone(log),
            fill: true,
        },
    )
}
