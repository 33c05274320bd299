//! Core fragments

use crate::builtin::render::{php_controller_file, sanitize_namespace, ts_client_file};
use crate::builtin::{DEFAULT_CAPABILITY, MANIFEST_FILE};
use crate::error::PipelineError;
use crate::helper::FragmentApply;
use crate::ir::{
    ArtifactKind, ArtifactPlan, CapabilityEntry, CapabilityMap, CapabilitySource, IrMeta,
    IrResource, PlannedArtifact, ProjectLayout,
};
use crate::pipeline::FragmentContext;
use async_trait::async_trait;
use serde_json::json;

/// Project identity from the run options and `[project]`
pub struct MetaFragment;

#[async_trait]
impl FragmentApply for MetaFragment {
    async fn apply(&self, ctx: &mut FragmentContext<'_>) -> Result<(), PipelineError> {
        let options = ctx.options;
        let namespace = if options.namespace.trim().is_empty() {
            options.config.project.namespace.clone()
        } else {
            options.namespace.clone()
        };
        let sanitized = sanitize_namespace(&namespace);
        if sanitized.is_empty() {
            return Err(PipelineError::HelperRejected {
                key: ctx.key().to_string(),
                message: format!("namespace '{}' has no usable characters", namespace),
            });
        }

        ctx.assign().set_meta(IrMeta {
            namespace,
            sanitized_namespace: sanitized,
            version: options.config.project.version.clone(),
            origin: options.origin.clone(),
            source_path: options.source_path.display().to_string(),
        })
    }
}

/// Output layout from `[output]`
pub struct LayoutFragment;

#[async_trait]
impl FragmentApply for LayoutFragment {
    async fn apply(&self, ctx: &mut FragmentContext<'_>) -> Result<(), PipelineError> {
        let options = ctx.options;
        let output = &options.config.output;
        let layout = ProjectLayout {
            output_dir: output.dir.trim_end_matches('/').to_string(),
            php_dir: output.php_dir.trim_matches('/').to_string(),
            ts_dir: output.ts_dir.trim_matches('/').to_string(),
        };
        ctx.assign().set_layout(layout)
    }
}

/// Resources from `[[project.resources]]`
pub struct ResourcesFragment;

#[async_trait]
impl FragmentApply for ResourcesFragment {
    async fn apply(&self, ctx: &mut FragmentContext<'_>) -> Result<(), PipelineError> {
        let resources = ctx.options.config.project.resources.clone();
        let mut writer = ctx.assign();
        for resource in resources {
            writer.put_resource(IrResource {
                name: resource.name,
                route: resource.route,
                capability: resource.capability,
            })?;
        }
        Ok(())
    }
}

/// Resolve the capability keys resources refer to.
///
/// Keys missing from `[project.capabilities]` fall back to the default capability and are
/// reported.
pub struct CapabilityMapFragment;

#[async_trait]
impl FragmentApply for CapabilityMapFragment {
    async fn apply(&self, ctx: &mut FragmentContext<'_>) -> Result<(), PipelineError> {
        let options = ctx.options;
        let configured = &options.config.project.capabilities;
        let mut map = CapabilityMap::default();

        let keys: Vec<String> = ctx
            .draft()
            .resources()
            .filter_map(|resource| resource.capability.clone())
            .collect();
        for key in keys {
            if map.entries.contains_key(&key) {
                continue;
            }
            let entry = match configured.get(&key) {
                Some(capability) => CapabilityEntry {
                    capability: capability.clone(),
                    source: CapabilitySource::Config,
                },
                None => {
                    ctx.reporter.warn(
                        "Capability key is not mapped, using default",
                        json!({ "key": key, "default": DEFAULT_CAPABILITY }),
                    );
                    map.missing.push(key.clone());
                    CapabilityEntry {
                        capability: DEFAULT_CAPABILITY.to_string(),
                        source: CapabilitySource::Default,
                    }
                }
            };
            map.entries.insert(key, entry);
        }

        ctx.assign().set_capability_map(map)
    }
}

/// Plan one PHP controller and one TypeScript client per resource, plus the manifest
pub struct ArtifactPlanFragment;

#[async_trait]
impl FragmentApply for ArtifactPlanFragment {
    async fn apply(&self, ctx: &mut FragmentContext<'_>) -> Result<(), PipelineError> {
        let layout = ctx
            .draft()
            .layout()
            .cloned()
            .ok_or_else(|| PipelineError::HelperRejected {
                key: ctx.key().to_string(),
                message: "layout must be assigned before planning artifacts".to_string(),
            })?;

        let mut plan = ArtifactPlan::default();
        let names: Vec<String> = ctx.draft().resources().map(|r| r.name.clone()).collect();
        for name in &names {
            plan.entries.push(PlannedArtifact {
                id: format!("php-controller:{}", name),
                kind: ArtifactKind::PhpController,
                path: layout.php_path(&php_controller_file(name)),
                resource: Some(name.clone()),
            });
        }
        for name in &names {
            plan.entries.push(PlannedArtifact {
                id: format!("ts-client:{}", name),
                kind: ArtifactKind::TsClient,
                path: layout.ts_path(&ts_client_file(name)),
                resource: Some(name.clone()),
            });
        }
        plan.entries.push(PlannedArtifact {
            id: "manifest".to_string(),
            kind: ArtifactKind::Manifest,
            path: layout.root_path(MANIFEST_FILE),
            resource: None,
        });

        ctx.assign().set_artifact_plan(plan)
    }
}
