//! Core builders

use crate::builtin::render::{php_controller, ts_client};
use crate::error::PipelineError;
use crate::helper::BuilderApply;
use crate::ir::{ArtifactKind, IrData, PlannedArtifact};
use crate::pipeline::BuilderContext;
use crate::writer::content_hash;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

fn planned_resource<'a>(
    data: &'a IrData,
    entry: &PlannedArtifact,
    builder: &str,
) -> Result<&'a crate::ir::IrResource, PipelineError> {
    entry
        .resource
        .as_deref()
        .and_then(|name| data.resource(name))
        .ok_or_else(|| PipelineError::HelperRejected {
            key: builder.to_string(),
            message: format!("planned artifact '{}' names no known resource", entry.id),
        })
}

/// Render the contents of a planned PHP or TypeScript artifact
pub fn render_planned(
    data: &IrData,
    entry: &PlannedArtifact,
    builder: &str,
) -> Result<Option<String>, PipelineError> {
    match entry.kind {
        ArtifactKind::PhpController => Ok(Some(php_controller(
            data,
            planned_resource(data, entry, builder)?,
        ))),
        ArtifactKind::TsClient => Ok(Some(ts_client(
            data,
            planned_resource(data, entry, builder)?,
        ))),
        ArtifactKind::Manifest => Ok(None),
    }
}

fn queue_kind(ctx: &mut BuilderContext<'_>, kind: ArtifactKind) -> Result<(), PipelineError> {
    let artifact = ctx.artifact().clone();
    let data = artifact.data();
    for entry in data.artifact_plan.of_kind(kind) {
        if let Some(contents) = render_planned(data, entry, ctx.key())? {
            ctx.queue_write(entry.path.as_str(), contents);
        }
    }
    Ok(())
}

pub struct PhpControllersBuilder;

#[async_trait]
impl BuilderApply for PhpControllersBuilder {
    async fn apply(&self, ctx: &mut BuilderContext<'_>) -> Result<(), PipelineError> {
        queue_kind(ctx, ArtifactKind::PhpController)
    }
}

pub struct TsClientsBuilder;

#[async_trait]
impl BuilderApply for TsClientsBuilder {
    async fn apply(&self, ctx: &mut BuilderContext<'_>) -> Result<(), PipelineError> {
        queue_kind(ctx, ArtifactKind::TsClient)
    }
}

/// Manifest layout; `files` is what the next run reads back as its generation state
#[derive(Debug, Serialize)]
struct Manifest<'a> {
    version: u32,
    namespace: &'a str,
    fingerprint: String,
    files: BTreeMap<&'a str, String>,
    stale: Vec<String>,
}

/// Writes the manifest: IR fingerprint, planned file hashes, and files no longer produced
pub struct ManifestBuilder;

#[async_trait]
impl BuilderApply for ManifestBuilder {
    async fn apply(&self, ctx: &mut BuilderContext<'_>) -> Result<(), PipelineError> {
        let artifact = ctx.artifact().clone();
        let data = artifact.data();

        let mut files = BTreeMap::new();
        for entry in &data.artifact_plan.entries {
            if let Some(contents) = render_planned(data, entry, ctx.key())? {
                files.insert(entry.path.as_str(), content_hash(contents.as_bytes()));
            }
        }

        let stale = ctx
            .input
            .options
            .generation_state
            .stale_paths(files.keys().copied());
        if !stale.is_empty() {
            ctx.reporter.warn(
                "Previously generated files are no longer produced",
                serde_json::json!({ "stale": stale }),
            );
        }

        let Some(target) = data.artifact_plan.of_kind(ArtifactKind::Manifest).next() else {
            return Ok(());
        };
        let manifest = Manifest {
            version: 1,
            namespace: &data.meta.sanitized_namespace,
            fingerprint: artifact.fingerprint()?,
            files,
            stale,
        };
        let mut contents = serde_json::to_vec_pretty(&manifest)?;
        contents.push(b'\n');
        ctx.queue_write(target.path.as_str(), contents);
        Ok(())
    }
}
