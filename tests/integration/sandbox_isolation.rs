//! Adapter extensions: staged writes, snapshot isolation and path containment

use super::support::{filler, new_log, run_options, sample_artifact, sample_config};
use async_trait::async_trait;
use genpipe::config::GenpipeConfig;
use genpipe::ir::IrArtifact;
use genpipe::pipeline::{Pipeline, StepPhase, Transaction};
use genpipe::reporter::Reporter;
use genpipe::sandbox::{
    run_adapter_extensions, AdapterContext, AdapterExtension, AdapterExtensionFactory,
    AdapterExtensions, AdapterRunOptions, Formatters, SandboxState,
};
use genpipe::writer::{FileWriter, FsFileWriter, WriteStatus};
use genpipe::{ErrorKind, PipelineError};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

type Act = fn(&mut AdapterContext<'_>) -> anyhow::Result<()>;

struct Scripted {
    name: &'static str,
    act: Act,
}

#[async_trait]
impl AdapterExtension for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    async fn apply(&self, ctx: &mut AdapterContext<'_>) -> anyhow::Result<()> {
        (self.act)(ctx)
    }
}

fn script(name: &'static str, act: Act) -> (&'static str, Act) {
    (name, act)
}

fn factory(scripts: Vec<(&'static str, Act)>) -> Arc<dyn AdapterExtensionFactory> {
    Arc::new(
        move |_: &IrArtifact, _: &GenpipeConfig| -> anyhow::Result<Vec<Box<dyn AdapterExtension>>> {
            Ok(scripts
                .iter()
                .map(|&(name, act)| Box::new(Scripted { name, act }) as Box<dyn AdapterExtension>)
                .collect())
        },
    )
}

fn adapter_options(dir: &TempDir, writer: Arc<FsFileWriter>) -> AdapterRunOptions {
    AdapterRunOptions {
        output_dir: dir.path().join("out"),
        config_directory: dir.path().to_path_buf(),
        writer,
        formatters: Formatters::default(),
        reporter: Reporter::new("adapters"),
    }
}

fn write_a(ctx: &mut AdapterContext<'_>) -> anyhow::Result<()> {
    ctx.queue_file("a.txt", "alpha")?;
    Ok(())
}

fn write_b_then_fail(ctx: &mut AdapterContext<'_>) -> anyhow::Result<()> {
    ctx.queue_file("b.txt", "beta")?;
    anyhow::bail!("adapter exploded")
}

fn escape_parent(ctx: &mut AdapterContext<'_>) -> anyhow::Result<()> {
    ctx.queue_file("nested/../../escape.txt", "nope")?;
    Ok(())
}

fn escape_symlink(ctx: &mut AdapterContext<'_>) -> anyhow::Result<()> {
    ctx.queue_file("link/escape.txt", "nope")?;
    Ok(())
}

fn mutate_without_update(ctx: &mut AdapterContext<'_>) -> anyhow::Result<()> {
    ctx.ir_mut()
        .data
        .extras
        .insert("hidden".to_string(), json!(true));
    Ok(())
}

fn mutate_and_update(ctx: &mut AdapterContext<'_>) -> anyhow::Result<()> {
    let mut next = ctx.ir().clone();
    next.data.extras.insert("visible".to_string(), json!(true));
    ctx.update_ir(next)?;
    Ok(())
}

/// Records what it can see as a file so later assertions can check isolation
fn observe(ctx: &mut AdapterContext<'_>) -> anyhow::Result<()> {
    let keys: Vec<_> = ctx.ir().data.extras.keys().cloned().collect();
    ctx.queue_file("observed.json", serde_json::to_vec(&keys)?)?;
    Ok(())
}

fn bad_version(ctx: &mut AdapterContext<'_>) -> anyhow::Result<()> {
    let mut next = ctx.ir().clone();
    next.version += 1;
    ctx.update_ir(next)?;
    Ok(())
}

fn formatted_php(ctx: &mut AdapterContext<'_>) -> anyhow::Result<()> {
    let contents = ctx.format_php("Extra.php", "\n\nclass Extra {}   \n\n")?;
    ctx.queue_file("php/Extra.php", contents)?;
    Ok(())
}

#[tokio::test]
async fn failure_discards_files_from_every_extension() {
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(FsFileWriter::new(false));
    let options = adapter_options(&dir, writer.clone());

    let err = run_adapter_extensions(
        &[factory(vec![script("e1", write_a), script("e2", write_b_then_fail)])],
        sample_artifact(),
        &GenpipeConfig::default(),
        &options,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("adapter exploded"));
    assert!(!dir.path().join("out/a.txt").exists());
    assert!(!dir.path().join("out/b.txt").exists());
    assert!(writer.summary().is_empty());
    let diagnostics = options.reporter.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].scope, "adapters.e2");
}

#[tokio::test]
async fn commit_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(FsFileWriter::new(false));
    let result = run_adapter_extensions(
        &[factory(vec![script("e1", write_a)])],
        sample_artifact(),
        &GenpipeConfig::default(),
        &adapter_options(&dir, writer.clone()),
    )
    .await
    .unwrap();

    result.sandbox.commit().await.unwrap();
    let first = result.sandbox.summary();
    result.sandbox.commit().await.unwrap();

    assert_eq!(result.sandbox.summary(), first);
    assert_eq!(first.written, 1);
    assert_eq!(writer.summary().records.len(), 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("out/a.txt")).unwrap(),
        "alpha"
    );
}

#[tokio::test]
async fn rollback_is_idempotent_and_blocks_commit() {
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(FsFileWriter::new(false));
    let result = run_adapter_extensions(
        &[factory(vec![script("e1", write_a)])],
        sample_artifact(),
        &GenpipeConfig::default(),
        &adapter_options(&dir, writer.clone()),
    )
    .await
    .unwrap();

    result.sandbox.rollback().await.unwrap();
    result.sandbox.rollback().await.unwrap();
    result.sandbox.commit().await.unwrap();

    assert_eq!(result.sandbox.state(), SandboxState::RolledBack);
    assert!(!dir.path().join("out/a.txt").exists());
    assert!(writer.summary().is_empty());
}

#[tokio::test]
async fn parent_traversal_is_rejected() {
    let dir = TempDir::new().unwrap();
    let err = run_adapter_extensions(
        &[factory(vec![script("e1", write_a), script("sneaky", escape_parent)])],
        sample_artifact(),
        &GenpipeConfig::default(),
        &adapter_options(&dir, Arc::new(FsFileWriter::new(false))),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::PathEscape { .. }));
    assert_eq!(err.kind(), ErrorKind::Developer);
    assert!(!dir.path().join("escape.txt").exists());
    assert!(!dir.path().join("out/a.txt").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directory_cannot_escape() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("out")).unwrap();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("out/link")).unwrap();

    let err = run_adapter_extensions(
        &[factory(vec![script("linker", escape_symlink)])],
        sample_artifact(),
        &GenpipeConfig::default(),
        &adapter_options(&dir, Arc::new(FsFileWriter::new(false))),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::PathEscape { .. }));
    assert!(!outside.path().join("escape.txt").exists());
}

#[tokio::test]
async fn snapshot_changes_need_update_ir() {
    let dir = TempDir::new().unwrap();
    let artifact = sample_artifact();
    let result = run_adapter_extensions(
        &[factory(vec![
            script("quiet", mutate_without_update),
            script("loud", mutate_and_update),
            script("observer", observe),
        ])],
        artifact.clone(),
        &GenpipeConfig::default(),
        &adapter_options(&dir, Arc::new(FsFileWriter::new(false))),
    )
    .await
    .unwrap();

    let extras = &result.artifact.data().extras;
    assert!(extras.contains_key("visible"));
    assert!(!extras.contains_key("hidden"));
    assert!(artifact.data().extras.is_empty());

    result.sandbox.commit().await.unwrap();
    let observed = std::fs::read_to_string(dir.path().join("out/observed.json")).unwrap();
    assert_eq!(observed, r#"["visible"]"#);
}

#[tokio::test]
async fn unsupported_snapshot_version_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let err = run_adapter_extensions(
        &[factory(vec![script("e1", write_a), script("future", bad_version)])],
        sample_artifact(),
        &GenpipeConfig::default(),
        &adapter_options(&dir, Arc::new(FsFileWriter::new(false))),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::SnapshotVersion { .. }));
    assert!(!dir.path().join("out/a.txt").exists());
}

#[tokio::test]
async fn formatter_output_is_staged_verbatim() {
    let dir = TempDir::new().unwrap();
    let result = run_adapter_extensions(
        &[factory(vec![script("fmt", formatted_php)])],
        sample_artifact(),
        &GenpipeConfig::default(),
        &adapter_options(&dir, Arc::new(FsFileWriter::new(false))),
    )
    .await
    .unwrap();
    result.sandbox.commit().await.unwrap();

    let written = std::fs::read_to_string(dir.path().join("out/php/Extra.php")).unwrap();
    assert!(written.starts_with("<?php"));
    assert!(written.ends_with("class Extra {}\n"));
}

#[tokio::test]
async fn no_extensions_is_a_fast_path() {
    let dir = TempDir::new().unwrap();
    let artifact = sample_artifact();
    let result = run_adapter_extensions(
        &[factory(Vec::new())],
        artifact.clone(),
        &GenpipeConfig::default(),
        &adapter_options(&dir, Arc::new(FsFileWriter::new(false))),
    )
    .await
    .unwrap();

    assert!(result.artifact.same_data(&artifact));
    assert_eq!(result.sandbox.pending(), 0);
    assert!(result.sandbox.temp_dir().is_none());
}

#[tokio::test]
async fn pipeline_commits_adapter_files_after_builders() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let writer = Arc::new(FsFileWriter::new(false));
    let mut pipeline = Pipeline::new();
    pipeline.ir().use_helper(filler("fill", &log)).unwrap();
    pipeline.extensions().use_extension(
        AdapterExtensions::new(writer.clone()).factory(
            |_: &IrArtifact,
             _: &GenpipeConfig|
             -> anyhow::Result<Vec<Box<dyn AdapterExtension>>> {
                Ok(vec![
                    Box::new(Scripted {
                        name: "extras",
                        act: write_a,
                    }) as Box<dyn AdapterExtension>,
                    Box::new(Scripted {
                        name: "tagger",
                        act: mutate_and_update,
                    }),
                ])
            },
        ),
    );

    let result = pipeline
        .run(run_options(dir.path(), sample_config()))
        .await
        .unwrap();

    let target = dir.path().join("generated/a.txt");
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "alpha");
    assert!(result.artifact.data().extras.contains_key("visible"));
    assert_eq!(
        result.steps.last().map(|step| step.phase),
        Some(StepPhase::ExtensionCommit)
    );
    let record = writer
        .summary()
        .records
        .into_iter()
        .find(|r| r.path.ends_with(Path::new("generated/a.txt")))
        .unwrap();
    assert_eq!(record.status, WriteStatus::Written);
}

#[tokio::test]
async fn pipeline_adapter_failure_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let writer = Arc::new(FsFileWriter::new(false));
    let mut pipeline = Pipeline::new();
    pipeline.ir().use_helper(filler("fill", &log)).unwrap();
    pipeline.extensions().use_extension(
        AdapterExtensions::new(writer.clone()).factory(
            |_: &IrArtifact,
             _: &GenpipeConfig|
             -> anyhow::Result<Vec<Box<dyn AdapterExtension>>> {
                Ok(vec![
                    Box::new(Scripted {
                        name: "e1",
                        act: write_a,
                    }) as Box<dyn AdapterExtension>,
                    Box::new(Scripted {
                        name: "e2",
                        act: write_b_then_fail,
                    }),
                ])
            },
        ),
    );

    let err = pipeline
        .run(run_options(dir.path(), sample_config()))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("adapter exploded"));
    assert!(!dir.path().join("generated").join("a.txt").exists());
    assert!(writer.summary().is_empty());
}
