//! Extension hooks as a saga: commit forwards, roll back in reverse, exactly once

use super::support::{entries, filler, new_log, run_options, sample_config, Log};
use async_trait::async_trait;
use genpipe::helper::{BuilderApply, BuilderHelper};
use genpipe::ir::IrArtifact;
use genpipe::pipeline::{
    BuilderContext, ExecutionContext, ExtensionHook, HookOutcome, Pipeline, PipelineExtension,
    RegistrationContext, RunOptions, StepPhase, Transaction,
};
use genpipe::PipelineError;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

struct Recorded {
    name: &'static str,
    log: Log,
    fail_commit: bool,
    fail_rollback: bool,
}

impl Recorded {
    fn outcome(&self, failed: bool, message: &str) -> Result<(), PipelineError> {
        if failed {
            return Err(PipelineError::HelperRejected {
                key: self.name.to_string(),
                message: message.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for Recorded {
    async fn commit(&self) -> Result<(), PipelineError> {
        self.log.lock().push(format!("commit:{}", self.name));
        self.outcome(self.fail_commit, "commit failed")
    }

    async fn rollback(&self) -> Result<(), PipelineError> {
        self.log.lock().push(format!("rollback:{}", self.name));
        self.outcome(self.fail_rollback, "rollback failed")
    }
}

#[derive(Clone, Copy)]
enum Behaviour {
    Transaction,
    Plain,
    Fail,
    /// Tag the artifact with an extra field and open a transaction
    Tag,
    FailingCommit,
    FailingRollback,
}

struct Hook {
    name: &'static str,
    behaviour: Behaviour,
    log: Log,
}

#[async_trait]
impl ExtensionHook for Hook {
    async fn apply(
        &self,
        artifact: &IrArtifact,
        _options: &RunOptions,
        _ctx: &ExecutionContext<'_>,
    ) -> Result<HookOutcome, PipelineError> {
        self.log.lock().push(format!("apply:{}", self.name));
        let transaction = Recorded {
            name: self.name,
            log: Arc::clone(&self.log),
            fail_commit: matches!(self.behaviour, Behaviour::FailingCommit),
            fail_rollback: matches!(self.behaviour, Behaviour::FailingRollback),
        };
        match self.behaviour {
            Behaviour::Transaction | Behaviour::FailingCommit | Behaviour::FailingRollback => {
                Ok(HookOutcome::unchanged().with_transaction(transaction))
            }
            Behaviour::Plain => Ok(HookOutcome::unchanged()),
            Behaviour::Fail => Err(PipelineError::HelperRejected {
                key: self.name.to_string(),
                message: "hook failed".to_string(),
            }),
            Behaviour::Tag => {
                let mut data = artifact.data().clone();
                let seen = data.extras.len();
                data.extras
                    .insert(self.name.to_string(), json!({ "seen_extras": seen }));
                Ok(HookOutcome::unchanged()
                    .with_artifact(artifact.with_data(data))
                    .with_transaction(transaction))
            }
        }
    }
}

struct HookExtension(Arc<Hook>);

#[async_trait]
impl PipelineExtension for HookExtension {
    fn key(&self) -> &str {
        self.0.name
    }

    async fn register(
        &self,
        _ctx: &RegistrationContext<'_>,
    ) -> Result<Option<Arc<dyn ExtensionHook>>, PipelineError> {
        Ok(Some(self.0.clone() as Arc<dyn ExtensionHook>))
    }
}

struct OptOut;

#[async_trait]
impl PipelineExtension for OptOut {
    fn key(&self) -> &str {
        "opt-out"
    }

    async fn register(
        &self,
        _ctx: &RegistrationContext<'_>,
    ) -> Result<Option<Arc<dyn ExtensionHook>>, PipelineError> {
        Ok(None)
    }
}

struct FailingBuilder;

#[async_trait]
impl BuilderApply for FailingBuilder {
    async fn apply(&self, _ctx: &mut BuilderContext<'_>) -> Result<(), PipelineError> {
        Err(PipelineError::HelperRejected {
            key: "builder.fail".to_string(),
            message: "cannot render".to_string(),
        })
    }
}

fn pipeline_with(hooks: &[(&'static str, Behaviour)], log: &Log) -> Pipeline {
    let mut pipeline = Pipeline::new();
    pipeline.ir().use_helper(filler("fill", log)).unwrap();
    for &(name, behaviour) in hooks {
        pipeline.extensions().use_extension(HookExtension(Arc::new(Hook {
            name,
            behaviour,
            log: Arc::clone(log),
        })));
    }
    pipeline
}

fn saga_entries(log: &Log) -> Vec<String> {
    entries(log).into_iter().filter(|e| e != "fill").collect()
}

#[tokio::test]
async fn failing_hook_rolls_back_earlier_transactions_once() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let pipeline = pipeline_with(
        &[
            ("one", Behaviour::Plain),
            ("two", Behaviour::Transaction),
            ("three", Behaviour::Fail),
        ],
        &log,
    );

    let err = pipeline
        .run(run_options(dir.path(), sample_config()))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::HelperRejected { ref key, .. } if key == "three"));
    assert_eq!(
        saga_entries(&log),
        vec!["apply:one", "apply:two", "apply:three", "rollback:two"]
    );
}

#[tokio::test]
async fn failed_rollback_keeps_unwinding_and_returns_hook_error() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let pipeline = pipeline_with(
        &[
            ("one", Behaviour::FailingRollback),
            ("two", Behaviour::Transaction),
            ("three", Behaviour::Fail),
        ],
        &log,
    );

    let err = pipeline
        .run(run_options(dir.path(), sample_config()))
        .await
        .unwrap_err();

    match err {
        PipelineError::HelperRejected { key, message } => {
            assert_eq!(key, "three");
            assert_eq!(message, "hook failed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        saga_entries(&log),
        vec!["apply:one", "apply:two", "apply:three", "rollback:two", "rollback:one"]
    );
}

#[tokio::test]
async fn commit_failure_stops_later_commits_without_rollback() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let pipeline = pipeline_with(
        &[
            ("first", Behaviour::Transaction),
            ("second", Behaviour::FailingCommit),
            ("third", Behaviour::Transaction),
        ],
        &log,
    );

    let err = pipeline
        .run(run_options(dir.path(), sample_config()))
        .await
        .unwrap_err();

    match err {
        PipelineError::HelperRejected { key, message } => {
            assert_eq!(key, "second");
            assert_eq!(message, "commit failed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        saga_entries(&log),
        vec![
            "apply:first",
            "apply:second",
            "apply:third",
            "commit:first",
            "commit:second"
        ]
    );
    assert!(!saga_entries(&log).iter().any(|e| e.starts_with("rollback:")));
}

#[tokio::test]
async fn successful_run_commits_in_registration_order() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let mut pipeline = pipeline_with(
        &[("first", Behaviour::Transaction), ("second", Behaviour::Transaction)],
        &log,
    );
    pipeline.extensions().use_extension(OptOut);

    let result = pipeline
        .run(run_options(dir.path(), sample_config()))
        .await
        .unwrap();

    assert_eq!(
        saga_entries(&log),
        vec!["apply:first", "apply:second", "commit:first", "commit:second"]
    );
    let commits: Vec<_> = result
        .steps
        .iter()
        .filter(|step| step.phase == StepPhase::ExtensionCommit)
        .map(|step| step.key.as_str())
        .collect();
    assert_eq!(commits, vec!["first", "second"]);
    assert!(!result.steps.iter().any(|step| step.key == "opt-out"));
}

#[tokio::test]
async fn builder_failure_rolls_back_every_transaction() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let mut pipeline = pipeline_with(
        &[("first", Behaviour::Transaction), ("second", Behaviour::Transaction)],
        &log,
    );
    pipeline
        .builders()
        .use_helper(BuilderHelper::new("builder.fail", FailingBuilder))
        .unwrap();

    let options = run_options(dir.path(), sample_config());
    let err = pipeline.run(options.clone()).await.unwrap_err();

    assert!(matches!(err, PipelineError::HelperRejected { .. }));
    assert_eq!(
        saga_entries(&log),
        vec!["apply:first", "apply:second", "rollback:second", "rollback:first"]
    );
    assert!(!saga_entries(&log).iter().any(|e| e.starts_with("commit:")));
    assert!(options
        .reporter
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("cannot render")));
}

#[tokio::test]
async fn replacement_artifacts_thread_through_later_hooks() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let pipeline = pipeline_with(&[("a", Behaviour::Tag), ("b", Behaviour::Tag)], &log);

    let result = pipeline
        .run(run_options(dir.path(), sample_config()))
        .await
        .unwrap();

    let extras = &result.artifact.data().extras;
    assert_eq!(extras["a"], json!({ "seen_extras": 0 }));
    assert_eq!(extras["b"], json!({ "seen_extras": 1 }));
}
