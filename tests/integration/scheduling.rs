//! Registration and scheduling through the public pipeline surfaces

use super::support::{entries, filler, new_log, recorder, run_options, sample_config};
use async_trait::async_trait;
use genpipe::helper::{BuilderApply, BuilderHelper, HelperKind, HelperMode};
use genpipe::pipeline::{BuilderContext, Pipeline, StepPhase};
use genpipe::{ErrorKind, PipelineError};
use tempfile::TempDir;

struct NoopBuilder;

#[async_trait]
impl BuilderApply for NoopBuilder {
    async fn apply(&self, _ctx: &mut BuilderContext<'_>) -> Result<(), PipelineError> {
        Ok(())
    }
}

#[tokio::test]
async fn cycle_is_rejected_before_any_fragment_runs() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let mut pipeline = Pipeline::new();
    pipeline.ir().use_helper(filler("fill", &log)).unwrap();
    pipeline
        .ir()
        .use_helper(recorder("a", &log).depends_on(["c"]))
        .unwrap();
    pipeline
        .ir()
        .use_helper(recorder("b", &log).depends_on(["a"]))
        .unwrap();
    pipeline
        .ir()
        .use_helper(recorder("c", &log).depends_on(["b"]))
        .unwrap();

    let options = run_options(dir.path(), sample_config());
    let err = pipeline.run(options.clone()).await.unwrap_err();

    match &err {
        PipelineError::DependencyCycle { keys } => {
            assert_eq!(keys.first(), keys.last());
            assert_eq!(keys.len(), 4);
        }
        other => panic!("expected cycle, got {other}"),
    }
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(entries(&log).is_empty());
    assert_eq!(options.reporter.diagnostics().len(), 1);
}

#[tokio::test]
async fn fragments_run_in_dependency_then_registration_order() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let mut pipeline = Pipeline::new();
    pipeline
        .ir()
        .use_helper(recorder("late", &log).depends_on(["fill"]))
        .unwrap();
    pipeline.ir().use_helper(recorder("free", &log)).unwrap();
    pipeline.ir().use_helper(filler("fill", &log)).unwrap();

    let result = pipeline
        .run(run_options(dir.path(), sample_config()))
        .await
        .unwrap();

    assert_eq!(entries(&log), vec!["free", "fill", "late"]);
    let fragment_steps: Vec<_> = result
        .steps
        .iter()
        .filter(|step| step.phase == StepPhase::Fragment)
        .map(|step| step.key.as_str())
        .collect();
    assert_eq!(fragment_steps, vec!["free", "fill", "late"]);
}

#[tokio::test]
async fn override_supersedes_extend_registrations() {
    let dir = TempDir::new().unwrap();
    let log = new_log();
    let mut pipeline = Pipeline::new();
    pipeline.ir().use_helper(filler("fill", &log)).unwrap();
    pipeline.ir().use_helper(recorder("shared", &log)).unwrap();
    pipeline.ir().use_helper(recorder("shared", &log)).unwrap();
    pipeline
        .ir()
        .use_helper(
            recorder("shared", &log)
                .mode(HelperMode::Override)
                .origin("plugin-a"),
        )
        .unwrap();

    let err = pipeline
        .ir()
        .use_helper(
            recorder("shared", &log)
                .mode(HelperMode::Override)
                .origin("plugin-b"),
        )
        .unwrap_err();
    match err {
        PipelineError::OverrideConflict {
            key,
            existing_origin,
            attempted_origin,
        } => {
            assert_eq!(key, "shared");
            assert_eq!(existing_origin, "plugin-a");
            assert_eq!(attempted_origin, "plugin-b");
        }
        other => panic!("expected override conflict, got {other}"),
    }

    let schedule = pipeline.schedule().unwrap();
    assert_eq!(schedule.superseded, vec!["shared", "shared"]);

    let options = run_options(dir.path(), sample_config());
    pipeline.run(options.clone()).await.unwrap();
    assert_eq!(entries(&log), vec!["fill", "shared"]);
    assert!(options
        .reporter
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("superseded")));
}

#[test]
fn wrong_surface_is_a_kind_mismatch() {
    let log = new_log();
    let mut pipeline = Pipeline::new();

    let err = pipeline
        .builders()
        .use_helper(recorder("ir.meta.x", &log))
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::KindMismatch {
            expected: HelperKind::Builder,
            actual: HelperKind::Fragment,
            ..
        }
    ));

    let err = pipeline
        .ir()
        .use_helper(BuilderHelper::new("builder.x", NoopBuilder))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(pipeline.registry().fragments().is_empty());
    assert!(pipeline.registry().builders().is_empty());
}

#[test]
fn unknown_dependency_is_reported() {
    let log = new_log();
    let mut pipeline = Pipeline::new();
    pipeline
        .ir()
        .use_helper(recorder("a", &log).depends_on(["missing"]))
        .unwrap();

    match pipeline.schedule().unwrap_err() {
        PipelineError::UnknownDependency { key, dependency } => {
            assert_eq!(key, "a");
            assert_eq!(dependency, "missing");
        }
        other => panic!("expected unknown dependency, got {other}"),
    }
}

#[test]
fn builders_ordered_by_priority_then_key() {
    let mut pipeline = Pipeline::new();
    for (key, priority) in [("b", 0), ("a", 0), ("z", 5), ("m", -1)] {
        pipeline
            .builders()
            .use_helper(BuilderHelper::new(key, NoopBuilder).priority(priority))
            .unwrap();
    }
    let keys: Vec<_> = pipeline
        .schedule()
        .unwrap()
        .builders
        .into_iter()
        .map(|b| b.key)
        .collect();
    assert_eq!(keys, vec!["z", "a", "b", "m"]);
}

#[tokio::test]
async fn registered_family_that_never_ran_fails_finalization() {
    use genpipe::helper::FragmentApply;
    use genpipe::pipeline::FragmentContext;

    struct Stopper;

    #[async_trait]
    impl FragmentApply for Stopper {
        async fn apply(&self, ctx: &mut FragmentContext<'_>) -> Result<(), PipelineError> {
            ctx.short_circuit("enough");
            Ok(())
        }
    }

    let dir = TempDir::new().unwrap();
    let log = new_log();
    let mut pipeline = Pipeline::new();
    pipeline.ir().use_helper(filler("fill", &log)).unwrap();
    pipeline
        .ir()
        .use_helper(genpipe::helper::FragmentHelper::new("stop", Stopper))
        .unwrap();
    pipeline
        .ir()
        .use_helper(recorder("ir.layout.extra", &log))
        .unwrap();

    let err = pipeline
        .run(run_options(dir.path(), sample_config()))
        .await
        .unwrap_err();
    match err {
        PipelineError::FamilyNotExecuted { family, registered } => {
            assert_eq!(family, "ir.layout");
            assert_eq!(registered, vec!["ir.layout.extra"]);
        }
        other => panic!("expected family error, got {other}"),
    }
    assert_eq!(entries(&log), vec!["fill"]);
}
