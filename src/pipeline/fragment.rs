//! Fragment phase: run fragments in schedule order, then finalize the draft.

use crate::error::PipelineError;
use crate::helper::{key_in_family, schedule_fragments, HelperMode, HelperRegistry};
use crate::ir::{DraftWriter, IrArtifact, IrDraft};
use crate::pipeline::{RunOptions, Step, StepPhase};
use crate::reporter::Reporter;
use serde_json::json;
use tracing::{debug, info};

/// What a running fragment can see and do
pub struct FragmentContext<'a> {
    pub options: &'a RunOptions,
    pub reporter: Reporter,
    key: &'a str,
    mode: HelperMode,
    draft: &'a mut IrDraft,
    halt: &'a mut Option<String>,
}

impl FragmentContext<'_> {
    pub fn key(&self) -> &str {
        self.key
    }

    pub fn draft(&self) -> &IrDraft {
        self.draft
    }

    /// Merge capability bound to this fragment's identity
    pub fn assign(&mut self) -> DraftWriter<'_> {
        self.draft.writer(self.key, self.mode)
    }

    /// Stop the fragment phase after this fragment returns
    pub fn short_circuit(&mut self, reason: impl Into<String>) {
        *self.halt = Some(reason.into());
    }
}

/// Run every scheduled fragment against one draft and finalize it
pub(crate) async fn run_fragments(
    registry: &HelperRegistry,
    required_families: &[String],
    options: &RunOptions,
    steps: &mut Vec<Step>,
) -> Result<IrArtifact, PipelineError> {
    let fragments = registry.fragments();
    let schedule = schedule_fragments(fragments)?;
    for &index in &schedule.superseded {
        let helper = &fragments[index];
        options.reporter.warn(
            "Fragment registration superseded by override",
            json!({ "key": helper.key, "origin": helper.origin }),
        );
    }

    let mut draft = IrDraft::new();
    let mut executed = Vec::with_capacity(schedule.order.len());
    let mut halt = None;

    for &index in &schedule.order {
        let helper = &fragments[index];
        debug!(key = %helper.key, "Running fragment");
        let mut ctx = FragmentContext {
            options,
            reporter: options.reporter.child(&helper.key),
            key: &helper.key,
            mode: helper.mode,
            draft: &mut draft,
            halt: &mut halt,
        };
        helper.apply.apply(&mut ctx).await?;
        executed.push(index);
        steps.push(Step::new(StepPhase::Fragment, &helper.key));

        if let Some(reason) = halt.take() {
            info!(key = %helper.key, reason = %reason, "Fragment phase short-circuited");
            options.reporter.warn(
                "Fragment phase short-circuited",
                json!({ "key": helper.key, "reason": reason }),
            );
            break;
        }
    }

    let executed_keys: Vec<&str> = executed
        .iter()
        .map(|&index| fragments[index].key.as_str())
        .collect();
    verify_families(
        fragments.iter().map(|f| f.key.as_str()),
        &executed_keys,
        required_families,
    )?;

    let artifact = draft.finalize()?;
    info!(fragments = executed.len(), "Fragment phase complete");
    Ok(artifact)
}

/// A registered family must have at least one executed member
fn verify_families<'a>(
    registered: impl Iterator<Item = &'a str> + Clone,
    executed: &[&str],
    required_families: &[String],
) -> Result<(), PipelineError> {
    for family in required_families {
        let members: Vec<String> = registered
            .clone()
            .filter(|key| key_in_family(key, family))
            .map(str::to_string)
            .collect();
        if members.is_empty() {
            continue;
        }
        if !executed.iter().any(|key| key_in_family(key, family)) {
            return Err(PipelineError::FamilyNotExecuted {
                family: family.clone(),
                registered: members,
            });
        }
    }
    Ok(())
}
