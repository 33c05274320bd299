//! Extension hook saga
//!
//! Hooks run one at a time in registration order. Each transaction a hook returns goes into a
//! ledger; on failure the ledger is rolled back in reverse, on success it is committed forwards.

use crate::error::PipelineError;
use crate::ir::IrArtifact;
use crate::pipeline::extension::{ExecutionContext, ExtensionHook, Transaction};
use crate::pipeline::{RunOptions, Step, StepPhase};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct LedgerEntry {
    key: String,
    transaction: Box<dyn Transaction>,
}

/// Pending transactions in the order their hooks succeeded
#[derive(Default)]
pub struct TransactionLedger {
    entries: Vec<LedgerEntry>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: impl Into<String>, transaction: Box<dyn Transaction>) {
        self.entries.push(LedgerEntry {
            key: key.into(),
            transaction,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key.clone()).collect()
    }

    /// Roll back every transaction, newest first.
    ///
    /// A failing rollback is logged and skipped; the rest still run. Returns the number of
    /// rollbacks that failed.
    pub async fn rollback_all(self) -> usize {
        let keys = self.keys();
        let mut failures = 0;
        for entry in self.entries.into_iter().rev() {
            debug!(extension = %entry.key, "Rolling back extension transaction");
            if let Err(err) = entry.transaction.rollback().await {
                failures += 1;
                warn!(
                    extension = %entry.key,
                    extension_keys = ?keys,
                    error = %err,
                    "Extension rollback failed"
                );
            }
        }
        failures
    }

    /// Commit every transaction in recorded order.
    ///
    /// Commit is the point of no return: a failure is returned as-is and nothing is rolled back.
    pub async fn commit_all(self, steps: &mut Vec<Step>) -> Result<(), PipelineError> {
        for entry in self.entries {
            debug!(extension = %entry.key, "Committing extension transaction");
            entry.transaction.commit().await?;
            steps.push(Step::new(StepPhase::ExtensionCommit, &entry.key));
        }
        Ok(())
    }
}

/// Run hooks sequentially, threading the artifact through them.
///
/// If a hook fails, transactions recorded so far are rolled back before the original error is
/// returned.
pub(crate) async fn run_hooks(
    hooks: &[(String, Arc<dyn ExtensionHook>)],
    artifact: IrArtifact,
    options: &RunOptions,
    steps: &mut Vec<Step>,
) -> Result<(IrArtifact, TransactionLedger), PipelineError> {
    let mut current = artifact;
    let mut ledger = TransactionLedger::new();

    for (key, hook) in hooks {
        let ctx = ExecutionContext {
            extension_key: key,
            reporter: options.reporter.child(key),
        };
        match hook.apply(&current, options, &ctx).await {
            Ok(outcome) => {
                if let Some(next) = outcome.artifact {
                    debug!(extension = %key, "Extension replaced the artifact");
                    current = next;
                }
                if let Some(transaction) = outcome.transaction {
                    ledger.record(key.clone(), transaction);
                }
                steps.push(Step::new(StepPhase::Extension, key));
            }
            Err(err) => {
                warn!(
                    extension = %key,
                    pending = ledger.len(),
                    error = %err,
                    "Extension hook failed, rolling back"
                );
                ledger.rollback_all().await;
                return Err(err);
            }
        }
    }

    info!(hooks = hooks.len(), transactions = ledger.len(), "Extension hooks complete");
    Ok((current, ledger))
}
