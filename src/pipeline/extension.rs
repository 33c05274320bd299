//! Extension contracts
//!
//! An extension is registered once and, at the start of each run, produces at most one hook.
//! Hooks run after the fragment phase and may replace the artifact or open a transaction that
//! the saga later commits or rolls back.

use crate::error::PipelineError;
use crate::ir::IrArtifact;
use crate::pipeline::RunOptions;
use crate::reporter::Reporter;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Deferred effects of a hook
///
/// Both methods default to no-ops so a hook can supply only the half it needs.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn commit(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn rollback(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Result of running one hook
#[derive(Default)]
pub struct HookOutcome {
    /// Replacement artifact for later hooks and the builder phase
    pub artifact: Option<IrArtifact>,
    pub transaction: Option<Box<dyn Transaction>>,
}

impl HookOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn with_artifact(mut self, artifact: IrArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_transaction(mut self, transaction: impl Transaction + 'static) -> Self {
        self.transaction = Some(Box::new(transaction));
        self
    }
}

impl fmt::Debug for HookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookOutcome")
            .field("artifact", &self.artifact.is_some())
            .field("transaction", &self.transaction.is_some())
            .finish()
    }
}

pub struct ExecutionContext<'a> {
    pub extension_key: &'a str,
    pub reporter: Reporter,
}

#[async_trait]
pub trait ExtensionHook: Send + Sync {
    async fn apply(
        &self,
        artifact: &IrArtifact,
        options: &RunOptions,
        ctx: &ExecutionContext<'_>,
    ) -> Result<HookOutcome, PipelineError>;
}

pub struct RegistrationContext<'a> {
    pub options: &'a RunOptions,
}

/// Independently registered participant wrapping the run in a transaction
#[async_trait]
pub trait PipelineExtension: Send + Sync {
    fn key(&self) -> &str;

    /// Produce this run's hook; `None` opts out
    async fn register(
        &self,
        ctx: &RegistrationContext<'_>,
    ) -> Result<Option<Arc<dyn ExtensionHook>>, PipelineError>;
}
