//! Reporter: scoped logging plus collected run diagnostics
//!
//! Every message goes to `tracing`. Warnings and errors are also kept as [`Diagnostic`]s so the
//! run result can hand them back to the caller.

use crate::error::PipelineError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub scope: String,
    pub message: String,
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Clone)]
pub struct Reporter {
    scope: String,
    sink: Arc<Mutex<Vec<Diagnostic>>>,
}

impl Reporter {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            sink: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reporter for a nested scope sharing this reporter's diagnostics
    pub fn child(&self, name: &str) -> Self {
        Self {
            scope: format!("{}.{}", self.scope, name),
            sink: Arc::clone(&self.sink),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn debug(&self, message: &str) {
        debug!(scope = %self.scope, "{}", message);
    }

    pub fn info(&self, message: &str) {
        info!(scope = %self.scope, "{}", message);
    }

    pub fn warn(&self, message: &str, context: Value) {
        warn!(scope = %self.scope, context = %context, "{}", message);
        self.push(DiagnosticLevel::Warning, message.to_string(), context);
    }

    /// Record a pipeline error with its taxonomy kind and structured context
    pub fn error(&self, err: &PipelineError) {
        let kind = err.kind();
        error!(scope = %self.scope, kind = %kind, error = %err, "Pipeline error");
        self.push(
            DiagnosticLevel::Error,
            err.to_string(),
            json!({ "kind": kind, "context": err.context() }),
        );
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.sink.lock().clone()
    }

    fn push(&self, level: DiagnosticLevel, message: String, context: Value) {
        self.sink.lock().push(Diagnostic {
            level,
            scope: self.scope.clone(),
            message,
            context,
        });
    }
}
