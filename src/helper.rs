//! Helper descriptors
//!
//! A helper is either a fragment (contributes to the IR draft) or a builder (consumes the
//! finalized artifact and queues output writes). The kind is a closed tagged union so each
//! registration surface can reject the wrong tag up front.

use crate::error::PipelineError;
use crate::pipeline::builder::BuilderContext;
use crate::pipeline::fragment::FragmentContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod registry;
pub mod schedule;

pub use registry::HelperRegistry;
pub use schedule::{schedule_builders, schedule_fragments, FragmentSchedule};

/// Which phase a helper participates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelperKind {
    Fragment,
    Builder,
}

impl fmt::Display for HelperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelperKind::Fragment => f.write_str("fragment"),
            HelperKind::Builder => f.write_str("builder"),
        }
    }
}

/// Registration mode for fragments
///
/// `Extend` registrations for a key accumulate; a single `Override` replaces them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelperMode {
    #[default]
    Extend,
    Override,
}

/// Fragment behaviour: merge owned fields into the draft
#[async_trait]
pub trait FragmentApply: Send + Sync {
    async fn apply(&self, ctx: &mut FragmentContext<'_>) -> Result<(), PipelineError>;
}

/// Builder behaviour: read the artifact, queue write actions
#[async_trait]
pub trait BuilderApply: Send + Sync {
    async fn apply(&self, ctx: &mut BuilderContext<'_>) -> Result<(), PipelineError>;
}

/// A fragment helper descriptor
#[derive(Clone)]
pub struct FragmentHelper {
    pub key: String,
    pub depends_on: Vec<String>,
    pub mode: HelperMode,
    pub origin: Option<String>,
    pub apply: Arc<dyn FragmentApply>,
}

impl FragmentHelper {
    pub fn new(key: impl Into<String>, apply: impl FragmentApply + 'static) -> Self {
        Self {
            key: key.into(),
            depends_on: Vec::new(),
            mode: HelperMode::Extend,
            origin: None,
            apply: Arc::new(apply),
        }
    }

    pub fn depends_on<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn mode(mut self, mode: HelperMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl fmt::Debug for FragmentHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentHelper")
            .field("key", &self.key)
            .field("depends_on", &self.depends_on)
            .field("mode", &self.mode)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// A builder helper descriptor
#[derive(Clone)]
pub struct BuilderHelper {
    pub key: String,
    pub priority: i32,
    pub origin: Option<String>,
    pub apply: Arc<dyn BuilderApply>,
}

impl BuilderHelper {
    pub fn new(key: impl Into<String>, apply: impl BuilderApply + 'static) -> Self {
        Self {
            key: key.into(),
            priority: 0,
            origin: None,
            apply: Arc::new(apply),
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl fmt::Debug for BuilderHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderHelper")
            .field("key", &self.key)
            .field("priority", &self.priority)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Any helper, tagged by kind
#[derive(Debug, Clone)]
pub enum Helper {
    Fragment(FragmentHelper),
    Builder(BuilderHelper),
}

impl Helper {
    pub fn kind(&self) -> HelperKind {
        match self {
            Helper::Fragment(_) => HelperKind::Fragment,
            Helper::Builder(_) => HelperKind::Builder,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Helper::Fragment(helper) => &helper.key,
            Helper::Builder(helper) => &helper.key,
        }
    }

    pub fn origin(&self) -> Option<&str> {
        match self {
            Helper::Fragment(helper) => helper.origin.as_deref(),
            Helper::Builder(helper) => helper.origin.as_deref(),
        }
    }
}

impl From<FragmentHelper> for Helper {
    fn from(helper: FragmentHelper) -> Self {
        Helper::Fragment(helper)
    }
}

impl From<BuilderHelper> for Helper {
    fn from(helper: BuilderHelper) -> Self {
        Helper::Builder(helper)
    }
}

/// Key families: `family` contains `key` when they are equal or `key` continues with a dot
pub fn key_in_family(key: &str, family: &str) -> bool {
    key == family
        || (key.len() > family.len()
            && key.starts_with(family)
            && key.as_bytes()[family.len()] == b'.')
}
