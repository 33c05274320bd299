//! Helper registry: validated storage for fragment and builder helpers.

use crate::error::PipelineError;
use crate::helper::{BuilderHelper, FragmentHelper, Helper, HelperKind, HelperMode};
use std::collections::HashMap;
use tracing::debug;

const UNSPECIFIED_ORIGIN: &str = "<unspecified>";

/// Registered helpers in registration order
///
/// Storage only: ordering is the scheduler's job.
#[derive(Debug, Default)]
pub struct HelperRegistry {
    fragments: Vec<FragmentHelper>,
    builders: Vec<BuilderHelper>,
    overrides: HashMap<String, String>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a helper on the fragment surface
    pub fn register_fragment(&mut self, helper: Helper) -> Result<(), PipelineError> {
        let helper = match helper {
            Helper::Fragment(helper) => helper,
            Helper::Builder(helper) => {
                return Err(PipelineError::KindMismatch {
                    key: helper.key,
                    expected: HelperKind::Fragment,
                    actual: HelperKind::Builder,
                })
            }
        };
        if helper.key.trim().is_empty() {
            return Err(PipelineError::EmptyHelperKey {
                kind: HelperKind::Fragment,
            });
        }

        if helper.mode == HelperMode::Override {
            let origin = helper
                .origin
                .clone()
                .unwrap_or_else(|| UNSPECIFIED_ORIGIN.to_string());
            if let Some(existing) = self.overrides.get(&helper.key) {
                return Err(PipelineError::OverrideConflict {
                    key: helper.key,
                    existing_origin: existing.clone(),
                    attempted_origin: origin,
                });
            }
            self.overrides.insert(helper.key.clone(), origin);
        }

        debug!(key = %helper.key, mode = ?helper.mode, "Registered fragment helper");
        self.fragments.push(helper);
        Ok(())
    }

    /// Register a helper on the builder surface
    pub fn register_builder(&mut self, helper: Helper) -> Result<(), PipelineError> {
        let helper = match helper {
            Helper::Builder(helper) => helper,
            Helper::Fragment(helper) => {
                return Err(PipelineError::KindMismatch {
                    key: helper.key,
                    expected: HelperKind::Builder,
                    actual: HelperKind::Fragment,
                })
            }
        };
        if helper.key.trim().is_empty() {
            return Err(PipelineError::EmptyHelperKey {
                kind: HelperKind::Builder,
            });
        }

        debug!(key = %helper.key, priority = helper.priority, "Registered builder helper");
        self.builders.push(helper);
        Ok(())
    }

    pub fn fragments(&self) -> &[FragmentHelper] {
        &self.fragments
    }

    pub fn builders(&self) -> &[BuilderHelper] {
        &self.builders
    }

    pub fn has_override(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }
}
