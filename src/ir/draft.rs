//! Mutable IR draft populated by fragments
//!
//! The draft tracks which fragment owns each field. A fragment with a different key may only
//! overwrite an owned field when it was registered in override mode; extend registrations that
//! share a key cooperate, last write wins.

use crate::error::PipelineError;
use crate::helper::HelperMode;
use crate::ir::artifact::{Attachments, IrArtifact};
use crate::ir::model::{ArtifactPlan, CapabilityMap, IrData, IrMeta, IrResource, ProjectLayout};
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const FIELD_META: &str = "meta";
pub const FIELD_CAPABILITY_MAP: &str = "capability_map";
pub const FIELD_LAYOUT: &str = "layout";
pub const FIELD_ARTIFACT_PLAN: &str = "artifact_plan";

#[derive(Debug, Default)]
pub struct IrDraft {
    meta: Option<IrMeta>,
    capability_map: Option<CapabilityMap>,
    layout: Option<ProjectLayout>,
    artifact_plan: Option<ArtifactPlan>,
    resources: BTreeMap<String, IrResource>,
    extras: BTreeMap<String, Value>,
    attachments: Attachments,
    owners: HashMap<String, String>,
}

impl IrDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta(&self) -> Option<&IrMeta> {
        self.meta.as_ref()
    }

    pub fn capability_map(&self) -> Option<&CapabilityMap> {
        self.capability_map.as_ref()
    }

    pub fn layout(&self) -> Option<&ProjectLayout> {
        self.layout.as_ref()
    }

    pub fn artifact_plan(&self) -> Option<&ArtifactPlan> {
        self.artifact_plan.as_ref()
    }

    pub fn resources(&self) -> impl Iterator<Item = &IrResource> {
        self.resources.values()
    }

    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extras.get(name)
    }

    /// Key of the fragment that last assigned `field`
    pub fn owner(&self, field: &str) -> Option<&str> {
        self.owners.get(field).map(String::as_str)
    }

    /// Writer bound to one fragment's identity
    pub fn writer<'a>(&'a mut self, key: &'a str, mode: HelperMode) -> DraftWriter<'a> {
        DraftWriter {
            draft: self,
            key,
            mode,
        }
    }

    /// Consume the draft into an artifact.
    ///
    /// Fails with the first mandatory field still unset.
    pub fn finalize(self) -> Result<IrArtifact, PipelineError> {
        let meta = self.meta.ok_or_else(|| missing(FIELD_META))?;
        let capability_map = self
            .capability_map
            .ok_or_else(|| missing(FIELD_CAPABILITY_MAP))?;
        let layout = self.layout.ok_or_else(|| missing(FIELD_LAYOUT))?;
        let artifact_plan = self
            .artifact_plan
            .ok_or_else(|| missing(FIELD_ARTIFACT_PLAN))?;

        let data = IrData {
            meta,
            capability_map,
            layout,
            artifact_plan,
            resources: self.resources.into_values().collect(),
            extras: self.extras,
        };
        Ok(IrArtifact::with_attachments(data, self.attachments))
    }
}

fn missing(field: &str) -> PipelineError {
    PipelineError::MissingArtifactField {
        field: field.to_string(),
    }
}

/// The `assign` capability handed to a running fragment
pub struct DraftWriter<'a> {
    draft: &'a mut IrDraft,
    key: &'a str,
    mode: HelperMode,
}

impl DraftWriter<'_> {
    fn claim(&mut self, field: String) -> Result<(), PipelineError> {
        if let Some(owner) = self.draft.owners.get(&field) {
            if owner != self.key && self.mode != HelperMode::Override {
                return Err(PipelineError::FieldConflict {
                    field,
                    owner: owner.clone(),
                    writer: self.key.to_string(),
                });
            }
        }
        self.draft.owners.insert(field, self.key.to_string());
        Ok(())
    }

    pub fn set_meta(&mut self, meta: IrMeta) -> Result<(), PipelineError> {
        self.claim(FIELD_META.to_string())?;
        self.draft.meta = Some(meta);
        Ok(())
    }

    pub fn set_capability_map(&mut self, map: CapabilityMap) -> Result<(), PipelineError> {
        self.claim(FIELD_CAPABILITY_MAP.to_string())?;
        self.draft.capability_map = Some(map);
        Ok(())
    }

    pub fn set_layout(&mut self, layout: ProjectLayout) -> Result<(), PipelineError> {
        self.claim(FIELD_LAYOUT.to_string())?;
        self.draft.layout = Some(layout);
        Ok(())
    }

    pub fn set_artifact_plan(&mut self, plan: ArtifactPlan) -> Result<(), PipelineError> {
        self.claim(FIELD_ARTIFACT_PLAN.to_string())?;
        self.draft.artifact_plan = Some(plan);
        Ok(())
    }

    /// Add or replace a resource; ownership is tracked per resource name
    pub fn put_resource(&mut self, resource: IrResource) -> Result<(), PipelineError> {
        self.claim(format!("resources.{}", resource.name))?;
        self.draft.resources.insert(resource.name.clone(), resource);
        Ok(())
    }

    pub fn set_extra(&mut self, name: &str, value: Value) -> Result<(), PipelineError> {
        self.claim(format!("extras.{name}"))?;
        self.draft.extras.insert(name.to_string(), value);
        Ok(())
    }

    /// Attach a runtime-only value; attachments never reach extension snapshots
    pub fn attach(
        &mut self,
        name: &str,
        value: Arc<dyn Any + Send + Sync>,
    ) -> Result<(), PipelineError> {
        self.claim(format!("attachments.{name}"))?;
        self.draft.attachments.insert(name, value);
        Ok(())
    }
}
