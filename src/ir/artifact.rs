//! Finalized, immutable IR artifact

use crate::error::PipelineError;
use crate::ir::model::IrData;
use crate::ir::snapshot::{IrSnapshot, SNAPSHOT_VERSION};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Runtime-only members of the IR (callables, handles)
///
/// Attachments travel with the artifact but are never copied into snapshots.
#[derive(Clone, Default)]
pub struct Attachments {
    entries: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Attachments {
    pub fn insert(&mut self, name: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        self.entries.insert(name.into(), value);
    }

    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .get(name)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Attachments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Immutable IR consumed by extensions and builders
///
/// Cloning shares the underlying data. Changes happen only by building a replacement
/// artifact with [`IrArtifact::with_data`] or [`IrArtifact::apply_snapshot`].
#[derive(Debug, Clone)]
pub struct IrArtifact {
    data: Arc<IrData>,
    attachments: Attachments,
}

impl IrArtifact {
    pub fn new(data: IrData) -> Self {
        Self {
            data: Arc::new(data),
            attachments: Attachments::default(),
        }
    }

    pub(crate) fn with_attachments(data: IrData, attachments: Attachments) -> Self {
        Self {
            data: Arc::new(data),
            attachments,
        }
    }

    pub fn data(&self) -> &IrData {
        &self.data
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    /// Replacement artifact carrying `data` and this artifact's attachments
    pub fn with_data(&self, data: IrData) -> Self {
        Self {
            data: Arc::new(data),
            attachments: self.attachments.clone(),
        }
    }

    /// Owned copy of the data for an extension
    pub fn snapshot(&self) -> IrSnapshot {
        IrSnapshot::capture(self)
    }

    /// Replacement artifact built from an extension-submitted snapshot
    pub fn apply_snapshot(&self, snapshot: IrSnapshot) -> Result<Self, PipelineError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PipelineError::SnapshotVersion {
                expected: SNAPSHOT_VERSION,
                actual: snapshot.version,
            });
        }
        Ok(self.with_data(snapshot.data))
    }

    /// BLAKE3 hex digest of the serialized data
    pub fn fingerprint(&self) -> Result<String, PipelineError> {
        let bytes = serde_json::to_vec(self.data.as_ref())?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }

    /// True when both artifacts share the same data allocation
    pub fn same_data(&self, other: &IrArtifact) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}
