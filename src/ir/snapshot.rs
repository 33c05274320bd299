//! Owned IR snapshots handed to extensions

use crate::ir::artifact::IrArtifact;
use crate::ir::model::IrData;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Current snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Deep, data-only copy of an artifact
///
/// Runtime attachments are not copied. Their names are kept in `stripped` so an extension
/// can tell that something was withheld rather than silently missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrSnapshot {
    pub version: u32,
    pub data: IrData,
    #[serde(default)]
    pub stripped: Vec<String>,
}

impl IrSnapshot {
    pub fn capture(artifact: &IrArtifact) -> Self {
        let stripped = artifact.attachments().names();
        if !stripped.is_empty() {
            warn!(
                attachments = ?stripped,
                "Runtime attachments withheld from IR snapshot"
            );
        }
        Self {
            version: SNAPSHOT_VERSION,
            data: artifact.data().clone(),
            stripped,
        }
    }
}
