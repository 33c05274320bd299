//! Intermediate representation
//!
//! Fragments populate an [`IrDraft`]; finalization moves it into an immutable [`IrArtifact`].
//! Extensions only ever see owned [`IrSnapshot`] copies of the artifact data.

pub mod artifact;
pub mod draft;
pub mod model;
pub mod snapshot;

pub use artifact::{Attachments, IrArtifact};
pub use draft::{DraftWriter, IrDraft};
pub use model::{
    ArtifactKind, ArtifactPlan, CapabilityEntry, CapabilityMap, CapabilitySource, IrData, IrMeta,
    IrResource, PlannedArtifact, ProjectLayout,
};
pub use snapshot::{IrSnapshot, SNAPSHOT_VERSION};
