//! Core helpers
//!
//! The fragments and builders that make a bare pipeline produce something: project metadata,
//! layout, resources, capabilities and an artifact plan on the IR side; PHP controllers,
//! TypeScript clients and a manifest on the output side. They use the same public helper
//! contract as any third-party helper and can be overridden key by key.

use crate::error::PipelineError;
use crate::helper::{BuilderHelper, FragmentHelper};
use crate::pipeline::Pipeline;

pub mod builders;
pub mod fragments;
pub mod render;

pub const META_KEY: &str = "ir.meta.core";
pub const LAYOUT_KEY: &str = "ir.layout.core";
pub const RESOURCES_KEY: &str = "ir.resources.core";
pub const CAPABILITY_MAP_KEY: &str = "ir.capability-map.core";
pub const ARTIFACT_PLAN_KEY: &str = "ir.artifacts.plan";

pub const PHP_CONTROLLERS_KEY: &str = "builder.php.controllers";
pub const TS_CLIENTS_KEY: &str = "builder.ts.clients";
pub const MANIFEST_KEY: &str = "builder.manifest";

/// Capability used when a resource names a key the project does not map
pub const DEFAULT_CAPABILITY: &str = "manage_options";

pub const MANIFEST_FILE: &str = "manifest.json";

const ORIGIN: &str = "genpipe:core";

/// Register every core fragment and builder on `pipeline`
pub fn register_core_helpers(pipeline: &mut Pipeline) -> Result<(), PipelineError> {
    let mut ir = pipeline.ir();
    ir.use_helper(FragmentHelper::new(META_KEY, fragments::MetaFragment).origin(ORIGIN))?;
    ir.use_helper(FragmentHelper::new(LAYOUT_KEY, fragments::LayoutFragment).origin(ORIGIN))?;
    ir.use_helper(
        FragmentHelper::new(RESOURCES_KEY, fragments::ResourcesFragment).origin(ORIGIN),
    )?;
    ir.use_helper(
        FragmentHelper::new(CAPABILITY_MAP_KEY, fragments::CapabilityMapFragment)
            .depends_on([RESOURCES_KEY])
            .origin(ORIGIN),
    )?;
    ir.use_helper(
        FragmentHelper::new(ARTIFACT_PLAN_KEY, fragments::ArtifactPlanFragment)
            .depends_on([LAYOUT_KEY, RESOURCES_KEY])
            .origin(ORIGIN),
    )?;

    let mut surface = pipeline.builders();
    surface.use_helper(
        BuilderHelper::new(PHP_CONTROLLERS_KEY, builders::PhpControllersBuilder)
            .priority(20)
            .origin(ORIGIN),
    )?;
    surface.use_helper(
        BuilderHelper::new(TS_CLIENTS_KEY, builders::TsClientsBuilder)
            .priority(10)
            .origin(ORIGIN),
    )?;
    surface.use_helper(
        BuilderHelper::new(MANIFEST_KEY, builders::ManifestBuilder)
            .priority(0)
            .origin(ORIGIN),
    )?;
    Ok(())
}
