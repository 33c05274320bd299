//! IR data types
//!
//! Plain data only: everything here is serializable and cloned by value into snapshots.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Project identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrMeta {
    pub namespace: String,
    /// Namespace reduced to `[a-z0-9-]`, used for file and symbol names
    pub sanitized_namespace: String,
    pub version: String,
    pub origin: String,
    pub source_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilitySource {
    Config,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityEntry {
    pub capability: String,
    pub source: CapabilitySource,
}

/// Resolution of capability keys used by resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityMap {
    pub entries: BTreeMap<String, CapabilityEntry>,
    /// Keys referenced by resources but absent from the project configuration
    #[serde(default)]
    pub missing: Vec<String>,
}

/// Output layout, relative to the workspace root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLayout {
    pub output_dir: String,
    pub php_dir: String,
    pub ts_dir: String,
}

impl ProjectLayout {
    pub fn php_path(&self, file: &str) -> String {
        format!("{}/{}/{}", self.output_dir, self.php_dir, file)
    }

    pub fn ts_path(&self, file: &str) -> String {
        format!("{}/{}/{}", self.output_dir, self.ts_dir, file)
    }

    pub fn root_path(&self, file: &str) -> String {
        format!("{}/{}", self.output_dir, file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    PhpController,
    TsClient,
    Manifest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedArtifact {
    pub id: String,
    pub kind: ArtifactKind,
    /// Workspace-relative path
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// Files the builders are expected to produce
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPlan {
    pub entries: Vec<PlannedArtifact>,
}

impl ArtifactPlan {
    pub fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &PlannedArtifact> {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrResource {
    pub name: String,
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
}

/// Finalized IR content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrData {
    pub meta: IrMeta,
    pub capability_map: CapabilityMap,
    pub layout: ProjectLayout,
    pub artifact_plan: ArtifactPlan,
    /// Sorted by name
    pub resources: Vec<IrResource>,
    #[serde(default)]
    pub extras: BTreeMap<String, Value>,
}

impl IrData {
    pub fn resource(&self, name: &str) -> Option<&IrResource> {
        self.resources.iter().find(|resource| resource.name == name)
    }
}

#[cfg(test)]
pub(crate) fn sample_data() -> IrData {
    IrData {
        meta: IrMeta {
            namespace: "Acme Demo".to_string(),
            sanitized_namespace: "acme-demo".to_string(),
            version: "0.1.0".to_string(),
            origin: "genpipe.toml".to_string(),
            source_path: "/workspace/genpipe.toml".to_string(),
        },
        capability_map: CapabilityMap::default(),
        layout: ProjectLayout {
            output_dir: "generated".to_string(),
            php_dir: "php".to_string(),
            ts_dir: "ts".to_string(),
        },
        artifact_plan: ArtifactPlan::default(),
        resources: vec![IrResource {
            name: "books".to_string(),
            route: "/acme/v1/books".to_string(),
            capability: None,
        }],
        extras: BTreeMap::new(),
    }
}
