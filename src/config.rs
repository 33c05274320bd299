//! Configuration System
//!
//! Declarative project configuration consumed by the pipeline, loaded hierarchically through the
//! `config` crate: built-in defaults, the global user file, the workspace file, an
//! environment-specific workspace file, then `GENPIPE__*` environment variables.

use crate::logging::LoggingConfig;
use crate::pipeline::DEFAULT_REQUIRED_FAMILIES;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::workspace_file::{workspace_config_path, WORKSPACE_CONFIG_FILE};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenpipeConfig {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What is being generated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub namespace: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,

    /// Capability key -> WordPress capability
    #[serde(default)]
    pub capabilities: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub route: String,
    #[serde(default)]
    pub capability: Option<String>,
}

/// Where generated files go, relative to the workspace root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,

    #[serde(default = "default_php_dir")]
    pub php_dir: String,

    #[serde(default = "default_ts_dir")]
    pub ts_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Report what would change without touching the filesystem
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_required_families")]
    pub required_families: Vec<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_output_dir() -> String {
    "generated".to_string()
}

fn default_php_dir() -> String {
    "php".to_string()
}

fn default_ts_dir() -> String {
    "ts".to_string()
}

fn default_required_families() -> Vec<String> {
    DEFAULT_REQUIRED_FAMILIES
        .iter()
        .map(|family| family.to_string())
        .collect()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            version: default_version(),
            resources: Vec::new(),
            capabilities: BTreeMap::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            php_dir: default_php_dir(),
            ts_dir: default_ts_dir(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            required_families: default_required_families(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Project(String),
    Resource(String, String),
    Output(String),
    Generation(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Project(msg) => write!(f, "Project: {}", msg),
            ValidationError::Resource(name, msg) => write!(f, "Resource '{}': {}", name, msg),
            ValidationError::Output(msg) => write!(f, "Output: {}", msg),
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (label, value) in [
            ("dir", &self.dir),
            ("php_dir", &self.php_dir),
            ("ts_dir", &self.ts_dir),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} cannot be empty", label));
            }
            let path = Path::new(value);
            if path.is_absolute() {
                return Err(format!("{} must be relative to the workspace: {}", label, value));
            }
            if path.components().any(|c| matches!(c, Component::ParentDir)) {
                return Err(format!("{} cannot contain '..': {}", label, value));
            }
        }
        Ok(())
    }
}

impl GenpipeConfig {
    /// Validate the entire configuration, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.project.namespace.trim().is_empty() {
            errors.push(ValidationError::Project(
                "namespace cannot be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for resource in &self.project.resources {
            if resource.name.trim().is_empty() {
                errors.push(ValidationError::Resource(
                    resource.name.clone(),
                    "name cannot be empty".to_string(),
                ));
            }
            if !names.insert(resource.name.as_str()) {
                errors.push(ValidationError::Resource(
                    resource.name.clone(),
                    "duplicate resource name".to_string(),
                ));
            }
            if !resource.route.starts_with('/') {
                errors.push(ValidationError::Resource(
                    resource.name.clone(),
                    format!("route must start with '/': {}", resource.route),
                ));
            }
        }

        if let Err(e) = self.output.validate() {
            errors.push(ValidationError::Output(e));
        }

        if self
            .generation
            .required_families
            .iter()
            .any(|family| family.trim().is_empty())
        {
            errors.push(ValidationError::Generation(
                "required families cannot contain empty entries".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
