//! Configuration loader: assembles sources in precedence order and deserializes the result.

use config::{Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::merge::builder_with_defaults;
use super::sources::{global_file, workspace_file};
use super::GenpipeConfig;
use crate::error::PipelineError;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `workspace_root`.
    ///
    /// Precedence, lowest first: defaults, global file, `genpipe.toml`, `config/{GENPIPE_ENV}.toml`,
    /// then `GENPIPE__SECTION__KEY` environment variables.
    pub fn load(workspace_root: &Path) -> Result<GenpipeConfig, PipelineError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(env_source());

        let config: GenpipeConfig = builder.build()?.try_deserialize()?;
        debug!(
            workspace = %workspace_root.display(),
            namespace = %config.project.namespace,
            resources = config.project.resources.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration from a single file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<GenpipeConfig, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let config = builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Built-in defaults only
    pub fn default() -> GenpipeConfig {
        GenpipeConfig::default()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("GENPIPE")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
