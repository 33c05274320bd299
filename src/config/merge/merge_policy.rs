//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources replace earlier values key by key; arrays and tables are replaced whole, never
//! concatenated.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

use crate::pipeline::DEFAULT_REQUIRED_FAMILIES;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let families: Vec<String> = DEFAULT_REQUIRED_FAMILIES
        .iter()
        .map(|family| family.to_string())
        .collect();

    Config::builder()
        .set_default("project.version", "0.1.0")?
        .set_default("output.dir", "generated")?
        .set_default("output.php_dir", "php")?
        .set_default("output.ts_dir", "ts")?
        .set_default("generation.dry_run", false)?
        .set_default("generation.required_families", families)
}
