//! CLI output: error mapping from pipeline errors to the stable CLI surface.

use crate::error::PipelineError;
use owo_colors::OwoColorize;

/// Map a pipeline error to one line of CLI output, prefixed by its taxonomy kind.
pub fn map_error(e: &PipelineError) -> String {
    format!("{} {}", format!("[{}]", e.kind()).red().bold(), e)
}
