//! Source formatting offered to adapter extensions

use crate::error::PipelineError;
use std::path::Path;

/// Formats generated source before it is staged
pub trait SourceFormatter: Send + Sync {
    fn format(&self, path: &Path, contents: &str) -> Result<String, PipelineError>;
}

/// Whitespace normalization: `\n` line endings, no trailing blanks, exactly one final newline
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceFormatter {
    /// Opening tag the file must start with, added when missing
    pub prologue: Option<&'static str>,
}

impl WhitespaceFormatter {
    pub fn php() -> Self {
        Self {
            prologue: Some("<?php"),
        }
    }

    pub fn typescript() -> Self {
        Self { prologue: None }
    }
}

impl SourceFormatter for WhitespaceFormatter {
    fn format(&self, path: &Path, contents: &str) -> Result<String, PipelineError> {
        if contents.contains('\0') {
            return Err(PipelineError::HelperRejected {
                key: path.display().to_string(),
                message: "refusing to format binary contents".to_string(),
            });
        }

        let mut lines: Vec<&str> = contents
            .split('\n')
            .map(|line| line.trim_end_matches(['\r', ' ', '\t']))
            .collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        while lines.first().is_some_and(|line| line.is_empty()) {
            lines.remove(0);
        }

        let mut formatted = String::with_capacity(contents.len() + 8);
        if let Some(prologue) = self.prologue {
            if lines.first().map(|l| l.trim_start()) != Some(prologue) {
                formatted.push_str(prologue);
                formatted.push_str("\n\n");
            }
        }
        formatted.push_str(&lines.join("\n"));
        formatted.push('\n');
        Ok(formatted)
    }
}
