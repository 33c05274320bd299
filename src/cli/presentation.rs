//! CLI presentation: text and JSON rendering of command results.

use crate::config::ValidationError;
use crate::error::PipelineError;
use crate::pipeline::PipelineSchedule;
use crate::reporter::{Diagnostic, DiagnosticLevel};
use crate::writer::{WriteStatus, WriteSummary};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::path::Path;

pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn origin_or_dash(origin: &Option<String>) -> String {
    origin.clone().unwrap_or_else(|| "-".to_string())
}

/// Fragment and builder order as tables
pub fn format_plan_text(schedule: &PipelineSchedule) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}\n\n", format_section_heading("Fragments")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Key", "Mode", "Depends on", "Origin"]);
    for (position, fragment) in schedule.fragments.iter().enumerate() {
        table.add_row(vec![
            (position + 1).to_string(),
            fragment.key.clone(),
            format!("{:?}", fragment.mode).to_lowercase(),
            fragment.depends_on.join(", "),
            origin_or_dash(&fragment.origin),
        ]);
    }
    out.push_str(&format!("{}\n\n", table));

    if !schedule.superseded.is_empty() {
        out.push_str(&format!(
            "Superseded by override: {}\n\n",
            schedule.superseded.join(", ")
        ));
    }

    out.push_str(&format!("{}\n\n", format_section_heading("Builders")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Key", "Priority", "Origin"]);
    for (position, builder) in schedule.builders.iter().enumerate() {
        table.add_row(vec![
            (position + 1).to_string(),
            builder.key.clone(),
            builder.priority.to_string(),
            origin_or_dash(&builder.origin),
        ]);
    }
    out.push_str(&format!("{}\n", table));

    if !schedule.extensions.is_empty() {
        out.push_str(&format!(
            "\nExtensions: {}\n",
            schedule.extensions.join(", ")
        ));
    }
    out
}

pub fn format_plan_json(schedule: &PipelineSchedule) -> Result<String, PipelineError> {
    Ok(serde_json::to_string_pretty(schedule)?)
}

fn status_label(status: WriteStatus) -> String {
    match status {
        WriteStatus::Written => "written".green().to_string(),
        WriteStatus::Unchanged => "unchanged".dimmed().to_string(),
        WriteStatus::Skipped => "skipped".yellow().to_string(),
    }
}

/// Per-file outcome, totals, then warnings and errors collected during the run
pub fn format_generate_summary(
    summary: &WriteSummary,
    diagnostics: &[Diagnostic],
    root: &Path,
    dry_run: bool,
) -> String {
    let mut out = String::new();
    let heading = if dry_run {
        "Generation (dry run)"
    } else {
        "Generation"
    };
    out.push_str(&format!("{}\n\n", format_section_heading(heading)));

    if summary.is_empty() {
        out.push_str("No files produced.\n");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["File", "Status", "Hash"]);
        for record in &summary.records {
            let path = record.path.strip_prefix(root).unwrap_or(&record.path);
            let mut status = status_label(record.status);
            if let Some(reason) = &record.reason {
                status.push_str(&format!(" ({})", reason));
            }
            table.add_row(vec![
                path.display().to_string(),
                status,
                record.hash.chars().take(12).collect(),
            ]);
        }
        out.push_str(&format!("{}\n", table));
    }

    out.push_str(&format!(
        "\n{} written, {} unchanged, {} skipped\n",
        summary.written, summary.unchanged, summary.skipped
    ));

    for diagnostic in diagnostics {
        let label = match diagnostic.level {
            DiagnosticLevel::Warning => "warning".yellow().to_string(),
            DiagnosticLevel::Error => "error".red().to_string(),
        };
        out.push_str(&format!(
            "{} [{}] {}\n",
            label, diagnostic.scope, diagnostic.message
        ));
    }
    out
}

pub fn format_validation_result(result: &Result<(), Vec<ValidationError>>) -> String {
    match result {
        Ok(()) => format!("{} Configuration is valid", "✓".green()),
        Err(errors) => {
            let mut out = format!(
                "{} Configuration has {} problem(s):\n",
                "✗".red(),
                errors.len()
            );
            for error in errors {
                out.push_str(&format!("  - {}\n", error));
            }
            out
        }
    }
}
