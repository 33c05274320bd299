//! CLI commands through RunContext

use super::support::SAMPLE_TOML;
use genpipe::cli::{Commands, PlanFormat, RunContext};
use genpipe::{ErrorKind, PipelineError};
use std::path::PathBuf;
use tempfile::TempDir;

fn workspace(toml: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("genpipe.toml");
    std::fs::write(&config_path, toml).unwrap();
    (dir, config_path)
}

fn context(dir: &TempDir, config_path: &PathBuf) -> RunContext {
    RunContext::new(dir.path().to_path_buf(), Some(config_path.clone())).unwrap()
}

#[test]
fn generate_writes_files_then_reports_unchanged() {
    let (dir, config_path) = workspace(SAMPLE_TOML);
    let ctx = context(&dir, &config_path);

    let first = ctx
        .execute(&Commands::Generate { dry_run: false })
        .unwrap();
    assert!(first.contains("3 written, 0 unchanged, 0 skipped"));
    assert!(dir
        .path()
        .join("generated/php/Rest/BooksController.php")
        .exists());
    assert!(dir.path().join("generated/ts/books.ts").exists());
    assert!(dir.path().join("generated/manifest.json").exists());

    let second = ctx
        .execute(&Commands::Generate { dry_run: false })
        .unwrap();
    assert!(second.contains("0 written, 3 unchanged, 0 skipped"));
}

#[test]
fn dry_run_leaves_workspace_untouched() {
    let (dir, config_path) = workspace(SAMPLE_TOML);
    let ctx = context(&dir, &config_path);

    let output = ctx.execute(&Commands::Generate { dry_run: true }).unwrap();

    assert!(output.contains("dry run"));
    assert!(output.contains("0 written, 0 unchanged, 3 skipped"));
    assert!(!dir.path().join("generated").exists());
}

#[test]
fn plan_json_lists_schedule_without_running() {
    let (dir, config_path) = workspace(SAMPLE_TOML);
    let ctx = context(&dir, &config_path);

    let output = ctx
        .execute(&Commands::Plan {
            format: PlanFormat::Json,
        })
        .unwrap();
    let plan: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(plan["fragments"].as_array().unwrap().len(), 5);
    assert_eq!(plan["fragments"][0]["key"], "ir.meta.core");
    assert_eq!(plan["builders"][0]["key"], "builder.php.controllers");
    assert_eq!(
        plan["extensions"],
        serde_json::json!(["genpipe.adapter-extensions"])
    );
    assert!(!dir.path().join("generated").exists());
}

#[test]
fn plan_text_renders_tables() {
    let (dir, config_path) = workspace(SAMPLE_TOML);
    let output = context(&dir, &config_path)
        .execute(&Commands::Plan {
            format: PlanFormat::Text,
        })
        .unwrap();

    assert!(output.contains("ir.artifacts.plan"));
    assert!(output.contains("builder.manifest"));
    assert!(output.contains("genpipe.adapter-extensions"));
}

#[test]
fn validate_accepts_sample_config() {
    let (dir, config_path) = workspace(SAMPLE_TOML);
    let output = context(&dir, &config_path)
        .execute(&Commands::Validate)
        .unwrap();
    assert!(output.contains("Configuration is valid"));
}

const INVALID_TOML: &str = r#"
[project]
namespace = ""

[[project.resources]]
name = "books"
route = "books"

[logging]
enabled = false
"#;

#[test]
fn validate_lists_every_problem() {
    let (dir, config_path) = workspace(INVALID_TOML);
    let err = context(&dir, &config_path)
        .execute(&Commands::Validate)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    let message = err.to_string();
    assert!(message.contains("2 problem(s)"));
    assert!(message.contains("books"));
}

#[test]
fn generate_refuses_invalid_config() {
    let (dir, config_path) = workspace(INVALID_TOML);
    let err = context(&dir, &config_path)
        .execute(&Commands::Generate { dry_run: false })
        .unwrap_err();

    assert!(matches!(err, PipelineError::ConfigError(_)));
    assert!(!dir.path().join("generated").exists());
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = RunContext::new(dir.path().to_path_buf(), Some(dir.path().join("absent.toml")));
    assert!(matches!(result, Err(PipelineError::ConfigError(_))));
}
