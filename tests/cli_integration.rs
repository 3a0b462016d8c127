use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::tempdir;

fn cli_bin() -> &'static str {
    env!("CARGO_BIN_EXE_label-migrate")
}

fn run_cli<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Output {
    Command::new(cli_bin())
        .current_dir(cwd)
        .env_remove("LABEL_MIGRATE_LOG")
        .args(args)
        .output()
        .expect("failed to run label-migrate")
}

fn write_config(root: &Path, extra: Value) -> PathBuf {
    let mut config = json!({
        "dirs": ["src"],
        "store": "labels/labels.json",
        "reportPath": "report.md"
    });
    if let (Some(base), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    let config_path = root.join("label-migrate.json");
    fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    config_path
}

fn write_source(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

const APP: &str = r#"import React from 'react';

export function App() {
  return (
    <div>
      <h1>欢迎使用</h1>
      <input placeholder="Search files" />
    </div>
  );
}
"#;

#[test]
fn scan_prints_findings_and_writes_table() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_source(project, "src/App.tsx", APP);
    write_config(project, json!({}));

    let output = run_cli(project, &["scan", "--report", "scan.md"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("欢迎使用"));
    assert!(stdout.contains("appView.search_files"));
    assert!(stdout.contains("Found 2 occurrence(s)"));

    let table = fs::read_to_string(project.join("scan.md")).unwrap();
    assert!(table.contains("| 行号 | 列号 | 硬编码文本 | 建议的标签键 | 建议的作用域 |"));
    assert!(table.contains("| 7 | 27 | Search files | search_files | appView |"));

    // Scanning never touches sources
    assert_eq!(fs::read_to_string(project.join("src/App.tsx")).unwrap(), APP);
}

#[test]
fn scan_json_output_is_machine_readable() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_source(project, "src/App.tsx", APP);
    write_config(project, json!({}));

    let output = run_cli(project, &["scan", "--format", "json", "--no-english"]);
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout must be JSON only");
    assert_eq!(report["filesScanned"], 1);
    assert_eq!(report["totalOccurrences"], 1);
    assert_eq!(report["files"][0]["findings"][0]["text"], "欢迎使用");
    assert_eq!(report["files"][0]["findings"][0]["classification"], "cjk");
}

#[test]
fn scan_without_line_numbers() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_source(project, "src/App.tsx", APP);
    write_config(project, json!({}));

    let output = run_cli(project, &["scan", "--no-line-numbers", "--report", "scan.md"]);
    assert!(output.status.success());
    let table = fs::read_to_string(project.join("scan.md")).unwrap();
    assert!(!table.contains("行号"));
    assert!(table.contains("| Search files | search_files | appView |"));
}

#[test]
fn scan_with_nothing_to_report() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_source(project, "src/clean.ts", "export const answer = 42;\n");
    write_config(project, json!({}));

    let output = run_cli(project, &["scan", "--report", "scan.md"]);
    assert!(output.status.success());
    let table = fs::read_to_string(project.join("scan.md")).unwrap();
    assert!(table.contains("no issues found"));
}

#[test]
fn missing_sources_is_fatal() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_config(project, json!({}));

    let output = run_cli(project, &["scan"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No source files"));
}

#[test]
fn invalid_config_is_fatal() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_source(project, "src/App.tsx", APP);
    write_config(project, json!({ "labelObject": "my-labels" }));

    let output = run_cli(project, &["scan"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("labelObject"));
}

#[test]
fn migrate_rewrites_sources_and_stores_labels() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    let app = write_source(project, "src/App.tsx", APP);
    write_config(project, json!({}));

    let output = run_cli(project, &["migrate"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let rewritten = fs::read_to_string(&app).unwrap();
    assert!(rewritten.contains("<h1>{labels.text_"));
    assert!(rewritten.contains("placeholder={labels.search_files}"));

    let labels: Value =
        serde_json::from_str(&fs::read_to_string(project.join("labels/labels.json")).unwrap())
            .unwrap();
    assert_eq!(labels["appView"]["search_files"]["zh"], "Search files");
    assert_eq!(labels["appView"].as_object().unwrap().len(), 2);

    let report = fs::read_to_string(project.join("report.md")).unwrap();
    assert!(report.contains("## 迁移状态"));
    assert!(report.contains("| 迁移标签数 | 2 |"));

    // Second run finds nothing left to migrate
    let again = run_cli(project, &["migrate", "--format", "json"]);
    assert!(again.status.success());
    let result: Value = serde_json::from_slice(&again.stdout).unwrap();
    assert_eq!(result["occurrencesFound"], 0);
    assert_eq!(result["success"], true);
    assert_eq!(fs::read_to_string(&app).unwrap(), rewritten);
}

#[test]
fn migrate_dry_run_writes_only_the_report() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    let app = write_source(project, "src/App.tsx", APP);
    write_config(project, json!({}));

    let output = run_cli(project, &["migrate", "--dry-run", "--report", "dry.md"]);
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(&app).unwrap(), APP);
    assert!(!project.join("labels/labels.json").exists());

    let report = fs::read_to_string(project.join("dry.md")).unwrap();
    assert!(report.contains("dry run"));
    assert!(report.contains("| 迁移标签数 | 2 |"));
}

#[test]
fn seed_initializes_scope_once() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    write_config(project, json!({}));
    let seed = project.join("common.json");
    fs::write(&seed, r#"{ "ok": "确定", "cancel": "取消" }"#).unwrap();

    let first = run_cli(project, &["seed", "--scope", "common", "--from", "common.json"]);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(String::from_utf8_lossy(&first.stdout).contains("Seeded 2 label(s)"));

    fs::write(&seed, r#"{ "ok": "好的" }"#).unwrap();
    let second = run_cli(project, &["seed", "--scope", "common", "--from", "common.json"]);
    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&second.stdout).contains("already has labels"));

    let labels: Value =
        serde_json::from_str(&fs::read_to_string(project.join("labels/labels.json")).unwrap())
            .unwrap();
    assert_eq!(labels["common"]["ok"]["zh"], "确定");
}

#[test]
fn migrate_report_and_store_resolve_against_root() {
    let tmp = tempdir().unwrap();
    let workspace = tmp.path();
    let project = workspace.join("app");
    write_source(&project, "src/App.tsx", APP);
    write_config(workspace, json!({}));

    let output = run_cli(workspace, &["migrate", "--root", "app"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert!(project.join("labels/labels.json").exists());
    assert!(project.join("report.md").exists());
    assert!(!workspace.join("report.md").exists());
}
