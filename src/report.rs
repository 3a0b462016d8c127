//! Reports for scans and migrations: JSON, Markdown and console text.

use serde::Serialize;
use std::fmt::Write as _;

use crate::config::Config;
use crate::detect::{Classification, Occurrence, StrategyKind, TextSite};
use crate::identity;
use crate::migrate::MigrationResult;

/// One table row: an occurrence with its suggested identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub line: usize,
    pub column: usize,
    pub text: String,
    pub classification: Classification,
    pub site: TextSite,
    pub strategy: StrategyKind,
    pub scope: String,
    /// `None` when no key can be derived (purely symbolic text)
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: String,
    pub findings: Vec<Finding>,
}

/// Detection-only result for a whole run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub root: String,
    pub files_scanned: usize,
    pub total_occurrences: usize,
    /// Files with at least one finding, in traversal order
    pub files: Vec<FileReport>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ScanReport {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Record one scanned file.
    pub fn add_file(&mut self, path: &str, occurrences: &[Occurrence], config: &Config) {
        self.files_scanned += 1;
        if occurrences.is_empty() {
            return;
        }
        let findings: Vec<Finding> = occurrences
            .iter()
            .map(|occ| {
                let key = match identity::label_key(&occ.value) {
                    Ok(key) => Some(key),
                    Err(err) => {
                        self.warnings
                            .push(format!("{}:{}:{}: {}", path, occ.line, occ.column, err));
                        None
                    }
                };
                Finding {
                    line: occ.line,
                    column: occ.column,
                    text: occ.raw_text.clone(),
                    classification: occ.classification,
                    site: occ.site,
                    strategy: occ.strategy,
                    scope: identity::scope_for(occ.context_name.as_deref(), config),
                    key,
                }
            })
            .collect();
        self.total_occurrences += findings.len();
        self.files.push(FileReport {
            path: path.to_string(),
            findings,
        });
    }
}

pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Escape a value for a Markdown table cell.
fn cell(text: &str) -> String {
    text.trim()
        .replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

fn push_list(out: &mut String, items: &[String]) {
    if items.is_empty() {
        out.push_str("无\n");
        return;
    }
    for item in items {
        let _ = writeln!(out, "- {}", item.replace('\n', " "));
    }
}

/// Per-file Markdown table of findings.
pub fn render_scan_markdown(report: &ScanReport, line_numbers: bool) -> String {
    let mut out = String::new();
    out.push_str("# 硬编码文本扫描报告\n\n");
    let _ = writeln!(out, "- 扫描目录: `{}`", report.root);
    let _ = writeln!(out, "- 扫描文件数: {}", report.files_scanned);
    let _ = writeln!(out, "- 发现硬编码文本: {}", report.total_occurrences);
    out.push('\n');

    if report.total_occurrences == 0 {
        out.push_str("未发现硬编码文本 (no issues found)\n");
    }

    for file in &report.files {
        let _ = writeln!(out, "## {}\n", file.path);
        if line_numbers {
            out.push_str("| 行号 | 列号 | 硬编码文本 | 建议的标签键 | 建议的作用域 |\n");
            out.push_str("|------|------|------------|--------------|--------------|\n");
        } else {
            out.push_str("| 硬编码文本 | 建议的标签键 | 建议的作用域 |\n");
            out.push_str("|------------|--------------|--------------|\n");
        }
        for finding in &file.findings {
            let key = finding.key.as_deref().unwrap_or("-");
            if line_numbers {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} |",
                    finding.line,
                    finding.column,
                    cell(&finding.text),
                    cell(key),
                    cell(&finding.scope)
                );
            } else {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} |",
                    cell(&finding.text),
                    cell(key),
                    cell(&finding.scope)
                );
            }
        }
        out.push('\n');
    }

    if !report.errors.is_empty() {
        out.push_str("## 错误\n\n");
        push_list(&mut out, &report.errors);
        out.push('\n');
    }
    if !report.warnings.is_empty() {
        out.push_str("## 警告\n\n");
        push_list(&mut out, &report.warnings);
    }
    out
}

/// Console listing for `scan`.
pub fn render_scan_text(report: &ScanReport, line_numbers: bool) -> String {
    let mut out = String::new();
    if report.total_occurrences == 0 {
        let _ = writeln!(
            out,
            "No hardcoded text found ({} file(s) scanned).",
            report.files_scanned
        );
        return out;
    }
    for file in &report.files {
        for finding in &file.findings {
            let location = if line_numbers {
                format!("{}:{}:{}", file.path, finding.line, finding.column)
            } else {
                file.path.clone()
            };
            let _ = writeln!(
                out,
                "{} [{}] {:?} -> {}.{}",
                location,
                finding.classification,
                finding.text,
                finding.scope,
                finding.key.as_deref().unwrap_or("?")
            );
        }
    }
    let _ = writeln!(
        out,
        "\nFound {} occurrence(s) in {} file(s) ({} scanned).",
        report.total_occurrences,
        report.files.len(),
        report.files_scanned
    );
    out
}

/// Markdown report for a migration run.
pub fn render_migration_markdown(result: &MigrationResult) -> String {
    let mut out = String::new();
    out.push_str("# 标签迁移报告\n\n");

    out.push_str("## 迁移状态\n\n");
    let status = if result.success {
        "成功 (success)"
    } else {
        "失败 (failure)"
    };
    let _ = writeln!(out, "{}", status);
    if result.dry_run {
        out.push_str("\n演练模式 (dry run): 未修改任何文件或标签\n");
    }
    out.push('\n');

    out.push_str("## 迁移统计\n\n");
    out.push_str("| 项目 | 数量 |\n");
    out.push_str("|------|------|\n");
    let rows = [
        ("扫描文件数", result.files_scanned),
        ("发现硬编码文本", result.occurrences_found),
        ("迁移文件数", result.migrated_files_count),
        ("迁移标签数", result.migrated_labels_count),
        ("新写入标签", result.labels_written),
    ];
    for (name, count) in rows {
        let _ = writeln!(out, "| {} | {} |", name, count);
    }
    out.push('\n');

    out.push_str("## 错误\n\n");
    push_list(&mut out, &result.errors);
    out.push('\n');

    out.push_str("## 警告\n\n");
    push_list(&mut out, &result.warnings);
    out
}

/// Console summary for `migrate`.
pub fn render_migration_text(result: &MigrationResult) -> String {
    let mut out = String::new();
    let prefix = if result.dry_run { "[dry run] " } else { "" };
    let _ = writeln!(
        out,
        "{}Migrated {} label reference(s) in {} file(s); {} new label(s) stored.",
        prefix, result.migrated_labels_count, result.migrated_files_count, result.labels_written
    );
    let _ = writeln!(
        out,
        "Scanned {} file(s), found {} occurrence(s), {} error(s), {} warning(s).",
        result.files_scanned,
        result.occurrences_found,
        result.errors.len(),
        result.warnings.len()
    );
    for error in &result.errors {
        let _ = writeln!(out, "  error: {}", error);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrence(text: &str, line: usize, context: Option<&str>) -> Occurrence {
        Occurrence {
            file_path: "src/App.tsx".to_string(),
            line,
            column: 5,
            byte_span: 0..text.len(),
            raw_text: text.to_string(),
            value: text.to_string(),
            classification: Classification::JsxText,
            site: TextSite::JsxText,
            context_name: context.map(str::to_string),
            strategy: StrategyKind::Ast,
        }
    }

    #[test]
    fn test_empty_scan_says_no_issues() {
        let mut report = ScanReport::new("src");
        report.add_file("src/a.tsx", &[], &Config::default());
        let markdown = render_scan_markdown(&report, true);
        assert!(markdown.contains("no issues found"));
        assert!(!markdown.contains("| 行号 |"));
        assert!(render_scan_text(&report, true).contains("No hardcoded text found"));
    }

    #[test]
    fn test_scan_table_rows() {
        let mut report = ScanReport::new("src");
        report.add_file(
            "src/App.tsx",
            &[
                occurrence("Save | Exit", 3, Some("App")),
                occurrence("***", 4, None),
            ],
            &Config::default(),
        );
        let markdown = render_scan_markdown(&report, true);
        assert!(markdown.contains("| 行号 | 列号 | 硬编码文本 | 建议的标签键 | 建议的作用域 |"));
        assert!(markdown.contains("| 3 | 5 | Save \\| Exit | save_exit | appView |"));
        assert!(markdown.contains("| 4 | 5 | *** | - | common |"));
        assert_eq!(report.warnings.len(), 1);

        let without = render_scan_markdown(&report, false);
        assert!(without.contains("| Save \\| Exit | save_exit | appView |"));
        assert!(!without.contains("行号"));
    }

    #[test]
    fn test_migration_markdown_sections() {
        let result = MigrationResult {
            success: false,
            errors: vec!["label store write failed for src/a.tsx: disk full".to_string()],
            warnings: Vec::new(),
            migrated_labels_count: 2,
            migrated_files_count: 1,
            files_scanned: 3,
            labels_written: 2,
            occurrences_found: 4,
            dry_run: false,
        };
        let markdown = render_migration_markdown(&result);
        for section in ["## 迁移状态", "## 迁移统计", "## 错误", "## 警告"] {
            assert!(markdown.contains(section), "missing {}", section);
        }
        assert!(markdown.contains("失败"));
        assert!(markdown.contains("| 迁移标签数 | 2 |"));
        assert!(markdown.contains("- label store write failed"));
        assert!(markdown.ends_with("无\n"));
    }

    #[test]
    fn test_json_output() {
        let mut report = ScanReport::new("src");
        report.add_file("src/App.tsx", &[occurrence("Enter name", 1, None)], &Config::default());
        let json = to_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["totalOccurrences"], 1);
        assert_eq!(value["files"][0]["findings"][0]["key"], "enter_name");
        assert_eq!(value["files"][0]["findings"][0]["classification"], "jsx_text");
    }
}
