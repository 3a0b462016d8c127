use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::MigrateError;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "label-migrate.json";

/// Detection strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Ast,
    Line,
}

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Configuration for label-migrate
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Project root that `dirs` are resolved against
    #[serde(default = "default_root")]
    pub root: String,

    /// Sub-directories of `root` to scan
    #[serde(default = "default_dirs")]
    pub dirs: Vec<String>,

    /// File extensions to include, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names skipped anywhere in the tree
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Extra glob patterns for paths to skip (e.g. "**/*.test.tsx")
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Minimum candidate length in characters
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,

    #[serde(default = "default_true")]
    pub detect_cjk: bool,

    #[serde(default = "default_true")]
    pub detect_jsx_english: bool,

    /// Detectors to run; results are unioned
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyKind>,

    /// JSX attributes whose values are user-facing text
    #[serde(default = "default_localizable_attributes")]
    pub localizable_attributes: Vec<String>,

    /// Words never reported as JSX text on their own (tag names and the like)
    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,

    /// Property names whose string values are label identities, not text
    #[serde(default = "default_label_properties")]
    pub label_properties: Vec<String>,

    /// Scope used when no enclosing declaration name is known
    #[serde(default = "default_scope")]
    pub default_scope: String,

    /// Appended to the lower-camel context name to form a scope
    #[serde(default = "default_scope_suffix")]
    pub scope_suffix: String,

    /// Language code recorded for extracted source text
    #[serde(default = "default_language")]
    pub language: String,

    /// Object the rewritten references read from (`labels.<key>`)
    #[serde(default = "default_label_object")]
    pub label_object: String,

    /// Path of the JSON label store
    #[serde(default = "default_store")]
    pub store: String,

    #[serde(default)]
    pub output_format: OutputFormat,

    /// Markdown report written by `migrate`
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

fn default_root() -> String {
    ".".to_string()
}

fn default_dirs() -> Vec<String> {
    vec!["src".to_string()]
}

fn default_extensions() -> Vec<String> {
    ["ts", "tsx", "js", "jsx"].iter().map(|s| s.to_string()).collect()
}

fn default_exclude_dirs() -> Vec<String> {
    ["node_modules", ".git", "dist", "build"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_text_length() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_strategies() -> Vec<StrategyKind> {
    vec![StrategyKind::Ast, StrategyKind::Line]
}

fn default_localizable_attributes() -> Vec<String> {
    [
        "placeholder",
        "title",
        "alt",
        "aria-label",
        "aria-description",
        "label",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_stop_words() -> Vec<String> {
    [
        "div", "span", "button", "p", "a", "img", "input", "label", "form", "ul", "ol", "li",
        "table", "tr", "td", "th", "section", "header", "footer", "nav", "main", "br", "hr",
        "h1", "h2", "h3", "h4", "h5", "h6", "select", "option", "textarea", "svg", "path",
        "true", "false", "null", "undefined",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_label_properties() -> Vec<String> {
    vec!["labelKey".to_string(), "labelScope".to_string()]
}

fn default_scope() -> String {
    "common".to_string()
}

fn default_scope_suffix() -> String {
    "View".to_string()
}

fn default_language() -> String {
    "zh".to_string()
}

fn default_label_object() -> String {
    "labels".to_string()
}

fn default_store() -> String {
    "labels/labels.json".to_string()
}

fn default_report_path() -> String {
    "label-migration-report.md".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            dirs: default_dirs(),
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
            exclude_patterns: Vec::new(),
            min_text_length: default_min_text_length(),
            detect_cjk: true,
            detect_jsx_english: true,
            strategies: default_strategies(),
            localizable_attributes: default_localizable_attributes(),
            stop_words: default_stop_words(),
            label_properties: default_label_properties(),
            default_scope: default_scope(),
            scope_suffix: default_scope_suffix(),
            language: default_language(),
            label_object: default_label_object(),
            store: default_store(),
            output_format: OutputFormat::default(),
            report_path: default_report_path(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub root: Option<String>,
    /// Replaces the configured `dirs` when non-empty
    pub dirs: Vec<String>,
    pub output_format: Option<OutputFormat>,
    pub no_chinese: bool,
    pub no_english: bool,
    pub strategies: Vec<StrategyKind>,
    pub store: Option<String>,
    pub report_path: Option<String>,
    pub language: Option<String>,
}

impl Config {
    /// Load configuration from a JSON (or JSON5) file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_json_string(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from a JSON5 string (plain JSON is valid JSON5)
    pub fn from_json_string(json_str: &str) -> Result<Self> {
        let config: Config =
            json5::from_str(json_str).with_context(|| "Failed to parse config JSON string")?;
        Ok(config)
    }

    /// Try to load from default config file, or return default config
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(root) = &overrides.root {
            self.root = root.clone();
        }
        if !overrides.dirs.is_empty() {
            self.dirs = overrides.dirs.clone();
        }
        if let Some(format) = overrides.output_format {
            self.output_format = format;
        }
        if overrides.no_chinese {
            self.detect_cjk = false;
        }
        if overrides.no_english {
            self.detect_jsx_english = false;
        }
        if !overrides.strategies.is_empty() {
            self.strategies = overrides.strategies.clone();
        }
        if let Some(store) = &overrides.store {
            self.store = store.clone();
        }
        if let Some(report) = &overrides.report_path {
            self.report_path = report.clone();
        }
        if let Some(language) = &overrides.language {
            self.language = language.clone();
        }
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<(), MigrateError> {
        if self.min_text_length == 0 {
            return Err(MigrateError::Config(
                "minTextLength must be at least 1".to_string(),
            ));
        }
        if self.strategies.is_empty() {
            return Err(MigrateError::Config(
                "at least one detection strategy is required".to_string(),
            ));
        }
        if !self.detect_cjk && !self.detect_jsx_english {
            return Err(MigrateError::Config(
                "both CJK and English detection are disabled; nothing to scan for".to_string(),
            ));
        }
        if !is_js_identifier(&self.label_object) {
            return Err(MigrateError::Config(format!(
                "labelObject '{}' is not a valid identifier",
                self.label_object
            )));
        }
        if self.default_scope.trim().is_empty() {
            return Err(MigrateError::Config("defaultScope must not be empty".to_string()));
        }
        if self.language.trim().is_empty() {
            return Err(MigrateError::Config("language must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }

    /// Directories to walk, resolved against `root`.
    pub fn scan_dirs(&self) -> Vec<PathBuf> {
        let root = self.root_path();
        if self.dirs.is_empty() {
            return vec![root];
        }
        self.dirs.iter().map(|d| root.join(d)).collect()
    }

    /// Store path, resolved against `root` when relative.
    pub fn store_path(&self) -> PathBuf {
        self.resolve(&self.store)
    }

    /// Migration report path, resolved against `root` when relative.
    pub fn report_file(&self) -> PathBuf {
        self.resolve(&self.report_path)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_path().join(path)
        }
    }

    pub fn uses(&self, strategy: StrategyKind) -> bool {
        self.strategies.contains(&strategy)
    }
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.min_text_length, 2);
        assert_eq!(config.default_scope, "common");
        assert!(config.uses(StrategyKind::Ast));
        assert!(config.uses(StrategyKind::Line));
        assert!(config.localizable_attributes.contains(&"placeholder".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_json5_with_comments() {
        let config = Config::from_json_string(
            r#"{
                // only the app folder
                dirs: ["app"],
                minTextLength: 3,
                strategies: ["line"],
                outputFormat: "json",
            }"#,
        )
        .unwrap();
        assert_eq!(config.dirs, vec!["app".to_string()]);
        assert_eq!(config.min_text_length, 3);
        assert_eq!(config.strategies, vec![StrategyKind::Line]);
        assert_eq!(config.output_format, OutputFormat::Json);
        // Unspecified fields keep defaults
        assert_eq!(config.label_object, "labels");
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = Config::default();
        config.apply_overrides(&ConfigOverrides {
            root: Some("/work/app".to_string()),
            dirs: vec!["web".to_string()],
            no_english: true,
            strategies: vec![StrategyKind::Ast],
            ..Default::default()
        });
        assert_eq!(config.root, "/work/app");
        assert!(!config.detect_jsx_english);
        assert!(config.detect_cjk);
        assert_eq!(config.strategies, vec![StrategyKind::Ast]);
        assert_eq!(config.scan_dirs(), vec![PathBuf::from("/work/app/web")]);
        assert_eq!(
            config.store_path(),
            PathBuf::from("/work/app/labels/labels.json")
        );
        assert_eq!(
            config.report_file(),
            PathBuf::from("/work/app/label-migration-report.md")
        );
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = Config::default();
        config.label_object = "my-labels".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.detect_cjk = false;
        config.detect_jsx_english = false;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.min_text_length = 0;
        assert!(config.validate().is_err());
    }
}
