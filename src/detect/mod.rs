//! Hardcoded-text detection.
//!
//! Two detectors share the [`Occurrence`] output contract: a fast raw-line
//! scanner and a precise SWC-based AST visitor. [`detect_source`] runs the
//! configured ones and unions their results.

pub mod ast;
pub mod line;

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

pub use crate::config::StrategyKind;
use crate::config::Config;
use crate::error::MigrateError;
use crate::ignore::overlaps;
use crate::source::SourceText;

pub use ast::AstDetector;
pub use line::LineDetector;

/// What kind of hardcoded text an occurrence is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Contains CJK characters
    Cjk,
    /// English words in a JSX text node
    JsxText,
    /// English words in a localizable JSX attribute
    JsxAttribute,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cjk => "cjk",
            Self::JsxText => "jsx_text",
            Self::JsxAttribute => "jsx_attribute",
        };
        f.write_str(name)
    }
}

/// Syntactic position of the text, which decides how it can be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSite {
    /// Between JSX tags; replaced by `{ref}`
    JsxText,
    /// Quoted JSX attribute value; quotes and text replaced by `{ref}`
    JsxAttribute,
    /// String or template literal in expression position; replaced by `ref`
    Literal,
    /// Position not safely rewritable; reported only
    Unknown,
}

/// A single detected candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub file_path: String,
    pub line: usize,
    pub column: usize,
    /// Byte range of `raw_text` in the file as it was scanned
    pub byte_span: Range<usize>,
    /// Exact source text at `byte_span`
    pub raw_text: String,
    /// Text as the user sees it (escape sequences decoded)
    pub value: String,
    pub classification: Classification,
    pub site: TextSite,
    pub context_name: Option<String>,
    pub strategy: StrategyKind,
}

impl Occurrence {
    /// Build an occurrence for `span`, or `None` if the span is not a valid slice.
    pub fn at(
        source: &SourceText,
        span: Range<usize>,
        value: String,
        classification: Classification,
        site: TextSite,
        strategy: StrategyKind,
        context_name: Option<String>,
    ) -> Option<Self> {
        let raw_text = source.slice(&span)?.to_string();
        if raw_text.is_empty() {
            return None;
        }
        let (line, column) = source.position(span.start);
        Some(Self {
            file_path: source.path().to_string(),
            line,
            column,
            byte_span: span,
            raw_text,
            value,
            classification,
            site,
            context_name,
            strategy,
        })
    }
}

/// Settings shared by both detectors, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct DetectOptions {
    pub min_text_length: usize,
    pub detect_cjk: bool,
    pub detect_jsx_english: bool,
    pub localizable_attributes: HashSet<String>,
    pub stop_words: HashSet<String>,
    pub label_properties: HashSet<String>,
}

impl DetectOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_text_length: config.min_text_length,
            detect_cjk: config.detect_cjk,
            detect_jsx_english: config.detect_jsx_english,
            localizable_attributes: config.localizable_attributes.iter().cloned().collect(),
            stop_words: config
                .stop_words
                .iter()
                .map(|w| w.to_ascii_lowercase())
                .collect(),
            label_properties: config.label_properties.iter().cloned().collect(),
        }
    }

    fn long_enough(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.min_text_length
    }

    /// CJK classification check shared by both detectors.
    pub fn cjk_candidate(&self, text: &str) -> bool {
        self.detect_cjk && contains_cjk(text) && self.long_enough(text)
    }

    /// English JSX text/attribute check shared by both detectors.
    pub fn english_candidate(&self, text: &str) -> bool {
        self.detect_jsx_english
            && !contains_cjk(text)
            && self.long_enough(text)
            && looks_like_english_text(text, &self.stop_words)
    }
}

/// True for Han, Hiragana, Katakana and Hangul characters.
pub fn is_cjk_char(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk_char)
}

/// Units and handler names that are never UI text on their own.
const NON_TEXT_TOKENS: &[&str] = &[
    "px", "em", "rem", "vh", "vw", "%", "className", "onClick", "onChange", "onSubmit",
];

/// Heuristic for "this is English prose, not code".
pub fn looks_like_english_text(text: &str, stop_words: &HashSet<String>) -> bool {
    let trimmed = text.trim();
    if !trimmed.chars().any(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    if trimmed.starts_with('$') || trimmed.starts_with('{') {
        return false;
    }
    if trimmed
        .chars()
        .any(|c| matches!(c, '{' | '}' | '<' | '>' | '=' | ';' | '(' | ')' | '[' | ']' | '&' | '|'))
        && !is_entity_text(trimmed)
    {
        return false;
    }
    if NON_TEXT_TOKENS.contains(&trimmed) {
        return false;
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words
        .iter()
        .all(|w| stop_words.contains(&w.trim_matches(|c: char| !c.is_alphanumeric()).to_ascii_lowercase()))
    {
        return false;
    }
    if words.len() == 1 && looks_like_identifier(words[0]) {
        return false;
    }
    true
}

/// Text made only of HTML entities and words, such as `Save &amp; exit`.
fn is_entity_text(text: &str) -> bool {
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        let after = &rest[pos + 1..];
        match after.find(';') {
            Some(end) if end > 0 && after[..end].chars().all(|c| c.is_ascii_alphanumeric() || c == '#') => {
                rest = &after[end + 1..];
            }
            _ => return false,
        }
    }
    !rest.chars().any(|c| matches!(c, '{' | '}' | '<' | '>' | '=' | ';' | '(' | ')' | '[' | ']' | '|'))
}

/// camelCase, snake_case, dotted paths and kebab-case tokens.
fn looks_like_identifier(word: &str) -> bool {
    let inner = word.trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ':' | ','));
    if inner.contains('_') || inner.contains('.') || inner.contains('/') {
        return true;
    }
    if inner.contains('-') && inner.chars().all(|c| c.is_ascii_lowercase() || c == '-' || c.is_ascii_digit()) {
        return true;
    }
    let chars: Vec<char> = inner.chars().collect();
    chars
        .windows(2)
        .any(|pair| pair[0].is_ascii_lowercase() && pair[1].is_ascii_uppercase())
}

/// Decode the common JS string escapes in `raw`.
pub fn unescape_js(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('u') => {
                let braced = chars.peek() == Some(&'{');
                if braced {
                    chars.next();
                }
                let mut hex = String::new();
                while let Some(&h) = chars.peek() {
                    if (braced && h == '}') || (!braced && hex.len() == 4) || !h.is_ascii_hexdigit() {
                        break;
                    }
                    hex.push(h);
                    chars.next();
                }
                if braced && chars.peek() == Some(&'}') {
                    chars.next();
                }
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// One detector, selected at runtime.
#[derive(Debug, Clone)]
pub enum DetectionStrategy {
    LineBased(LineDetector),
    AstBased(AstDetector),
}

impl DetectionStrategy {
    pub fn for_kind(kind: StrategyKind, options: &DetectOptions) -> Self {
        match kind {
            StrategyKind::Line => Self::LineBased(LineDetector::new(options.clone())),
            StrategyKind::Ast => Self::AstBased(AstDetector::new(options.clone())),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::LineBased(_) => StrategyKind::Line,
            Self::AstBased(_) => StrategyKind::Ast,
        }
    }

    pub fn scan(&self, source: &SourceText) -> Result<Vec<Occurrence>, MigrateError> {
        match self {
            Self::LineBased(detector) => Ok(detector.scan(source)),
            Self::AstBased(detector) => detector.scan(source),
        }
    }
}

/// Occurrences found in one file plus file-scoped warnings.
#[derive(Debug, Clone, Default)]
pub struct FileDetection {
    pub occurrences: Vec<Occurrence>,
    pub warnings: Vec<String>,
}

/// Run the configured strategies on one file and union the results.
///
/// A parse failure of the AST detector is file-scoped: the line-based
/// results stand in for it (running the line detector if it was not
/// configured) and a warning is recorded.
pub fn detect_source(source: &SourceText, config: &Config) -> FileDetection {
    let options = DetectOptions::from_config(config);
    let mut detection = FileDetection::default();
    let mut results: Vec<Vec<Occurrence>> = Vec::new();
    let mut ran_line = false;
    let mut parse_failed = false;

    for kind in &config.strategies {
        let strategy = DetectionStrategy::for_kind(*kind, &options);
        if strategy.kind() == StrategyKind::Line {
            if ran_line {
                continue;
            }
            ran_line = true;
        }
        match strategy.scan(source) {
            Ok(found) => results.push(found),
            Err(err) => {
                parse_failed = true;
                detection.warnings.push(err.to_string());
            }
        }
    }

    if parse_failed {
        if config.uses(StrategyKind::Line) {
            detection.warnings.push(format!(
                "{}: using line-based results only",
                source.path()
            ));
        } else {
            detection.warnings.push(format!(
                "{}: falling back to line-based detection",
                source.path()
            ));
            results.push(LineDetector::new(options).scan(source));
        }
    }

    detection.occurrences = union_occurrences(results);
    detection
}

/// Union per-strategy results.
///
/// Identical spans are kept once, AST results win, and line-based
/// occurrences that overlap an AST occurrence are dropped.
pub fn union_occurrences(results: Vec<Vec<Occurrence>>) -> Vec<Occurrence> {
    let mut all: Vec<Occurrence> = results.into_iter().flatten().collect();
    all.sort_by_key(|o| (o.strategy != StrategyKind::Ast, o.byte_span.start, o.byte_span.end));

    let mut kept: Vec<Occurrence> = Vec::new();
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    for occ in all {
        if !seen.insert((occ.byte_span.start, occ.byte_span.end)) {
            continue;
        }
        if occ.strategy == StrategyKind::Line
            && kept
                .iter()
                .any(|k| k.strategy == StrategyKind::Ast && overlaps(&k.byte_span, &occ.byte_span))
        {
            continue;
        }
        kept.push(occ);
    }
    kept.sort_by_key(|o| (o.byte_span.start, o.byte_span.end));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(span: Range<usize>, strategy: StrategyKind) -> Occurrence {
        Occurrence {
            file_path: "a.tsx".to_string(),
            line: 1,
            column: span.start + 1,
            byte_span: span,
            raw_text: "x".to_string(),
            value: "x".to_string(),
            classification: Classification::Cjk,
            site: TextSite::Literal,
            context_name: None,
            strategy,
        }
    }

    #[test]
    fn test_union_dedupes_and_prefers_ast() {
        let line = vec![occ(0..4, StrategyKind::Line), occ(10..12, StrategyKind::Line), occ(20..25, StrategyKind::Line)];
        let ast = vec![occ(0..4, StrategyKind::Ast), occ(9..14, StrategyKind::Ast)];
        let merged = union_occurrences(vec![line, ast]);
        let spans: Vec<(Range<usize>, StrategyKind)> = merged
            .iter()
            .map(|o| (o.byte_span.clone(), o.strategy))
            .collect();
        assert_eq!(
            spans,
            vec![
                (0..4, StrategyKind::Ast),
                (9..14, StrategyKind::Ast),
                (20..25, StrategyKind::Line),
            ]
        );
    }

    #[test]
    fn test_english_heuristics() {
        let stop: HashSet<String> = ["div", "span"].iter().map(|s| s.to_string()).collect();
        assert!(looks_like_english_text("Enter name", &stop));
        assert!(looks_like_english_text("Save &amp; exit", &stop));
        assert!(!looks_like_english_text("div", &stop));
        assert!(!looks_like_english_text("onClick", &stop));
        assert!(!looks_like_english_text("user.name", &stop));
        assert!(!looks_like_english_text("a && b", &stop));
        assert!(!looks_like_english_text("42", &stop));
    }

    #[test]
    fn test_cjk_detection() {
        assert!(contains_cjk("确认"));
        assert!(contains_cjk("カタカナ"));
        assert!(contains_cjk("확인"));
        assert!(!contains_cjk("Confirm ，"));
    }

    #[test]
    fn test_unescape_js() {
        assert_eq!(unescape_js(r"确认\n"), "确认\n");
        assert_eq!(unescape_js(r#"say \"hi\""#), "say \"hi\"");
        assert_eq!(unescape_js(r"确\u{8ba4}"), "确认");
    }
}
