//! Structural patterns that mark a candidate as "not user-facing text".
//!
//! Two entry points share one reason vocabulary: [`suppression_for_span`]
//! for raw-line candidates and [`literal_suppression`] for the value of an
//! AST string node. Any overlap with a suppressed region suppresses the
//! candidate. Imports, types, keys and `className` never reach the AST
//! check; the visitor does not descend into them.

use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::OnceLock;

/// Why a candidate was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    Import,
    Comment,
    DeclarationHeader,
    TypeDeclaration,
    Url,
    FilePath,
    CssClass,
    ComponentTag,
    PropertyKey,
}

/// A string or template literal found by the lexical scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralSpan {
    pub quote: char,
    /// Content between the quotes
    pub inner: Range<usize>,
    /// Template literal containing `${...}`
    pub interpolated: bool,
}

/// Comment and literal spans of a whole file.
#[derive(Debug, Clone, Default)]
pub struct Lexical {
    pub comments: Vec<Range<usize>>,
    pub literals: Vec<LiteralSpan>,
}

impl Lexical {
    pub fn in_comment(&self, span: &Range<usize>) -> bool {
        self.comments.iter().any(|c| overlaps(c, span))
    }

    /// Innermost literal whose content contains `span`.
    pub fn literal_containing(&self, span: &Range<usize>) -> Option<&LiteralSpan> {
        self.literals
            .iter()
            .filter(|lit| lit.inner.start <= span.start && span.end <= lit.inner.end)
            .min_by_key(|lit| lit.inner.len())
    }
}

pub fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

struct TemplateFrame {
    start: usize,
    interpolated: bool,
    depth: usize,
}

/// Scan JS/TS text for comments and string literals.
///
/// Quote-delimited strings end at a newline; an unterminated quote is
/// skipped rather than swallowing the rest of the line. A quote right
/// after a word character (`It's`, `确认'`) is text, not an opening quote.
/// Regex literals are not recognised.
pub fn scan_lexical(text: &str) -> Lexical {
    let bytes = text.as_bytes();
    let mut lexical = Lexical::default();
    let mut templates: Vec<TemplateFrame> = Vec::new();
    let mut in_template_text = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        if in_template_text {
            match (b, next) {
                (b'\\', _) => i += 2,
                (b'`', _) => {
                    if let Some(frame) = templates.pop() {
                        lexical.literals.push(LiteralSpan {
                            quote: '`',
                            inner: frame.start..i,
                            interpolated: frame.interpolated,
                        });
                    }
                    in_template_text = false;
                    i += 1;
                }
                (b'$', Some(b'{')) => {
                    if let Some(frame) = templates.last_mut() {
                        frame.interpolated = true;
                        frame.depth = 0;
                    }
                    in_template_text = false;
                    i += 2;
                }
                _ => i += 1,
            }
            continue;
        }

        match (b, next) {
            (b'/', Some(b'/')) => {
                let end = text[i..].find('\n').map(|p| i + p).unwrap_or(bytes.len());
                lexical.comments.push(i..end);
                i = end;
            }
            (b'/', Some(b'*')) => {
                let end = text[i + 2..]
                    .find("*/")
                    .map(|p| i + 2 + p + 2)
                    .unwrap_or(bytes.len());
                lexical.comments.push(i..end);
                i = end;
            }
            (b'\'' | b'"', _) if follows_word(text, i) => i += 1,
            (b'\'' | b'"', _) => {
                let mut j = i + 1;
                let mut closed = None;
                while j < bytes.len() {
                    match bytes[j] {
                        b'\\' => j += 2,
                        b'\n' => break,
                        c if c == b => {
                            closed = Some(j);
                            break;
                        }
                        _ => j += 1,
                    }
                }
                match closed {
                    Some(end) => {
                        lexical.literals.push(LiteralSpan {
                            quote: b as char,
                            inner: i + 1..end,
                            interpolated: false,
                        });
                        i = end + 1;
                    }
                    None => i += 1,
                }
            }
            (b'`', _) => {
                templates.push(TemplateFrame {
                    start: i + 1,
                    interpolated: false,
                    depth: 0,
                });
                in_template_text = true;
                i += 1;
            }
            (b'{', _) => {
                if let Some(frame) = templates.last_mut() {
                    frame.depth += 1;
                }
                i += 1;
            }
            (b'}', _) => {
                if let Some(frame) = templates.last_mut() {
                    if frame.depth == 0 {
                        in_template_text = true;
                    } else {
                        frame.depth -= 1;
                    }
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    lexical
}

/// Byte `at` directly follows an identifier or letter character.
fn follows_word(text: &str, at: usize) -> bool {
    text[..at]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

// Whole-line patterns

static IMPORT_LINE: OnceLock<Regex> = OnceLock::new();
static EXPORT_FROM_LINE: OnceLock<Regex> = OnceLock::new();
static TYPE_DECL_LINE: OnceLock<Regex> = OnceLock::new();

// Region patterns

static DECL_HEADER: OnceLock<Regex> = OnceLock::new();
static MODULE_CALL: OnceLock<Regex> = OnceLock::new();
static URL: OnceLock<Regex> = OnceLock::new();
static RELATIVE_PATH_LITERAL: OnceLock<Regex> = OnceLock::new();
static CLASS_ATTR: OnceLock<Regex> = OnceLock::new();
static COMPONENT_TAG: OnceLock<Regex> = OnceLock::new();
static PROPERTY_KEY: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("ignore pattern is invalid - this is a bug"))
}

/// Reason a whole line is out of bounds for detection.
pub fn line_suppression(line: &str) -> Option<IgnoreReason> {
    if regex(&IMPORT_LINE, r"^\s*import\b").is_match(line)
        || regex(
            &EXPORT_FROM_LINE,
            r#"^\s*export\s+(?:type\s+)?(?:\*|\{[^}]*\})[^;]*\bfrom\s*['"]"#,
        )
        .is_match(line)
    {
        return Some(IgnoreReason::Import);
    }
    if regex(
        &TYPE_DECL_LINE,
        r"^\s*(?:export\s+)?(?:declare\s+)?(?:type|interface)\s+[A-Za-z_$]",
    )
    .is_match(line)
    {
        return Some(IgnoreReason::TypeDeclaration);
    }
    None
}

/// Suppressed byte ranges within a single line, relative to the line start.
pub fn region_suppressions(line: &str) -> Vec<(Range<usize>, IgnoreReason)> {
    let patterns: [(&Regex, IgnoreReason); 7] = [
        (
            regex(
                &DECL_HEADER,
                r"\b(?:const|let|var|function\*?|class|interface|type|enum)\s+[A-Za-z_$][\w$]*",
            ),
            IgnoreReason::DeclarationHeader,
        ),
        (
            regex(
                &MODULE_CALL,
                r#"\b(?:require|import)\s*\(\s*(?:'[^']*'|"[^"]*"|`[^`]*`)\s*\)"#,
            ),
            IgnoreReason::Import,
        ),
        (
            regex(&URL, r#"\b[a-zA-Z][a-zA-Z0-9+.-]*://[^\s'"`<>)]*"#),
            IgnoreReason::Url,
        ),
        (
            regex(
                &RELATIVE_PATH_LITERAL,
                r#"'\.{1,2}/[^']*'|"\.{1,2}/[^"]*""#,
            ),
            IgnoreReason::FilePath,
        ),
        (
            regex(
                &CLASS_ATTR,
                r#"\b(?:className|class)\s*=\s*(?:"[^"]*"|'[^']*'|\{[^}]*\})"#,
            ),
            IgnoreReason::CssClass,
        ),
        (
            regex(&COMPONENT_TAG, r"</?[A-Z][\w.]*"),
            IgnoreReason::ComponentTag,
        ),
        (
            regex(
                &PROPERTY_KEY,
                r#"(?:^\s*|[{,(]\s*)(?:[A-Za-z_$][\w$-]*|"[^"\n]*"|'[^'\n]*')\s*:"#,
            ),
            IgnoreReason::PropertyKey,
        ),
    ];

    let mut regions = Vec::new();
    for (re, reason) in patterns {
        for m in re.find_iter(line) {
            regions.push((m.range(), reason));
        }
    }
    regions
}

/// Decide whether a raw-line candidate at absolute `span` is suppressed.
///
/// `line` is the full text of the line starting at byte `line_start`.
pub fn suppression_for_span(
    lexical: &Lexical,
    line: &str,
    line_start: usize,
    span: &Range<usize>,
) -> Option<IgnoreReason> {
    if lexical.in_comment(span) {
        return Some(IgnoreReason::Comment);
    }
    if let Some(reason) = line_suppression(line) {
        return Some(reason);
    }
    let relative = span.start.saturating_sub(line_start)..span.end.saturating_sub(line_start);
    region_suppressions(line)
        .into_iter()
        .find(|(region, _)| overlaps(region, &relative))
        .map(|(_, reason)| reason)
}

/// Decide whether the value of an AST string node should be suppressed.
pub fn literal_suppression(text: &str) -> Option<IgnoreReason> {
    let trimmed = text.trim();
    if regex(&URL, r#"\b[a-zA-Z][a-zA-Z0-9+.-]*://[^\s'"`<>)]*"#)
        .find(trimmed)
        .is_some_and(|m| m.start() == 0)
    {
        return Some(IgnoreReason::Url);
    }
    if looks_like_path(trimmed) {
        return Some(IgnoreReason::FilePath);
    }
    None
}

fn looks_like_path(text: &str) -> bool {
    if text.starts_with("./") || text.starts_with("../") {
        return true;
    }
    text.starts_with('/')
        && text.len() > 1
        && !text.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason_at(line: &str, needle: &str) -> Option<IgnoreReason> {
        let lexical = scan_lexical(line);
        let start = line.find(needle).unwrap();
        suppression_for_span(&lexical, line, 0, &(start..start + needle.len()))
    }

    #[test]
    fn test_scan_lexical_comments_and_strings() {
        let text = "const a = '确认'; // 注释\n/* 块\n注释 */ const b = \"x\";";
        let lex = scan_lexical(text);
        assert_eq!(lex.comments.len(), 2);
        assert_eq!(&text[lex.comments[0].clone()], "// 注释");
        assert!(text[lex.comments[1].clone()].ends_with("*/"));
        let inner: Vec<&str> = lex.literals.iter().map(|l| &text[l.inner.clone()]).collect();
        assert_eq!(inner, vec!["确认", "x"]);
    }

    #[test]
    fn test_scan_lexical_template_interpolation() {
        let text = "const s = `共 ${count} 条`; const t = `你好`;";
        let lex = scan_lexical(text);
        let templates: Vec<&LiteralSpan> = lex.literals.iter().filter(|l| l.quote == '`').collect();
        assert_eq!(templates.len(), 2);
        assert!(templates[0].interpolated);
        assert!(!templates[1].interpolated);
        assert_eq!(&text[templates[1].inner.clone()], "你好");
    }

    #[test]
    fn test_scan_lexical_skips_unterminated_apostrophe() {
        let text = "<p>Don't stop</p> // tail\nconst a = \"ok\";";
        let lex = scan_lexical(text);
        assert_eq!(lex.comments.len(), 1);
        assert!(lex.literals.iter().any(|l| &text[l.inner.clone()] == "ok"));
    }

    #[test]
    fn test_scan_lexical_apostrophes_in_text_are_not_quotes() {
        let text = "<p>It's 确认</p><p>that's ok</p>";
        assert!(scan_lexical(text).literals.is_empty());

        let text = "<p>it's \"确认\"</p>";
        let lex = scan_lexical(text);
        assert_eq!(lex.literals.len(), 1);
        assert_eq!(&text[lex.literals[0].inner.clone()], "确认");
    }

    #[test]
    fn test_comment_string_markers_inside_strings() {
        let text = "const u = \"http://example.com\";";
        let lex = scan_lexical(text);
        assert!(lex.comments.is_empty());
    }

    #[test]
    fn test_import_lines_suppressed() {
        assert_eq!(
            line_suppression("import Foo from './Foo'"),
            Some(IgnoreReason::Import)
        );
        assert_eq!(
            line_suppression("export { a } from \"./a\";"),
            Some(IgnoreReason::Import)
        );
        assert_eq!(
            line_suppression("export interface Props {"),
            Some(IgnoreReason::TypeDeclaration)
        );
        assert_eq!(line_suppression("const title = '标题';"), None);
    }

    #[test]
    fn test_region_reasons() {
        assert_eq!(
            reason_at("<a href=\"https://例子.com\">", "例子"),
            Some(IgnoreReason::Url)
        );
        assert_eq!(
            reason_at("<div className=\"标题 big\">", "标题"),
            Some(IgnoreReason::CssClass)
        );
        assert_eq!(
            reason_at("const map = { '确认': 1 };", "确认"),
            Some(IgnoreReason::PropertyKey)
        );
        assert_eq!(
            reason_at("const x = require('./资源');", "资源"),
            Some(IgnoreReason::Import)
        );
        assert_eq!(
            reason_at("x = 1; // 注释", "注释"),
            Some(IgnoreReason::Comment)
        );
        assert_eq!(reason_at("const map = { ok: '确认' };", "确认"), None);
        assert_eq!(reason_at("const t = ok ? \"是\" : \"否\";", "是"), None);
    }

    #[test]
    fn test_literal_suppression() {
        assert_eq!(
            literal_suppression("https://example.com/搜索"),
            Some(IgnoreReason::Url)
        );
        assert_eq!(
            literal_suppression("../assets/图标.svg"),
            Some(IgnoreReason::FilePath)
        );
        assert_eq!(literal_suppression("/usr/share/图标"), Some(IgnoreReason::FilePath));
        assert_eq!(literal_suppression("确认 / 取消"), None);
    }
}
