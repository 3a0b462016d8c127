use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

use super::{unescape_js, Classification, DetectOptions, Occurrence, StrategyKind, TextSite};
use crate::ignore::{scan_lexical, suppression_for_span, Lexical};
use crate::source::SourceText;

/// Run of CJK characters, allowing CJK punctuation after the first character.
/// Matches: `确认`, `确认删除吗？`, `ようこそ`
static CJK_RUN_REGEX: OnceLock<Regex> = OnceLock::new();

/// Text between a closing `>` and the next `<` on the same line.
/// Captures: Group 1 = the segment
static JSX_TEXT_REGEX: OnceLock<Regex> = OnceLock::new();

/// `name="value"` / `name='value'` as written in JSX (no spaces around `=`).
/// Captures: Group 1 = attribute name, Group 2/3 = value
static JSX_ATTR_REGEX: OnceLock<Regex> = OnceLock::new();

/// `name =` immediately before a quote.
static ATTR_ASSIGN_TAIL_REGEX: OnceLock<Regex> = OnceLock::new();

/// An opening tag that is still open at the end of the prefix.
static OPEN_TAG_REGEX: OnceLock<Regex> = OnceLock::new();

/// From a `<` up to (not including) the `>` that closes a tag:
/// `<div className="x"`, `</p`, `<br/`, `<`.
static TAG_BODY_REGEX: OnceLock<Regex> = OnceLock::new();

/// Last line of a tag opened on an earlier line: attributes only.
static TAG_TAIL_REGEX: OnceLock<Regex> = OnceLock::new();

/// `>` followed later by `<`, or a closing/self-closing tag marker.
static MARKUP_REGEX: OnceLock<Regex> = OnceLock::new();

fn cjk_run_regex() -> &'static Regex {
    CJK_RUN_REGEX.get_or_init(|| {
        Regex::new(r"[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}][\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}\u{3000}-\u{303F}\u{FF00}-\u{FFEF}]*")
            .expect("CJK_RUN_REGEX pattern is invalid - this is a bug")
    })
}

fn jsx_text_regex() -> &'static Regex {
    JSX_TEXT_REGEX.get_or_init(|| {
        Regex::new(r">([^<>{}\n]+)<").expect("JSX_TEXT_REGEX pattern is invalid - this is a bug")
    })
}

fn jsx_attr_regex() -> &'static Regex {
    JSX_ATTR_REGEX.get_or_init(|| {
        Regex::new(r#"(?:^|\s)([A-Za-z][\w:-]*)=(?:"([^"\n]*)"|'([^'\n]*)')"#)
            .expect("JSX_ATTR_REGEX pattern is invalid - this is a bug")
    })
}

fn attr_assign_tail_regex() -> &'static Regex {
    ATTR_ASSIGN_TAIL_REGEX.get_or_init(|| {
        Regex::new(r"(?:^|\s)([A-Za-z][\w:-]*)\s*=\s*$")
            .expect("ATTR_ASSIGN_TAIL_REGEX pattern is invalid - this is a bug")
    })
}

fn open_tag_regex() -> &'static Regex {
    OPEN_TAG_REGEX.get_or_init(|| {
        Regex::new(r"<[A-Za-z][\w.]*(?:\s[^<>]*)?$")
            .expect("OPEN_TAG_REGEX pattern is invalid - this is a bug")
    })
}

fn tag_body_regex() -> &'static Regex {
    TAG_BODY_REGEX.get_or_init(|| {
        Regex::new(r"^</?(?:[A-Za-z][\w.:-]*(?:\s[^<]*)?)?/?$")
            .expect("TAG_BODY_REGEX pattern is invalid - this is a bug")
    })
}

fn tag_tail_regex() -> &'static Regex {
    TAG_TAIL_REGEX.get_or_init(|| {
        Regex::new(
            r#"^\s*[})\]]*\s*(?:[A-Za-z][\w:-]*(?:=(?:"[^"]*"|'[^']*'|\{.*\}))?\s*)*/?$"#,
        )
        .expect("TAG_TAIL_REGEX pattern is invalid - this is a bug")
    })
}

fn markup_regex() -> &'static Regex {
    MARKUP_REGEX.get_or_init(|| {
        Regex::new(r">[^<>]*<|</|/>").expect("MARKUP_REGEX pattern is invalid - this is a bug")
    })
}

/// Fast, approximate detector working on raw lines.
///
/// It has no syntax tree, so occurrences never carry a context name.
#[derive(Debug, Clone)]
pub struct LineDetector {
    options: DetectOptions,
}

impl LineDetector {
    pub fn new(options: DetectOptions) -> Self {
        Self { options }
    }

    pub fn scan(&self, source: &SourceText) -> Vec<Occurrence> {
        let lexical = scan_lexical(source.text());
        let jsx = source.allows_jsx();
        let mut found = Vec::new();

        for (_, line_start, line) in source.lines() {
            if self.options.detect_cjk {
                self.scan_cjk(source, &lexical, jsx, line, line_start, &mut found);
            }
            if jsx && self.options.detect_jsx_english {
                self.scan_jsx_text(source, &lexical, line, line_start, &mut found);
                self.scan_jsx_attributes(source, &lexical, line, line_start, &mut found);
            }
        }

        found.sort_by_key(|o: &Occurrence| (o.byte_span.start, o.byte_span.end));
        found.dedup_by(|a, b| a.byte_span == b.byte_span);
        found
    }

    fn scan_cjk(
        &self,
        source: &SourceText,
        lexical: &Lexical,
        jsx: bool,
        line: &str,
        line_start: usize,
        found: &mut Vec<Occurrence>,
    ) {
        for m in cjk_run_regex().find_iter(line) {
            let run = line_start + m.start()..line_start + m.end();
            let (span, site) = widen_cjk_run(source.text(), lexical, jsx, line, line_start, run);
            let raw = &source.text()[span.clone()];
            if !self.options.cjk_candidate(raw) {
                continue;
            }
            if suppression_for_span(lexical, line, line_start, &span).is_some() {
                continue;
            }
            let value = if site == TextSite::Literal || site == TextSite::JsxAttribute {
                unescape_js(raw)
            } else {
                raw.to_string()
            };
            found.extend(Occurrence::at(
                source,
                span,
                value,
                Classification::Cjk,
                site,
                StrategyKind::Line,
                None,
            ));
        }
    }

    fn scan_jsx_text(
        &self,
        source: &SourceText,
        lexical: &Lexical,
        line: &str,
        line_start: usize,
        found: &mut Vec<Occurrence>,
    ) {
        for cap in jsx_text_regex().captures_iter(line) {
            let Some(segment) = cap.get(1) else { continue };
            if !closes_tag(line, segment.start() - 1) {
                continue;
            }
            let Some(span) = trimmed_span(line, segment.range()) else {
                continue;
            };
            let text = &line[span.clone()];
            if !self.options.english_candidate(text) {
                continue;
            }
            let abs = line_start + span.start..line_start + span.end;
            if lexical.literal_containing(&abs).is_some()
                || suppression_for_span(lexical, line, line_start, &abs).is_some()
            {
                continue;
            }
            found.extend(Occurrence::at(
                source,
                abs,
                text.to_string(),
                Classification::JsxText,
                TextSite::JsxText,
                StrategyKind::Line,
                None,
            ));
        }
    }

    fn scan_jsx_attributes(
        &self,
        source: &SourceText,
        lexical: &Lexical,
        line: &str,
        line_start: usize,
        found: &mut Vec<Occurrence>,
    ) {
        for cap in jsx_attr_regex().captures_iter(line) {
            let (Some(name), Some(value)) = (cap.get(1), cap.get(2).or_else(|| cap.get(3))) else {
                continue;
            };
            if !self.options.localizable_attributes.contains(name.as_str()) {
                continue;
            }
            if !in_jsx_tag(line, name.start()) {
                continue;
            }
            if !self.options.english_candidate(value.as_str()) {
                continue;
            }
            let abs = line_start + value.start()..line_start + value.end();
            if suppression_for_span(lexical, line, line_start, &abs).is_some() {
                continue;
            }
            found.extend(Occurrence::at(
                source,
                abs,
                unescape_js(value.as_str()),
                Classification::JsxAttribute,
                TextSite::JsxAttribute,
                StrategyKind::Line,
                None,
            ));
        }
    }
}

/// The `>` at `gt` ends a JSX tag, not an operator or a generic
/// argument list such as `Base<T>`.
fn closes_tag(line: &str, gt: usize) -> bool {
    let prefix = &line[..gt];
    if prefix.ends_with('=') || prefix.ends_with('-') {
        return false;
    }
    match prefix.rfind('<') {
        Some(lt) => {
            let generic = line[..lt]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$');
            !generic && tag_body_regex().is_match(&prefix[lt..])
        }
        None => {
            prefix.trim().is_empty()
                || (!prefix.ends_with(char::is_whitespace) && tag_tail_regex().is_match(prefix))
        }
    }
}

/// Byte `rel` of `line` sits in JSX text right after a tag.
fn in_jsx_text(line: &str, rel: usize) -> bool {
    let before = &line[..rel];
    match before.rfind('>') {
        Some(gt) => !before[gt + 1..].contains(&['<', '{', '}'][..]) && closes_tag(line, gt),
        None => false,
    }
}

/// Attribute at `name_start` belongs to a JSX tag: either a tag opens
/// earlier on the line, or the attribute starts the line (multi-line tag).
fn in_jsx_tag(line: &str, name_start: usize) -> bool {
    let prefix = &line[..name_start];
    open_tag_regex().is_match(prefix) || prefix.trim().is_empty()
}

/// Sub-range of `range` in `line` with surrounding whitespace removed.
fn trimmed_span(line: &str, range: Range<usize>) -> Option<Range<usize>> {
    let segment = &line[range.clone()];
    let leading = segment.len() - segment.trim_start().len();
    let trailing = segment.len() - segment.trim_end().len();
    if leading + trailing >= segment.len() {
        return None;
    }
    Some(range.start + leading..range.end - trailing)
}

/// Grow a CJK run to the syntactic unit it sits in.
///
/// Inside a plain literal the whole literal content is taken; inside a
/// `>...<` segment of a JSX file the trimmed segment is taken when it has
/// no `{}`. A run inside an interpolated template, a "literal" that is
/// really quoted JSX text or spans markup, or one whose position cannot
/// be determined from the line, stays as is with [`TextSite::Unknown`].
fn widen_cjk_run(
    text: &str,
    lexical: &Lexical,
    jsx: bool,
    line: &str,
    line_start: usize,
    run: Range<usize>,
) -> (Range<usize>, TextSite) {
    if let Some(literal) = lexical.literal_containing(&run) {
        let quote_at = literal.inner.start.saturating_sub(1);
        let quote_rel = (quote_at >= line_start).then(|| quote_at - line_start);
        let suspicious = jsx
            && (markup_regex().is_match(&text[literal.inner.clone()])
                || quote_rel.is_some_and(|rel| in_jsx_text(line, rel)));
        if literal.interpolated || suspicious {
            return (run, TextSite::Unknown);
        }
        let site = if jsx
            && literal.quote != '`'
            && quote_rel.is_some_and(|rel| is_attribute_value(line, rel))
        {
            TextSite::JsxAttribute
        } else {
            TextSite::Literal
        };
        return (literal.inner.clone(), site);
    }

    if !jsx {
        return (run, TextSite::Unknown);
    }
    let rel_start = run.start - line_start;
    let rel_end = run.end - line_start;
    let before = &line[..rel_start];
    let after = &line[rel_end..];
    let gt = before.rfind('>');
    let lt = after.find('<');
    if let (Some(gt), Some(lt)) = (gt, lt) {
        let tag_closed = !before[gt + 1..].contains('<');
        if tag_closed && closes_tag(line, gt) && !after[..lt].contains('>') {
            let segment = gt + 1..rel_end + lt;
            let seg_text = &line[segment.clone()];
            if !seg_text.contains('{') && !seg_text.contains('}') {
                if let Some(trimmed) = trimmed_span(line, segment) {
                    let abs = line_start + trimmed.start..line_start + trimmed.end;
                    if text.get(abs.clone()).is_some() {
                        return (abs, TextSite::JsxText);
                    }
                }
            }
            return (run, TextSite::JsxText);
        }
    }
    (run, TextSite::Unknown)
}

/// Quote at `quote_rel` opens a JSX attribute value.
fn is_attribute_value(line: &str, quote_rel: usize) -> bool {
    let prefix = &line[..quote_rel];
    let Some(tail) = attr_assign_tail_regex().find(prefix) else {
        return false;
    };
    let name_area = &prefix[..tail.start()];
    if open_tag_regex().is_match(name_area) {
        return true;
    }
    // Attribute line of a multi-line tag is written `name="..."`; with
    // spaces around `=` it is a class field or an assignment
    let Some(before_eq) = prefix.strip_suffix('=') else {
        return false;
    };
    name_area.trim().is_empty() && !before_eq.ends_with(char::is_whitespace)
}
