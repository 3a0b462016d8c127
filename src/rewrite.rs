//! Source rewriting: replace detected text with label references.
//!
//! Edits are applied rightmost first. Every pending edit lies strictly to
//! the left of the ones already applied, so its offsets into the original
//! text stay valid without any adjustment.

use std::ops::Range;
use thiserror::Error;

use crate::detect::{Occurrence, TextSite};

/// A single replacement against the original file text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEdit {
    /// Byte range in the original text (quotes included for literals)
    pub range: Range<usize>,
    pub replacement: String,
    /// Original text at `range`, checked again right before replacing
    pub expected: String,
    /// Caller's index of the occurrence this edit migrates
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("text at this position cannot be rewritten safely")]
    UnsafeSite,
    #[error("source no longer matches the detected text")]
    StaleSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Overlaps an edit further right, which was kept
    Overlap,
    /// Text at the range changed since planning
    StaleSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEdit {
    pub index: usize,
    pub reason: DropReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub text: String,
    /// Indices of applied edits, in application order (descending offset)
    pub applied: Vec<usize>,
    pub dropped: Vec<DroppedEdit>,
}

/// `labels.<key>` style reference expression.
pub fn reference_expr(label_object: &str, key: &str) -> String {
    format!("{}.{}", label_object, key)
}

/// Work out the range and replacement for one occurrence.
pub fn plan_edit(
    text: &str,
    occ: &Occurrence,
    index: usize,
    reference: &str,
) -> Result<PlannedEdit, PlanError> {
    let span = occ.byte_span.clone();
    if text.get(span.clone()) != Some(occ.raw_text.as_str()) {
        return Err(PlanError::StaleSpan);
    }

    let (range, replacement) = match occ.site {
        TextSite::JsxText => (span, format!("{{{}}}", reference)),
        TextSite::JsxAttribute => {
            let quoted = quoted_range(text, &span, &[b'"', b'\'']).ok_or(PlanError::UnsafeSite)?;
            if !text[..quoted.start].trim_end().ends_with('=') {
                return Err(PlanError::UnsafeSite);
            }
            (quoted, format!("{{{}}}", reference))
        }
        TextSite::Literal => {
            let quoted =
                quoted_range(text, &span, &[b'"', b'\'', b'`']).ok_or(PlanError::UnsafeSite)?;
            if text.as_bytes()[quoted.start] == b'`' && occ.raw_text.contains("${") {
                return Err(PlanError::UnsafeSite);
            }
            (quoted, reference.to_string())
        }
        TextSite::Unknown => return Err(PlanError::UnsafeSite),
    };

    let expected = text[range.clone()].to_string();
    Ok(PlannedEdit {
        range,
        replacement,
        expected,
        index,
    })
}

/// `span` widened by one matching quote on each side.
fn quoted_range(text: &str, span: &Range<usize>, quotes: &[u8]) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    if span.start == 0 || span.end >= bytes.len() {
        return None;
    }
    let (open, close) = (bytes[span.start - 1], bytes[span.end]);
    if open != close || !quotes.contains(&open) {
        return None;
    }
    // An escaped closing quote means the span stops inside the literal
    if span.end > span.start && bytes[span.end - 1] == b'\\' {
        return None;
    }
    Some(span.start - 1..span.end + 1)
}

/// Apply edits in descending start order.
///
/// An edit reaching into a range that was already replaced is dropped,
/// so the rightmost of two overlapping edits wins.
pub fn apply_edits(text: &str, edits: &[PlannedEdit]) -> RewriteOutcome {
    let mut order: Vec<&PlannedEdit> = edits.iter().collect();
    order.sort_by(|a, b| {
        b.range
            .start
            .cmp(&a.range.start)
            .then(b.range.end.cmp(&a.range.end))
    });

    let mut out = text.to_string();
    let mut boundary = text.len();
    let mut applied = Vec::new();
    let mut dropped = Vec::new();

    for edit in order {
        if edit.range.end > boundary {
            dropped.push(DroppedEdit {
                index: edit.index,
                reason: DropReason::Overlap,
            });
            continue;
        }
        if out.get(edit.range.clone()) != Some(edit.expected.as_str()) {
            dropped.push(DroppedEdit {
                index: edit.index,
                reason: DropReason::StaleSpan,
            });
            continue;
        }
        out.replace_range(edit.range.clone(), &edit.replacement);
        boundary = edit.range.start;
        applied.push(edit.index);
    }

    RewriteOutcome {
        text: out,
        applied,
        dropped,
    }
}
