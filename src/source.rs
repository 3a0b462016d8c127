use std::ops::Range;
use std::path::Path;

use crate::error::MigrateError;
use crate::fs::FileSystem;

/// Bytes sniffed for NUL when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// A loaded source file with byte offset <-> line/column conversion.
///
/// Lines and columns are 1-based; columns count characters, not bytes.
#[derive(Debug, Clone)]
pub struct SourceText {
    path: String,
    text: String,
    line_starts: Vec<usize>,
}

impl SourceText {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            path: path.into(),
            text,
            line_starts,
        }
    }

    /// Read a file through `fs`, rejecting binary content.
    pub fn read<F: FileSystem>(fs: &F, path: &Path) -> Result<Self, MigrateError> {
        let display = path.display().to_string();
        let text = fs
            .read_to_string(path)
            .map_err(|e| MigrateError::io(&display, e))?;
        let sniff = &text.as_bytes()[..text.len().min(BINARY_SNIFF_LEN)];
        if sniff.contains(&0) {
            return Err(MigrateError::io(display, "binary content"));
        }
        Ok(Self::new(display, text))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// `.ts`, `.mts` and `.cts` files cannot contain JSX.
    pub fn allows_jsx(&self) -> bool {
        let ext = Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        !matches!(ext.as_str(), "ts" | "mts" | "cts")
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of a 1-based line, without its trailing newline.
    pub fn line_range(&self, line: usize) -> Option<Range<usize>> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let mut end = self
            .line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        if end > start && self.text.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        Some(start..end)
    }

    /// Iterate `(line_number, line_start_offset, line_text)`.
    pub fn lines(&self) -> impl Iterator<Item = (usize, usize, &str)> + '_ {
        (1..=self.line_count()).filter_map(move |line| {
            let range = self.line_range(line)?;
            Some((line, range.start, &self.text[range]))
        })
    }

    /// 1-based `(line, column)` of a byte offset.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let start = self.line_starts[line_idx];
        let column = self
            .text
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - start);
        (line_idx + 1, column + 1)
    }

    /// Byte offset of a 1-based `(line, column)`, if it exists.
    pub fn offset(&self, line: usize, column: usize) -> Option<usize> {
        let range = self.line_range(line)?;
        let line_text = &self.text[range.clone()];
        let col_idx = column.checked_sub(1)?;
        if col_idx == line_text.chars().count() {
            return Some(range.end);
        }
        line_text
            .char_indices()
            .nth(col_idx)
            .map(|(i, _)| range.start + i)
    }

    /// Slice by byte span, `None` when out of bounds or not on char boundaries.
    pub fn slice(&self, span: &Range<usize>) -> Option<&str> {
        self.text.get(span.clone())
    }
}
