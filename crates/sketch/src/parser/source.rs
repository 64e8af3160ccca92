//! Shared source text with line lookup.
//!
//! `SourceCode` wraps the script in an `Arc` so function values created by the
//! interpreter can hand out their own source text without copying the whole
//! script, and so syntax errors can be mapped back to 1-based line/column
//! positions.

use super::Span;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct SourceCode {
    text: Arc<str>,
    line_starts: Arc<[usize]>,
}

impl SourceCode {
    pub fn new(text: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(index, _)| index + 1))
            .collect::<Vec<_>>();
        Self {
            text: Arc::from(text),
            line_starts: Arc::from(line_starts),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of physical lines, counting the line after a trailing newline.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 1-based line and column (in characters) of a byte offset.
    pub fn line_column(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        let line_start = self.line_starts[line_index];
        let column = self
            .text
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(0);
        (line_index + 1, column + 1)
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.line_column(offset).0
    }

    /// Text covered by a span, empty when the span is out of bounds.
    pub fn slice(&self, span: Span) -> &str {
        self.text.get(span.into_range()).unwrap_or_default()
    }
}

impl fmt::Debug for SourceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCode")
            .field("len", &self.text.len())
            .field("lines", &self.line_starts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_count_matches_split() {
        for text in ["", "a", "a\n", "a\nb\nc", "\n\n"] {
            assert_eq!(SourceCode::new(text).line_count(), text.split('\n').count());
        }
    }

    #[test]
    fn line_column_is_one_based() {
        let source = SourceCode::new("let a = 1\nconst bé = 2\n");
        assert_eq!(source.line_column(0), (1, 1));
        assert_eq!(source.line_column(4), (1, 5));
        assert_eq!(source.line_column(10), (2, 1));
        assert_eq!(source.line_column(19), (2, 9));
        assert_eq!(source.line_column(source.len()), (3, 1));
    }

    #[test]
    fn slice_by_span() {
        let source = SourceCode::new("const answer = 42");
        assert_eq!(source.slice(Span::from(6..12)), "answer");
        assert_eq!(source.slice(Span::from(40..50)), "");
    }
}
