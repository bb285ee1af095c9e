//! Byte-offset source spans.

use serde::Serialize;

/// A half-open byte range into one source file.
///
/// The path is the application-root-relative, slash-separated file path.
/// Spans order by `(path, start, end)`, which is what gives diagnostic
/// reports their deterministic ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    /// Application-root-relative file path.
    pub path: String,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(path: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            path: path.into(),
            start,
            end,
        }
    }

    /// A zero-length span at the start of a file.
    ///
    /// Used for diagnostics that point at a file as a whole, such as
    /// migration filename errors.
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(path, 0, 0)
    }

    /// The length of the span in bytes (at least 1 for rendering purposes).
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start).max(1)
    }

    /// Returns true if the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Merge two spans in the same file into one covering both.
    pub fn to(&self, other: &Span) -> Span {
        debug_assert_eq!(self.path, other.path);
        Span {
            path: self.path.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Compute the 1-based line and column of the span start within `source`.
    ///
    /// The column counts characters, not bytes, so it stays aligned with
    /// rendered text on lines containing multi-byte characters.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let upto = self.start.min(source.len());
        let before = &source[..upto];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |pos| pos + 1);
        let col = before[line_start..].chars().count() + 1;
        (line, col)
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}..{}", self.path, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_first_line() {
        let src = "hello world\n";
        let span = Span::new("a.qy", 6, 11);
        assert_eq!(span.line_col(src), (1, 7));
    }

    #[test]
    fn test_line_col_later_line() {
        let src = "a\nbb\nccc\n";
        let span = Span::new("a.qy", 5, 8);
        assert_eq!(span.line_col(src), (3, 1));
    }

    #[test]
    fn test_line_col_counts_characters_not_bytes() {
        // "é" is two bytes but one column.
        let src = "a é b\n";
        let span = Span::new("a.qy", 5, 6);
        assert_eq!(span.line_col(src), (1, 5));
    }

    #[test]
    fn test_merge_spans() {
        let a = Span::new("a.qy", 4, 8);
        let b = Span::new("a.qy", 10, 12);
        let merged = a.to(&b);
        assert_eq!((merged.start, merged.end), (4, 12));
    }

    #[test]
    fn test_ordering_by_path_then_offset() {
        let a = Span::new("a.qy", 10, 12);
        let b = Span::new("b.qy", 0, 1);
        let c = Span::new("a.qy", 2, 4);
        let mut spans = vec![a.clone(), b.clone(), c.clone()];
        spans.sort();
        assert_eq!(spans, vec![c, a, b]);
    }
}
