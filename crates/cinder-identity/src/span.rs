// span.rs
//
// Source location span for diagnostics.

/// Identifies the source file a span points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileId(u32);

impl FileId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Source location span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub file: FileId,
    pub start: usize,  // Byte offset
    pub end: usize,    // Byte offset (exclusive)
    pub line: u32,     // Start line (1-indexed)
    pub column: u32,   // Start column (1-indexed)
    pub end_line: u32, // End line (1-indexed)
    pub end_column: u32,
}

impl Span {
    /// Create a new span with explicit end position
    pub fn new_with_end(
        file: FileId,
        start: usize,
        end: usize,
        line: u32,
        column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Self {
        Self {
            file,
            start,
            end,
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// Create a new span, computing end position for single-line tokens
    pub fn new(file: FileId, start: usize, end: usize, line: u32, column: u32) -> Self {
        let length = end.saturating_sub(start);
        Self {
            file,
            start,
            end,
            line,
            column,
            end_line: line,
            end_column: column + length as u32,
        }
    }

    /// Span covering `self` through `other`. Both must come from the same file.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(self.file, other.file, "merging spans across files");
        Span {
            file: self.file,
            start: self.start,
            end: other.end,
            line: self.line,
            column: self.column,
            end_line: other.end_line,
            end_column: other.end_column,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        // miette uses (offset, length)
        (span.start, span.len()).into()
    }
}

impl From<&Span> for miette::SourceSpan {
    fn from(span: &Span) -> Self {
        (span.start, span.len()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_start_of_first_and_end_of_second() {
        let file = FileId::new(3);
        let a = Span::new(file, 4, 8, 1, 5);
        let b = Span::new(file, 20, 26, 2, 3);
        let merged = a.merge(b);
        assert_eq!(merged.start, 4);
        assert_eq!(merged.end, 26);
        assert_eq!(merged.line, 1);
        assert_eq!(merged.end_line, 2);
        assert_eq!(merged.file, file);
    }

    #[test]
    fn source_span_uses_offset_and_length() {
        let span = Span::new(FileId::default(), 10, 15, 1, 11);
        let source: miette::SourceSpan = span.into();
        assert_eq!(source.offset(), 10);
        assert_eq!(source.len(), 5);
    }
}
