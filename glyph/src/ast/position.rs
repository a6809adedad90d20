use std::ops::Range;

use serde::Serialize;

/// A point in source text. Lines and columns are 1-based; `offset` is a byte offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SourcePoint {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// A span of source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SourceRange {
    pub start: SourcePoint,
    pub end: SourcePoint,
}

impl SourceRange {
    /// Byte range, for codespan labels.
    pub fn byte_range(&self) -> Range<usize> {
        self.start.offset..self.end.offset
    }
}

/// Maps byte offsets to line/column points.
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        LineIndex {
            source,
            line_starts,
        }
    }

    pub fn point(&self, offset: usize) -> SourcePoint {
        let offset = offset.min(self.source.len());
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        // Columns count characters, not bytes.
        let column = self
            .source
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - line_start)
            + 1;
        SourcePoint {
            line,
            column,
            offset,
        }
    }

    pub fn range(&self, range: Range<usize>) -> SourceRange {
        SourceRange {
            start: self.point(range.start),
            end: self.point(range.end),
        }
    }
}
