//! Mapping of toolchain line/column locators onto document offsets.
//!
//! Offsets are counted in Unicode scalar values (chars) from the start of the
//! document. Lines and columns coming in are 1-indexed, exactly as the
//! toolchain prints them; the conversion to 0-indexed offsets happens here and
//! nowhere else.

use serde::{Deserialize, Serialize};

/// Half-open char-offset span `[start, end)` inside a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    /// Zero-length span at offset 0, used when no precise location is known.
    pub const DOCUMENT_START: OffsetRange = OffsetRange { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Widen an empty located span to a single character, bounded by the
    /// document length.
    fn at_least_one_char(start: usize, end: usize, total: usize) -> Self {
        if end > start {
            Self { start, end }
        } else {
            Self {
                start,
                end: (start + 1).min(total),
            }
        }
    }
}

/// Resolve a 1-indexed `(line, column)` against `text`.
///
/// The span runs from the column to the end of the line (terminator excluded)
/// because the toolchain never reports a token length. A line of `0` means "no
/// location" and yields [`OffsetRange::DOCUMENT_START`]. A line past the end of
/// the document clamps to the last character. A column of `0` is treated as
/// column `1`; a column past the end of its line clamps to the terminator.
pub fn offset_range(text: &str, line: u32, column: u32) -> OffsetRange {
    if line == 0 {
        return OffsetRange::DOCUMENT_START;
    }

    let total = text.chars().count();
    let target = line as usize;
    let mut line_start = 0usize;

    for (index, segment) in text.split_inclusive('\n').enumerate() {
        let segment_len = segment.chars().count();
        if index + 1 == target {
            let body_len = line_body(segment).chars().count();
            let end = line_start + body_len;
            let start = line_start + (column.saturating_sub(1) as usize).min(body_len);
            return OffsetRange::at_least_one_char(start, end, total);
        }
        line_start += segment_len;
    }

    let last = total.saturating_sub(1);
    OffsetRange::at_least_one_char(last, last, total)
}

/// Number of lines as the offset mapper counts them.
pub fn line_count(text: &str) -> usize {
    text.split_inclusive('\n').count()
}

fn line_body(segment: &str) -> &str {
    match segment.strip_suffix('\n') {
        Some(body) => body.strip_suffix('\r').unwrap_or(body),
        None => segment,
    }
}
