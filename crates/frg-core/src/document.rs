//! Immutable document snapshots.
//!
//! The editor owns the live buffer; a [`TextDocument`] is the full text it
//! handed over for one open/change event, plus the identity used to key slots
//! and diagnostics.

use serde::{Deserialize, Serialize};

use crate::offsets::OffsetRange;

/// Editor position: 0-indexed line, character in UTF-16 code units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextPosition {
    pub line: u32,
    pub character: u32,
}

impl TextPosition {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: TextPosition,
    pub end: TextPosition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument<K> {
    id: K,
    version: i32,
    text: String,
    /// Char offset at which each line begins.
    line_starts: Vec<usize>,
}

impl<K> TextDocument<K> {
    pub fn new(id: K, version: i32, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        for (offset, ch) in text.chars().enumerate() {
            if ch == '\n' {
                line_starts.push(offset + 1);
            }
        }
        Self {
            id,
            version,
            text,
            line_starts,
        }
    }

    pub fn id(&self) -> &K {
        &self.id
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Convert a char offset to an editor position. Offsets past the end of
    /// the text clamp to the end.
    pub fn position_at(&self, offset: usize) -> TextPosition {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_at) => insert_at - 1,
        };
        let line_start = self.line_starts[line];
        let character: usize = self
            .text
            .chars()
            .skip(line_start)
            .take(offset - line_start)
            .map(char::len_utf16)
            .sum();
        TextPosition::new(line as u32, character as u32)
    }

    pub fn range_of(&self, offsets: OffsetRange) -> TextRange {
        TextRange {
            start: self.position_at(offsets.start),
            end: self.position_at(offsets.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> TextDocument<&'static str> {
        TextDocument::new("file:///test.frg", 1, text)
    }

    #[test]
    fn test_position_at_start() {
        assert_eq!(doc("abc").position_at(0), TextPosition::new(0, 0));
    }

    #[test]
    fn test_position_at_second_line() {
        let d = doc("ab\ncde\n");
        assert_eq!(d.position_at(3), TextPosition::new(1, 0));
        assert_eq!(d.position_at(5), TextPosition::new(1, 2));
    }

    #[test]
    fn test_position_at_newline_stays_on_line() {
        let d = doc("ab\ncd");
        assert_eq!(d.position_at(2), TextPosition::new(0, 2));
    }

    #[test]
    fn test_position_past_end_clamps() {
        let d = doc("ab\ncd");
        assert_eq!(d.position_at(99), TextPosition::new(1, 2));
    }

    #[test]
    fn test_position_after_trailing_newline() {
        let d = doc("ab\n");
        assert_eq!(d.position_at(3), TextPosition::new(1, 0));
    }

    #[test]
    fn test_position_counts_utf16_units() {
        // U+1D11E (musical symbol) is two UTF-16 code units.
        let d = doc("a\u{1D11E}b");
        assert_eq!(d.position_at(2), TextPosition::new(0, 3));
    }

    #[test]
    fn test_range_of() {
        let d = doc("one\ntwo\n");
        let range = d.range_of(OffsetRange::new(5, 7));
        assert_eq!(range.start, TextPosition::new(1, 1));
        assert_eq!(range.end, TextPosition::new(1, 3));
    }

    #[test]
    fn test_accessors() {
        let d = TextDocument::new(7u32, 3, "x");
        assert_eq!(*d.id(), 7);
        assert_eq!(d.version(), 3);
        assert_eq!(d.text(), "x");
    }
}
