//! Location extraction from free-form toolchain output.
//!
//! The toolchain has no machine-readable diagnostics, so locations are pulled
//! out of its error text by an ordered chain of grammars. The first grammar
//! that matches wins:
//!
//! 1. [`LocatorKind::SourcePath`] - `<path>.<ext>:<line>:<col>` with an optional
//!    trailing colon. Scanned line by line; only the first matching line is
//!    trusted because later output may quote source fragments that happen to
//!    look like locators.
//! 2. [`LocatorKind::KeyValue`] - `line=<N>` and `column=<N>` anywhere in the
//!    text, as printed by reader (tokenization) errors.
//! 3. [`LocatorKind::Terse`] - `<anything>:<line>:<col>:` without a known
//!    extension, as printed by nested syntax-checking passes.
//!
//! Every grammar reports lines and columns as printed, and all of them are
//! treated as 1-indexed. Conversion to offsets belongs to [`crate::offsets`].

use std::ops::Range;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::diagnostics::{BridgeError, BridgeResult};

/// Source-file extension of the Forge toolchain.
pub const DEFAULT_EXTENSION: &str = "frg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocatorKind {
    SourcePath,
    KeyValue,
    Terse,
}

/// A locator pulled out of toolchain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationMatch {
    /// 1-indexed line.
    pub line: u32,
    /// 1-indexed column.
    pub column: u32,
    /// Trailing path component of the file named by the locator, if any.
    pub file: Option<String>,
    pub kind: LocatorKind,
    /// Byte span of the locator inside the scanned text.
    pub span: Range<usize>,
}

#[derive(Debug, Clone)]
enum Grammar {
    SourcePath(Regex),
    KeyValue { line: Regex, column: Regex },
    Terse(Regex),
}

impl Grammar {
    fn kind(&self) -> LocatorKind {
        match self {
            Grammar::SourcePath(_) => LocatorKind::SourcePath,
            Grammar::KeyValue { .. } => LocatorKind::KeyValue,
            Grammar::Terse(_) => LocatorKind::Terse,
        }
    }

    fn find(&self, text: &str) -> Option<LocationMatch> {
        match self {
            Grammar::SourcePath(pattern) => {
                let mut line_offset = 0;
                for line in text.split(['\n', '\r']) {
                    if let Some(found) = source_path_in_line(pattern, line) {
                        return Some(found.shifted(line_offset));
                    }
                    line_offset += line.len() + 1;
                }
                None
            }
            Grammar::KeyValue { line, column } => {
                let line_caps = line.captures(text)?;
                let column_caps = column.captures(text)?;
                let line_match = line_caps.get(0)?;
                let column_match = column_caps.get(0)?;
                Some(LocationMatch {
                    line: parse_number(&line_caps, 1)?,
                    column: parse_number(&column_caps, 1)?,
                    file: None,
                    kind: LocatorKind::KeyValue,
                    span: line_match.start().min(column_match.start())
                        ..line_match.end().max(column_match.end()),
                })
            }
            Grammar::Terse(pattern) => {
                let caps = pattern.captures(text)?;
                Some(LocationMatch {
                    line: parse_number(&caps, 1)?,
                    column: parse_number(&caps, 2)?,
                    file: None,
                    kind: LocatorKind::Terse,
                    span: caps.get(0)?.range(),
                })
            }
        }
    }
}

impl LocationMatch {
    fn shifted(mut self, by: usize) -> Self {
        self.span = self.span.start + by..self.span.end + by;
        self
    }
}

fn parse_number(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

fn source_path_in_line(pattern: &Regex, line: &str) -> Option<LocationMatch> {
    let caps = pattern.captures(line)?;
    Some(LocationMatch {
        line: parse_number(&caps, 2)?,
        column: parse_number(&caps, 3)?,
        file: Some(caps.get(1)?.as_str().to_string()),
        kind: LocatorKind::SourcePath,
        span: caps.get(0)?.range(),
    })
}

/// Ordered grammar chain for one source extension.
#[derive(Debug, Clone)]
pub struct LocatorChain {
    extension: String,
    grammars: Vec<Grammar>,
}

impl LocatorChain {
    /// Build the chain for files ending in `.{extension}`.
    pub fn new(extension: &str) -> BridgeResult<Self> {
        Ok(Self::build(extension)?)
    }

    fn build(extension: &str) -> Result<Self, regex::Error> {
        // Leading separators are consumed but not captured; file names are
        // assumed to contain no whitespace.
        let source_path = Regex::new(&format!(
            r"[\\/]*?([^\\/\n\s]*\.{}):(\d+):(\d+):?",
            regex::escape(extension)
        ))?;
        let grammars = vec![
            Grammar::SourcePath(source_path),
            Grammar::KeyValue {
                line: Regex::new(r"line=(\d+)")?,
                column: Regex::new(r"column=(\d+)")?,
            },
            Grammar::Terse(Regex::new(r"[^\s:]*:(\d+):(\d+):")?),
        ];
        Ok(Self {
            extension: extension.to_string(),
            grammars,
        })
    }

    /// Shared chain for the default `.frg` extension.
    pub fn forge() -> BridgeResult<&'static LocatorChain> {
        static CHAIN: OnceLock<Result<LocatorChain, regex::Error>> = OnceLock::new();
        CHAIN
            .get_or_init(|| LocatorChain::build(DEFAULT_EXTENSION))
            .as_ref()
            .map_err(|e| BridgeError::Pattern(e.clone()))
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Run the full chain over `text`, stopping at the first grammar that
    /// produces a location.
    pub fn locate(&self, text: &str) -> Option<LocationMatch> {
        self.grammars.iter().find_map(|grammar| {
            let found = grammar.find(text);
            if let Some(ref location) = found {
                tracing::trace!(kind = ?grammar.kind(), line = location.line, column = location.column, "locator matched");
            }
            found
        })
    }

    /// Apply only the source-path grammar. The first matching line wins.
    pub fn locate_source_path(&self, text: &str) -> Option<LocationMatch> {
        self.grammars
            .iter()
            .find(|grammar| grammar.kind() == LocatorKind::SourcePath)?
            .find(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chain() -> &'static LocatorChain {
        LocatorChain::forge().unwrap()
    }

    #[test]
    fn test_shared_chain_is_built_once() {
        let first = LocatorChain::forge().unwrap();
        let second = LocatorChain::forge().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.extension(), "frg");
    }

    #[test]
    fn test_source_path_with_prefix_and_message() {
        let found = chain()
            .locate("error: foo.frg:4:9: unbound identifier")
            .expect("locator should match");
        assert_eq!(found.line, 4);
        assert_eq!(found.column, 9);
        assert_eq!(found.file.as_deref(), Some("foo.frg"));
        assert_eq!(found.kind, LocatorKind::SourcePath);
    }

    #[test]
    fn test_source_path_strips_directories() {
        let text = "/home/student/hw1/model.frg:12:3: expected a sig";
        let found = chain().locate(text).unwrap();
        assert_eq!(found.file.as_deref(), Some("model.frg"));
        assert_eq!((found.line, found.column), (12, 3));
        assert_eq!(&text[found.span.clone()], "/model.frg:12:3:");
    }

    #[test]
    fn test_source_path_windows_separators() {
        let found = chain()
            .locate(r"C:\Users\me\hw\model.frg:2:14 bad syntax")
            .unwrap();
        assert_eq!(found.file.as_deref(), Some("model.frg"));
        assert_eq!((found.line, found.column), (2, 14));
    }

    #[test]
    fn test_source_path_trailing_colon_optional() {
        let found = chain().locate("model.frg:5:1").unwrap();
        assert_eq!((found.line, found.column), (5, 1));
    }

    #[test]
    fn test_only_first_matching_line_is_honored() {
        let text = "context...\nfirst.frg:3:4: boom\nsecond.frg:8:9: also boom\n";
        let found = chain().locate(text).unwrap();
        assert_eq!(found.file.as_deref(), Some("first.frg"));
        assert_eq!((found.line, found.column), (3, 4));
        assert_eq!(&text[found.span.clone()], "first.frg:3:4:");
    }

    #[test]
    fn test_carriage_returns_split_lines() {
        let text = "noise\r\nlater.frg:6:2: oops";
        let found = chain().locate(text).unwrap();
        assert_eq!(&text[found.span.clone()], "later.frg:6:2:");
    }

    #[test]
    fn test_key_value_fallback() {
        let text = "read-syntax: expected a `)` to close `(`\n  line=7\n  column=2\n  span=1";
        let found = chain().locate(text).unwrap();
        assert_eq!(found.kind, LocatorKind::KeyValue);
        assert_eq!((found.line, found.column), (7, 2));
        assert_eq!(found.file, None);
    }

    #[test]
    fn test_key_value_requires_both_keys() {
        assert!(chain().locate("only line=3 here").is_none());
    }

    #[test]
    fn test_terse_fallback() {
        let found = chain()
            .locate("forge/lang/expander.rkt:31:4: bad syntax")
            .unwrap();
        assert_eq!(found.kind, LocatorKind::Terse);
        assert_eq!((found.line, found.column), (31, 4));
        assert_eq!(found.file, None);
    }

    #[test]
    fn test_source_path_takes_precedence_over_fallbacks() {
        let text = "x.rkt:1:1: inner\nline=9 column=9\nmodel.frg:2:5: outer";
        let found = chain().locate(text).unwrap();
        assert_eq!(found.kind, LocatorKind::SourcePath);
        assert_eq!((found.line, found.column), (2, 5));
    }

    #[test]
    fn test_key_value_takes_precedence_over_terse() {
        let text = "x.rkt:1:1: inner\nline=9 column=3";
        let found = chain().locate(text).unwrap();
        assert_eq!(found.kind, LocatorKind::KeyValue);
        assert_eq!((found.line, found.column), (9, 3));
    }

    #[test]
    fn test_no_location() {
        assert!(chain().locate("contract violation\n  expected: list?").is_none());
        assert!(chain().locate("").is_none());
        assert!(chain().locate("\n").is_none());
    }

    #[test]
    fn test_overflowing_numbers_do_not_match() {
        assert!(
            chain()
                .locate_source_path("a.frg:99999999999999:1:")
                .is_none()
        );
    }

    #[test]
    fn test_custom_extension() {
        let chain = LocatorChain::new("rkt").unwrap();
        let found = chain.locate_source_path("main.rkt:10:2: nope").unwrap();
        assert_eq!(found.file.as_deref(), Some("main.rkt"));
        assert!(chain.locate_source_path("main.frg:10:2:").is_none());
        assert_eq!(chain.extension(), "rkt");
    }

    #[test]
    fn test_extension_is_escaped() {
        let chain = LocatorChain::new("f.g").unwrap();
        assert!(chain.locate_source_path("a.fxg:1:1:").is_none());
        assert!(chain.locate_source_path("a.f.g:1:1:").is_some());
    }

    proptest! {
        #[test]
        fn prop_first_source_path_line_wins(
            name in "[a-zA-Z_][a-zA-Z0-9_-]{0,12}",
            line in 1u32..100_000,
            column in 1u32..10_000,
            trailing in "[ -~]{0,40}",
            later_line in 1u32..100_000,
        ) {
            let text = format!("{name}.frg:{line}:{column}: {trailing}\nother.frg:{later_line}:1:\n");
            let found = chain().locate(&text).unwrap();
            prop_assert_eq!(found.kind, LocatorKind::SourcePath);
            prop_assert_eq!(found.line, line);
            prop_assert_eq!(found.column, column);
            let expected_file = format!("{name}.frg");
            prop_assert_eq!(found.file.as_deref(), Some(expected_file.as_str()));
        }
    }
}
