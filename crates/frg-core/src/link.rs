//! Terminal link resolution.
//!
//! Turns locators printed in terminal output into navigable links. Only the
//! source-path grammar is consulted, and only locators naming the active
//! document's file are offered, since terminal text routinely mentions other
//! files that happen to share the extension.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::TextPosition;
use crate::locator::LocatorChain;
use crate::run::Navigator;

/// A clickable span in one line of terminal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalLink {
    /// Start of the locator in the line, in UTF-16 code units.
    pub start_index: usize,
    /// Length of the locator, in UTF-16 code units.
    pub length: usize,
    pub tooltip: String,
    /// Path of the active document the link points into.
    pub file_path: String,
    /// 0-indexed line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 0-indexed column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl TerminalLink {
    /// Cursor target on activation. `None` opens without repositioning.
    pub fn position(&self) -> Option<TextPosition> {
        match (self.line, self.column) {
            (Some(line), Some(column)) => Some(TextPosition::new(line, column)),
            _ => None,
        }
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Resolve at most one link in `line` pointing into `active_path`.
pub fn resolve_link(chain: &LocatorChain, line: &str, active_path: &Path) -> Option<TerminalLink> {
    let found = chain.locate_source_path(line)?;
    let active = active_path.to_string_lossy();
    if found.file.as_deref() != Some(file_name(&active)) {
        tracing::trace!(file = ?found.file, active = %active, "locator names another file");
        return None;
    }

    let line_index = found.line.saturating_sub(1);
    let column_index = found.column.saturating_sub(1);
    Some(TerminalLink {
        start_index: utf16_len(&line[..found.span.start]),
        length: utf16_len(&line[found.span.clone()]),
        tooltip: format!("{active}:{}:{}", found.line, found.column),
        file_path: active.into_owned(),
        line: Some(line_index),
        column: Some(column_index),
    })
}

/// Every link in a block of terminal text, one per line at most.
pub fn resolve_links(chain: &LocatorChain, text: &str, active_path: &Path) -> Vec<TerminalLink> {
    text.lines()
        .filter_map(|line| resolve_link(chain, line, active_path))
        .collect()
}

/// Open the link's document, with the cursor on the locator when it has one.
pub fn activate(link: &TerminalLink, navigator: &dyn Navigator<PathBuf>) {
    navigator.open(&PathBuf::from(&link.file_path), link.position());
}
