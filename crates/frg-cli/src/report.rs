//! Rendering of check results and terminal links.

use colored::Colorize;
use frg_core::{Diagnostic, Severity, TerminalLink};
use serde::Serialize;

/// A diagnostic as printed by `frg check`, with 1-indexed coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reported<'a> {
    pub file: &'a str,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub source: &'static str,
    pub message: &'a str,
}

impl<'a> Reported<'a> {
    pub fn new(file: &'a str, diagnostic: &'a Diagnostic) -> Self {
        Self {
            file,
            line: diagnostic.range.start.line + 1,
            column: diagnostic.range.start.character + 1,
            severity: diagnostic.severity,
            source: diagnostic.source.as_str(),
            message: &diagnostic.message,
        }
    }
}

fn colored_severity(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Error => severity.as_str().red().bold(),
        Severity::Warning => severity.as_str().yellow().bold(),
        Severity::Information | Severity::Hint => severity.as_str().cyan(),
    }
}

/// `path:line:col: severity: message`, message kept verbatim.
pub fn format_text(reported: &Reported<'_>) -> String {
    format!(
        "{}:{}:{}: {}: {} {}",
        reported.file.bold(),
        reported.line,
        reported.column,
        colored_severity(reported.severity),
        reported.message,
        format!("[{}]", reported.source).dimmed()
    )
}

pub fn format_json(reported: &[Reported<'_>]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reported)
}

/// `<input line>: <tooltip>` for a link found on 1-indexed input line `index`.
pub fn format_link(index: usize, link: &TerminalLink) -> String {
    format!("{index}: {}", link.tooltip.underline())
}

#[cfg(test)]
mod tests {
    use super::*;
    use frg_core::publish::resolve_diagnostic;
    use frg_core::{Channel, DiagnosticSource, LocatorChain, TextDocument};

    fn located() -> Diagnostic {
        let document = TextDocument::new("model.frg".to_string(), 0, "#lang forge\nsig A {}\n");
        let stderr = "model.frg:2:5: expected a field";
        resolve_diagnostic(
            &document,
            LocatorChain::forge().unwrap().locate(stderr).as_ref(),
            stderr,
            Severity::Error,
            DiagnosticSource::SyntaxChecker,
            Channel::Check,
        )
    }

    #[test]
    fn test_text_format() {
        colored::control::set_override(false);
        let diagnostic = located();
        let line = format_text(&Reported::new("hw/model.frg", &diagnostic));
        assert_eq!(
            line,
            "hw/model.frg:2:5: error: model.frg:2:5: expected a field [frg-syntax]"
        );
    }

    #[test]
    fn test_json_format() {
        let diagnostic = located();
        let json = format_json(&[Reported::new("model.frg", &diagnostic)]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["line"], 2);
        assert_eq!(value[0]["column"], 5);
        assert_eq!(value[0]["severity"], "error");
        assert_eq!(value[0]["source"], "frg-syntax");
    }
}
