//! Maps frg-core diagnostics to LSP diagnostics.

use frg_core::{Diagnostic, Severity, TextRange};
use tower_lsp::lsp_types::{
    Diagnostic as LspDiagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, Location,
    Position, Range, Url,
};

fn to_lsp_severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

fn to_lsp_range(range: &TextRange) -> Range {
    Range {
        start: Position::new(range.start.line, range.start.character),
        end: Position::new(range.end.line, range.end.character),
    }
}

/// Convert a frg-core diagnostic to an LSP diagnostic.
///
/// The range is already in editor coordinates. The message is the raw
/// toolchain text and is passed through untouched.
pub fn to_lsp_diagnostic(diag: &Diagnostic) -> LspDiagnostic {
    LspDiagnostic {
        range: to_lsp_range(&diag.range),
        severity: Some(to_lsp_severity(diag.severity)),
        source: Some(diag.source.as_str().to_string()),
        message: diag.message.clone(),
        ..Default::default()
    }
}

/// Convert multiple diagnostics.
pub fn to_lsp_diagnostics(diagnostics: &[Diagnostic]) -> Vec<LspDiagnostic> {
    diagnostics.iter().map(to_lsp_diagnostic).collect()
}

/// Repeat the toolchain text as related information at the same range.
/// Only for clients advertising `publishDiagnostics.relatedInformation`.
pub fn attach_related_information(diagnostic: &mut LspDiagnostic, uri: &Url) {
    diagnostic.related_information = Some(vec![DiagnosticRelatedInformation {
        location: Location {
            uri: uri.clone(),
            range: diagnostic.range,
        },
        message: diagnostic.message.clone(),
    }]);
}
