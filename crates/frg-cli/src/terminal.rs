//! Terminal stand-ins for the editor collaborators of a run session.

use colored::Colorize;
use frg_core::document::TextPosition;
use frg_core::output::{EXITED_MESSAGE, FINISHED_MESSAGE, TERMINATING_MESSAGE};
use frg_core::{Navigator, OutputSink};

/// Prints run output to stdout. Narration lines are dimmed.
#[derive(Debug, Default)]
pub struct TerminalOutput;

fn is_narration(line: &str) -> bool {
    line == TERMINATING_MESSAGE
        || line == EXITED_MESSAGE
        || line == FINISHED_MESSAGE
        || (line.starts_with("Running file \"") && line.ends_with("\" ..."))
}

impl OutputSink for TerminalOutput {
    fn append_line(&self, line: &str) {
        if is_narration(line) {
            println!("{}", line.dimmed());
        } else {
            println!("{line}");
        }
    }

    // A terminal has no output panel to clear or reveal.
    fn clear(&self) {}

    fn show(&self) {}
}

/// Reports navigation targets on stderr, compiler style.
#[derive(Debug, Default)]
pub struct TerminalNavigator;

impl Navigator<String> for TerminalNavigator {
    fn open(&self, id: &String, position: Option<TextPosition>) {
        match position {
            Some(position) => eprintln!(
                "  {} {}:{}:{}",
                "-->".blue().bold(),
                id,
                position.line + 1,
                position.character + 1
            ),
            None => tracing::debug!(file = %id, "run finished without a location"),
        }
    }
}
