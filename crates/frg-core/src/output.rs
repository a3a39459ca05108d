//! Output sink for run narration and relayed toolchain output.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Line the runner prints while the visualizer is up. Matched exactly.
pub const RUNNER_SENTINEL: &str = "Sterling running. Hit enter to stop service.";
pub const RUNNER_SENTINEL_REPLACEMENT: &str = "Sterling running. Hit Stop to stop service.";

pub const TERMINATING_MESSAGE: &str = "Terminating the current Forge process ...";
pub const EXITED_MESSAGE: &str = "Forge exited.";
pub const FINISHED_MESSAGE: &str = "Finished running.";
pub const NOT_SOURCE_FILE_MESSAGE: &str =
    "Click on the Forge file first before hitting the run button :)";

pub fn running_message(path: &str) -> String {
    format!("Running file \"{path}\" ...")
}

/// Rewrite the runner sentinel into the editor-facing phrase. Plain substring
/// replacement; any other text passes through unchanged.
pub fn rewrite_runner_line(line: &str) -> String {
    line.replace(RUNNER_SENTINEL, RUNNER_SENTINEL_REPLACEMENT)
}

/// Opaque output surface owned by the editor or terminal.
pub trait OutputSink: Send + Sync {
    fn append_line(&self, line: &str);
    fn clear(&self);
    fn show(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Append(String),
    Clear,
    Show,
}

/// Sink that remembers every event.
#[derive(Debug, Default)]
pub struct BufferedOutput {
    events: Mutex<Vec<OutputEvent>>,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OutputEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.lock().clone()
    }

    /// Appended lines since the last clear.
    pub fn lines(&self) -> Vec<String> {
        let events = self.lock();
        let since_clear = events
            .iter()
            .rposition(|event| *event == OutputEvent::Clear)
            .map_or(0, |index| index + 1);
        events[since_clear..]
            .iter()
            .filter_map(|event| match event {
                OutputEvent::Append(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }
}

impl OutputSink for BufferedOutput {
    fn append_line(&self, line: &str) {
        self.lock().push(OutputEvent::Append(line.to_string()));
    }

    fn clear(&self) {
        self.lock().push(OutputEvent::Clear);
    }

    fn show(&self) {
        self.lock().push(OutputEvent::Show);
    }
}
