//! Interactive run session.
//!
//! A run executes a saved source file in the single interactive slot and
//! relays its stdout to the output sink line by line. Stderr is buffered until
//! exit. On exit the session either reports the failure (output, run-channel
//! diagnostic, jump to the location) or announces a clean finish. Stopping a
//! run kills the process without any of the exit-time effects.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::config::BridgeConfig;
use crate::diagnostics::{BridgeError, BridgeResult, Channel, Diagnostic, DiagnosticSource, Severity};
use crate::document::{TextDocument, TextPosition};
use crate::locator::LocatorChain;
use crate::output::{
    EXITED_MESSAGE, FINISHED_MESSAGE, OutputSink, TERMINATING_MESSAGE, rewrite_runner_line,
    running_message,
};
use crate::publish::{Publisher, resolve_diagnostic};
use crate::supervisor::{ProcessExit, ProcessObserver, Slot, Supervisor};

/// Editor-side "open this document" collaborator.
pub trait Navigator<K>: Send + Sync {
    /// Open or focus the document, placing the cursor at `position` when one
    /// is given and leaving the view alone otherwise.
    fn open(&self, id: &K, position: Option<TextPosition>);
}

/// How a run ended on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub code: Option<i32>,
    /// The run-channel diagnostic, when the run wrote to stderr.
    pub diagnostic: Option<Diagnostic>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.diagnostic.is_none()
    }
}

struct ActiveRun<K> {
    run: u64,
    document: Arc<TextDocument<K>>,
}

type Current<K> = Arc<Mutex<Option<ActiveRun<K>>>>;

fn lock_current<K>(current: &Current<K>) -> MutexGuard<'_, Option<ActiveRun<K>>> {
    current.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RunSession<K> {
    supervisor: Supervisor<K>,
    publisher: Arc<Publisher<K>>,
    output: Arc<dyn OutputSink>,
    navigator: Arc<dyn Navigator<K>>,
    current: Current<K>,
    next_run: AtomicU64,
}

impl<K> RunSession<K>
where
    K: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static,
{
    pub fn new(
        supervisor: Supervisor<K>,
        publisher: Arc<Publisher<K>>,
        output: Arc<dyn OutputSink>,
        navigator: Arc<dyn Navigator<K>>,
    ) -> Self {
        Self {
            supervisor,
            publisher,
            output,
            navigator,
            current: Arc::new(Mutex::new(None)),
            next_run: AtomicU64::new(0),
        }
    }

    /// Run the file at `path`, whose editor contents are `document`.
    ///
    /// The receiver resolves when the run exits by itself. It is dropped
    /// unresolved when the run is stopped or replaced.
    pub fn start(
        &self,
        document: Arc<TextDocument<K>>,
        path: &Path,
        config: &BridgeConfig,
    ) -> BridgeResult<oneshot::Receiver<RunOutcome>> {
        if !config.is_source_path(path) {
            return Err(BridgeError::NotSourceFile {
                path: path.to_path_buf(),
                extension: config.source_extension.clone(),
            });
        }
        let chain = config.locator()?.into_owned();

        lock_current(&self.current).take();
        if self.supervisor.kill(&Slot::Interactive) {
            self.output.append_line(TERMINATING_MESSAGE);
        }

        self.output.clear();
        self.output.show();
        self.output
            .append_line(&running_message(&path.to_string_lossy()));

        let run = self.next_run.fetch_add(1, Ordering::Relaxed) + 1;
        let (done, finished) = oneshot::channel();
        let observer = RunObserver {
            run,
            document: Arc::clone(&document),
            chain,
            stderr: String::new(),
            publisher: Arc::clone(&self.publisher),
            output: Arc::clone(&self.output),
            navigator: Arc::clone(&self.navigator),
            current: Arc::clone(&self.current),
            done: Some(done),
        };

        *lock_current(&self.current) = Some(ActiveRun { run, document });
        let command = config.run_command(path);
        if let Err(err) = self.supervisor.spawn(Slot::Interactive, &command, observer) {
            lock_current(&self.current).take();
            return Err(err);
        }
        tracing::info!(path = %path.display(), "run started");
        Ok(finished)
    }

    /// Stop the live run. Returns `false` if nothing was running.
    pub fn stop(&self) -> bool {
        let active = lock_current(&self.current).take();
        if !self.supervisor.kill(&Slot::Interactive) {
            return false;
        }
        self.output.append_line(TERMINATING_MESSAGE);
        if let Some(active) = active {
            self.navigator.open(active.document.id(), None);
        }
        tracing::info!("run stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.supervisor.is_live(&Slot::Interactive)
    }

    /// Identity of the document being run, if any.
    pub fn active_document(&self) -> Option<K> {
        lock_current(&self.current)
            .as_ref()
            .map(|active| active.document.id().clone())
    }
}

struct RunObserver<K> {
    run: u64,
    document: Arc<TextDocument<K>>,
    chain: LocatorChain,
    stderr: String,
    publisher: Arc<Publisher<K>>,
    output: Arc<dyn OutputSink>,
    navigator: Arc<dyn Navigator<K>>,
    current: Current<K>,
    done: Option<oneshot::Sender<RunOutcome>>,
}

impl<K> RunObserver<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn finish(&mut self) -> Option<Diagnostic> {
        let id = self.document.id();
        if self.stderr.trim().is_empty() {
            self.publisher.clear_channel(Channel::Run, id);
            self.navigator.open(id, None);
            self.output.append_line(FINISHED_MESSAGE);
            return None;
        }

        let message = self.stderr.trim_end_matches(['\n', '\r']);
        self.output.append_line(message);
        let location = self.chain.locate_source_path(message);
        let diagnostic = resolve_diagnostic(
            &self.document,
            location.as_ref(),
            message,
            Severity::Error,
            DiagnosticSource::Runner,
            Channel::Run,
        );
        self.publisher
            .replace(Channel::Run, id, vec![diagnostic.clone()]);
        let position = match location {
            Some(_) => diagnostic.range.start,
            None => TextPosition::default(),
        };
        self.navigator.open(id, Some(position));
        self.output.append_line(EXITED_MESSAGE);
        Some(diagnostic)
    }
}

impl<K> ProcessObserver for RunObserver<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn on_stdout(&mut self, line: &str) {
        self.output.append_line(&rewrite_runner_line(line));
    }

    fn on_stderr(&mut self, line: &str) {
        self.stderr.push_str(line);
        self.stderr.push('\n');
    }

    fn on_exit(&mut self, exit: ProcessExit) {
        {
            let mut current = lock_current(&self.current);
            if current.as_ref().is_some_and(|active| active.run == self.run) {
                current.take();
            }
        }
        let diagnostic = self.finish();
        tracing::info!(code = ?exit.code, failed = diagnostic.is_some(), "run exited");
        if let Some(done) = self.done.take() {
            let _ = done.send(RunOutcome {
                code: exit.code,
                diagnostic,
            });
        }
    }
}
