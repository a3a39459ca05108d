//! External process supervision.
//!
//! A [`Supervisor`] owns at most one live toolchain process per [`Slot`].
//! Spawning into an occupied slot terminates the previous process first, and
//! every stdout/stderr/exit callback re-checks that its process is still the
//! live one before it runs. Output from a superseded or killed process is
//! dropped without a trace beyond a debug log.
//!
//! Callbacks run on the driver task while the handle's gate is held, so once
//! [`Supervisor::kill`] returns no further callback of the killed process can
//! fire. Observers must not call back into the supervisor from a callback.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;

use crate::diagnostics::{BridgeError, BridgeResult};

/// How long to keep reading buffered output after the process has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Ownership unit for at most one live process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot<K> {
    /// One-shot validation of a single document.
    Document(K),
    /// The single interactive run session.
    Interactive,
}

/// Spawn counter. Generations are totally ordered per supervisor.
pub type Generation = u64;

/// Program plus argument array. Never run through a shell.
///
/// Stdin is a pipe held open until the process exits; the runner treats end
/// of input as a request to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Outcome classes for a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Clean,
    /// Generic failure. `None` when the process died from a signal.
    ToolError(Option<i32>),
    /// The designated syntax-error sentinel code.
    SyntaxError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn classify(&self, syntax_error_code: i32) -> ExitClass {
        match self.code {
            Some(0) => ExitClass::Clean,
            Some(code) if code == syntax_error_code => ExitClass::SyntaxError,
            other => ExitClass::ToolError(other),
        }
    }
}

/// Receives the events of one live process. Lines arrive without their
/// terminator.
pub trait ProcessObserver: Send + 'static {
    fn on_stdout(&mut self, _line: &str) {}
    fn on_stderr(&mut self, _line: &str) {}
    fn on_exit(&mut self, exit: ProcessExit);
}

/// Full output of a one-shot process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn exit(&self) -> ProcessExit {
        ProcessExit { code: self.code }
    }
}

struct Capture {
    output: CapturedOutput,
    done: Option<oneshot::Sender<CapturedOutput>>,
}

impl ProcessObserver for Capture {
    fn on_stdout(&mut self, line: &str) {
        self.output.stdout.push_str(line);
        self.output.stdout.push('\n');
    }

    fn on_stderr(&mut self, line: &str) {
        self.output.stderr.push_str(line);
        self.output.stderr.push('\n');
    }

    fn on_exit(&mut self, exit: ProcessExit) {
        self.output.code = exit.code;
        if let Some(done) = self.done.take() {
            let _ = done.send(std::mem::take(&mut self.output));
        }
    }
}

/// Liveness flag shared between the slot table and the driver task.
type Gate = Arc<Mutex<bool>>;

fn lock_gate(gate: &Gate) -> MutexGuard<'_, bool> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

struct LiveHandle {
    generation: Generation,
    gate: Gate,
    kill: Option<oneshot::Sender<()>>,
}

impl LiveHandle {
    /// Mark non-live, then signal the driver to kill. Waits for any callback
    /// already in progress.
    fn terminate(mut self) {
        *lock_gate(&self.gate) = false;
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

struct SlotTable<K> {
    next_generation: Generation,
    live: HashMap<Slot<K>, LiveHandle>,
}

pub struct Supervisor<K> {
    table: Arc<Mutex<SlotTable<K>>>,
}

impl<K> Clone for Supervisor<K> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<K> fmt::Debug for Supervisor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor").finish_non_exhaustive()
    }
}

impl<K> Default for Supervisor<K> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(SlotTable {
                next_generation: 0,
                live: HashMap::new(),
            })),
        }
    }
}

impl<K> Supervisor<K>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotTable<K>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start `command` in `slot`, terminating whatever was live there.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<O: ProcessObserver>(
        &self,
        slot: Slot<K>,
        command: &CommandSpec,
        observer: O,
    ) -> BridgeResult<Generation> {
        let (kill_tx, kill_rx) = oneshot::channel();
        let gate: Gate = Arc::new(Mutex::new(true));

        let (generation, previous) = {
            let mut table = self.lock();
            table.next_generation += 1;
            let generation = table.next_generation;
            let previous = table.live.insert(
                slot.clone(),
                LiveHandle {
                    generation,
                    gate: Arc::clone(&gate),
                    kill: Some(kill_tx),
                },
            );
            (generation, previous)
        };

        if let Some(previous) = previous {
            tracing::debug!(?slot, generation = previous.generation, "superseding live process");
            previous.terminate();
        }

        let mut child = match command.to_command().spawn() {
            Ok(child) => child,
            Err(source) => {
                self.retire(&slot, generation);
                return Err(BridgeError::Spawn {
                    command: command.to_string(),
                    source,
                });
            }
        };
        tracing::debug!(?slot, generation, pid = ?child.id(), command = %command, "spawned");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(|out| BufReader::new(out).lines());
        let stderr = child.stderr.take().map(|err| BufReader::new(err).lines());
        let driver = Driver {
            supervisor: self.clone(),
            slot,
            generation,
            gate,
            observer,
            _stdin: stdin,
        };
        tokio::spawn(driver.run(child, stdout, stderr, kill_rx));
        Ok(generation)
    }

    /// Spawn a one-shot process and wait for its full output.
    ///
    /// Resolves to `None` when the process was superseded or killed before it
    /// exited.
    pub async fn run_to_completion(
        &self,
        slot: Slot<K>,
        command: &CommandSpec,
    ) -> BridgeResult<Option<CapturedOutput>> {
        let finished = self.start_capture(slot, command)?;
        Ok(finished.await.ok())
    }

    /// Synchronous half of [`Supervisor::run_to_completion`]. The receiver
    /// errors when the process is superseded or killed before it exits.
    pub(crate) fn start_capture(
        &self,
        slot: Slot<K>,
        command: &CommandSpec,
    ) -> BridgeResult<oneshot::Receiver<CapturedOutput>> {
        let (done, finished) = oneshot::channel();
        let capture = Capture {
            output: CapturedOutput::default(),
            done: Some(done),
        };
        self.spawn(slot, command, capture)?;
        Ok(finished)
    }

    /// Kill the live process in `slot`. Returns `false` if nothing was live.
    pub fn kill(&self, slot: &Slot<K>) -> bool {
        let handle = self.lock().live.remove(slot);
        match handle {
            Some(handle) => {
                tracing::debug!(?slot, generation = handle.generation, "killing live process");
                handle.terminate();
                true
            }
            None => false,
        }
    }

    pub fn kill_all(&self) {
        let handles: Vec<LiveHandle> = self.lock().live.drain().map(|(_, handle)| handle).collect();
        for handle in handles {
            handle.terminate();
        }
    }

    pub fn is_live(&self, slot: &Slot<K>) -> bool {
        self.lock().live.contains_key(slot)
    }

    pub fn live_generation(&self, slot: &Slot<K>) -> Option<Generation> {
        self.lock().live.get(slot).map(|handle| handle.generation)
    }

    /// Drop the slot entry if it still belongs to `generation`.
    fn retire(&self, slot: &Slot<K>, generation: Generation) {
        let mut table = self.lock();
        if table
            .live
            .get(slot)
            .is_some_and(|handle| handle.generation == generation)
        {
            table.live.remove(slot);
        }
    }
}

struct Driver<K, O> {
    supervisor: Supervisor<K>,
    slot: Slot<K>,
    generation: Generation,
    gate: Gate,
    observer: O,
    _stdin: Option<ChildStdin>,
}

impl<K, O> Driver<K, O>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    O: ProcessObserver,
{
    async fn run<R1, R2>(
        mut self,
        mut child: Child,
        mut stdout: Option<Lines<BufReader<R1>>>,
        mut stderr: Option<Lines<BufReader<R2>>>,
        mut kill_rx: oneshot::Receiver<()>,
    ) where
        R1: AsyncRead + Unpin,
        R2: AsyncRead + Unpin,
    {
        let status = loop {
            tokio::select! {
                biased;
                _ = &mut kill_rx => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    tracing::debug!(slot = ?self.slot, generation = self.generation, "process killed");
                    return;
                }
                line = next_line(&mut stdout) => {
                    if let Some(line) = line {
                        self.dispatch(|observer| observer.on_stdout(&line));
                    }
                }
                line = next_line(&mut stderr) => {
                    if let Some(line) = line {
                        self.dispatch(|observer| observer.on_stderr(&line));
                    }
                }
                status = child.wait() => break status,
            }
        };

        while let Some(line) = drain_line(&mut stdout).await {
            self.dispatch(|observer| observer.on_stdout(&line));
        }
        while let Some(line) = drain_line(&mut stderr).await {
            self.dispatch(|observer| observer.on_stderr(&line));
        }

        let exit = ProcessExit {
            code: status.ok().and_then(|status| status.code()),
        };
        let mut live = lock_gate(&self.gate);
        if !*live {
            return;
        }
        *live = false;
        self.supervisor.retire(&self.slot, self.generation);
        tracing::debug!(slot = ?self.slot, generation = self.generation, code = ?exit.code, "process exited");
        self.observer.on_exit(exit);
    }

    fn dispatch(&mut self, event: impl FnOnce(&mut O)) {
        let live = lock_gate(&self.gate);
        if *live {
            event(&mut self.observer);
        }
    }
}

/// Next line from an open stream. A closed stream never resolves.
async fn next_line<R: AsyncRead + Unpin>(lines: &mut Option<Lines<BufReader<R>>>) -> Option<String> {
    match lines {
        Some(reader) => match reader.next_line().await {
            Ok(Some(line)) => Some(line),
            Ok(None) | Err(_) => {
                *lines = None;
                None
            }
        },
        None => std::future::pending().await,
    }
}

async fn drain_line<R: AsyncRead + Unpin>(lines: &mut Option<Lines<BufReader<R>>>) -> Option<String> {
    let reader = lines.as_mut()?;
    match tokio::time::timeout(DRAIN_TIMEOUT, reader.next_line()).await {
        Ok(Ok(Some(line))) => Some(line),
        _ => {
            *lines = None;
            None
        }
    }
}
