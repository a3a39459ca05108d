//! One-shot background validation of a document.
//!
//! Every open/change event calls [`Checker::begin`], which issues a fresh
//! sequence token and clears the document's diagnostics on the spot. The
//! returned request is then handed to [`Checker::run`] on a background task:
//! snapshot to scratch file, toolchain in the document's slot, stderr through
//! the locator chain, publish. The publish is guarded by "token still current"
//! inside the publisher lock, so a stale result can never land after a newer
//! edit or close.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::BridgeConfig;
use crate::diagnostics::{BridgeResult, Channel, DiagnosticSource, Severity};
use crate::document::TextDocument;
use crate::locator::LocationMatch;
use crate::publish::{Publisher, resolve_diagnostic};
use crate::scratch::ScratchSpace;
use crate::sequence::{Sequencer, ValidationRequest};
use crate::supervisor::{ExitClass, Slot, Supervisor};

/// A toolchain failure for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub class: ExitClass,
    pub location: Option<LocationMatch>,
    /// Full stderr text, trailing line terminators removed.
    pub message: String,
    pub severity: Severity,
    pub source: DiagnosticSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A newer request or a close took over. Nothing was published.
    Superseded,
    Clean,
    Failed(Failure),
}

/// Interpret checker output. Blank stderr is a clean result whatever the
/// exit code.
pub fn interpret(
    class: ExitClass,
    stderr: &str,
    config: &BridgeConfig,
) -> BridgeResult<Option<Failure>> {
    if stderr.trim().is_empty() {
        return Ok(None);
    }
    let (severity, source) = match class {
        ExitClass::SyntaxError => (Severity::Error, DiagnosticSource::SyntaxChecker),
        ExitClass::Clean | ExitClass::ToolError(_) => {
            (Severity::Warning, DiagnosticSource::Checker)
        }
    };
    let location = config.locator()?.locate(stderr);
    Ok(Some(Failure {
        class,
        location,
        message: stderr.trim_end_matches(['\n', '\r']).to_string(),
        severity,
        source,
    }))
}

pub struct Checker<K> {
    supervisor: Supervisor<K>,
    sequencer: Arc<Sequencer<K>>,
    scratch: Arc<dyn ScratchSpace>,
    publisher: Arc<Publisher<K>>,
    launch: Arc<Mutex<()>>,
}

impl<K> Clone for Checker<K> {
    fn clone(&self) -> Self {
        Self {
            supervisor: self.supervisor.clone(),
            sequencer: Arc::clone(&self.sequencer),
            scratch: Arc::clone(&self.scratch),
            publisher: Arc::clone(&self.publisher),
            launch: Arc::clone(&self.launch),
        }
    }
}

impl<K> Checker<K>
where
    K: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static,
{
    pub fn new(
        supervisor: Supervisor<K>,
        scratch: Arc<dyn ScratchSpace>,
        publisher: Arc<Publisher<K>>,
    ) -> Self {
        Self {
            supervisor,
            sequencer: Arc::new(Sequencer::new()),
            scratch,
            publisher,
            launch: Arc::new(Mutex::new(())),
        }
    }

    /// Start a validation pass. Clears the document's diagnostics before
    /// returning.
    pub fn begin(&self, document: Arc<TextDocument<K>>) -> ValidationRequest<K> {
        let request = self.sequencer.request(document);
        self.publisher.clear(request.id());
        request
    }

    pub fn is_current(&self, request: &ValidationRequest<K>) -> bool {
        self.sequencer.is_current(request.id(), request.token)
    }

    pub async fn run(
        &self,
        request: &ValidationRequest<K>,
        config: &BridgeConfig,
    ) -> BridgeResult<CheckOutcome> {
        let id = request.id();
        let finished = {
            // Token check, scratch write and spawn are one step with respect
            // to other launches and `close`.
            let _launch = self.lock_launch();
            if !self.is_current(request) {
                tracing::trace!(%id, token = request.token.value(), "validation superseded before start");
                return Ok(CheckOutcome::Superseded);
            }

            let path = self.scratch.path_for(&id.to_string());
            self.scratch.write(&path, request.document.text())?;

            let command = config.check_command(&path);
            self.supervisor
                .start_capture(Slot::Document(id.clone()), &command)?
        };
        let Ok(output) = finished.await else {
            tracing::trace!(%id, token = request.token.value(), "validation superseded while running");
            return Ok(CheckOutcome::Superseded);
        };

        let class = config.classify(output.exit());
        let failure = interpret(class, &output.stderr, config)?;
        let diagnostics = match &failure {
            Some(failure) => vec![resolve_diagnostic(
                &request.document,
                failure.location.as_ref(),
                &failure.message,
                failure.severity,
                failure.source,
                Channel::Check,
            )],
            None => Vec::new(),
        };

        let published = self
            .publisher
            .replace_if(Channel::Check, id, diagnostics, || self.is_current(request));
        if !published {
            tracing::trace!(%id, token = request.token.value(), "validation result discarded");
            return Ok(CheckOutcome::Superseded);
        }

        tracing::debug!(%id, code = ?output.code, failed = failure.is_some(), "validation finished");
        Ok(match failure {
            Some(failure) => CheckOutcome::Failed(failure),
            None => CheckOutcome::Clean,
        })
    }

    /// `begin` followed by `run`.
    pub async fn validate(
        &self,
        document: Arc<TextDocument<K>>,
        config: &BridgeConfig,
    ) -> BridgeResult<CheckOutcome> {
        let request = self.begin(document);
        self.run(&request, config).await
    }

    /// Tear down everything held for a closed document.
    pub fn close(&self, id: &K) -> BridgeResult<()> {
        let _launch = self.lock_launch();
        self.sequencer.forget(id);
        self.supervisor.kill(&Slot::Document(id.clone()));
        self.publisher.clear(id);
        let path = self.scratch.path_for(&id.to_string());
        self.scratch.remove(&path)
    }

    pub fn publisher(&self) -> &Arc<Publisher<K>> {
        &self.publisher
    }

    fn lock_launch(&self) -> MutexGuard<'_, ()> {
        self.launch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
