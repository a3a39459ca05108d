//! Ordered outbound traffic to the LSP client.
//!
//! Diagnostics, output-channel events, navigation requests, and log lines all
//! go through one unbounded queue drained by a single task. A clear enqueued
//! before a publish therefore always reaches the client first, no matter
//! which task produced each message.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use frg_core::document::TextPosition;
use frg_core::publish::DiagnosticSink;
use frg_core::run::Navigator;
use frg_core::{Diagnostic, OutputSink};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_lsp::Client;
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::{MessageType, Position, Range, ShowDocumentParams, Url};

use crate::diagnostic_mapper::{attach_related_information, to_lsp_diagnostics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Clear,
    Show,
    Append,
}

/// Payload of the `frg/output` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputParams {
    pub kind: OutputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Client-side output channel ("Forge Output").
pub enum OutputNotification {}

impl Notification for OutputNotification {
    type Params = OutputParams;
    const METHOD: &'static str = "frg/output";
}

#[derive(Debug, Clone)]
pub(crate) enum Outbound {
    Diagnostics {
        uri: Url,
        diagnostics: Vec<tower_lsp::lsp_types::Diagnostic>,
    },
    Output(OutputParams),
    Log {
        typ: MessageType,
        message: String,
    },
    Message {
        typ: MessageType,
        message: String,
    },
    ShowDocument(ShowDocumentParams),
}

#[derive(Clone)]
pub(crate) struct Editor {
    queue: mpsc::UnboundedSender<Outbound>,
    related_information: Arc<AtomicBool>,
    #[cfg(test)]
    pub(crate) sent: Arc<std::sync::Mutex<Vec<Outbound>>>,
}

impl Editor {
    /// Start the forwarding task. Must be called inside a tokio runtime.
    pub(crate) fn new(client: Client) -> Self {
        let (queue, mut pending) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(message) = pending.recv().await {
                deliver(&client, message).await;
            }
        });
        Self {
            queue,
            related_information: Arc::new(AtomicBool::new(false)),
            #[cfg(test)]
            sent: Default::default(),
        }
    }

    fn send(&self, message: Outbound) {
        #[cfg(test)]
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(message.clone());
        if self.queue.send(message).is_err() {
            tracing::debug!("client queue closed; dropping outbound message");
        }
    }

    /// Whether published diagnostics carry related information.
    pub(crate) fn set_related_information(&self, enabled: bool) {
        self.related_information.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn log(&self, typ: MessageType, message: impl Into<String>) {
        self.send(Outbound::Log {
            typ,
            message: message.into(),
        });
    }

    pub(crate) fn show_message(&self, typ: MessageType, message: impl Into<String>) {
        self.send(Outbound::Message {
            typ,
            message: message.into(),
        });
    }

    fn output(&self, kind: OutputKind, text: Option<String>) {
        self.send(Outbound::Output(OutputParams { kind, text }));
    }
}

async fn deliver(client: &Client, message: Outbound) {
    match message {
        Outbound::Diagnostics { uri, diagnostics } => {
            client.publish_diagnostics(uri, diagnostics, None).await;
        }
        Outbound::Output(params) => {
            client.send_notification::<OutputNotification>(params).await;
        }
        Outbound::Log { typ, message } => client.log_message(typ, message).await,
        Outbound::Message { typ, message } => client.show_message(typ, message).await,
        Outbound::ShowDocument(params) => {
            let uri = params.uri.clone();
            match client.show_document(params).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(%uri, "client declined to show document"),
                Err(e) => tracing::debug!(%uri, error = %e, "showDocument failed"),
            }
        }
    }
}

impl DiagnosticSink<Url> for Editor {
    fn set(&self, id: &Url, diagnostics: Vec<Diagnostic>) {
        let mut diagnostics = to_lsp_diagnostics(&diagnostics);
        if self.related_information.load(Ordering::Relaxed) {
            for diagnostic in &mut diagnostics {
                attach_related_information(diagnostic, id);
            }
        }
        self.send(Outbound::Diagnostics {
            uri: id.clone(),
            diagnostics,
        });
    }
}

impl OutputSink for Editor {
    fn append_line(&self, line: &str) {
        self.output(OutputKind::Append, Some(line.to_string()));
        self.log(MessageType::INFO, line);
    }

    fn clear(&self) {
        self.output(OutputKind::Clear, None);
    }

    fn show(&self) {
        self.output(OutputKind::Show, None);
    }
}

fn show_document_params(uri: Url, position: Option<TextPosition>) -> ShowDocumentParams {
    let selection = position.map(|position| {
        let at = Position::new(position.line, position.character);
        Range::new(at, at)
    });
    ShowDocumentParams {
        uri,
        external: Some(false),
        take_focus: Some(true),
        selection,
    }
}

impl Navigator<Url> for Editor {
    fn open(&self, id: &Url, position: Option<TextPosition>) {
        self.send(Outbound::ShowDocument(show_document_params(id.clone(), position)));
    }
}

impl Navigator<PathBuf> for Editor {
    fn open(&self, id: &PathBuf, position: Option<TextPosition>) {
        match Url::from_file_path(id) {
            Ok(uri) => self.send(Outbound::ShowDocument(show_document_params(uri, position))),
            Err(()) => self.log(
                MessageType::WARNING,
                format!("Cannot open non-absolute path {}", id.display()),
            ),
        }
    }
}
