//! LSP backend implementation for frg.
//!
//! Implements the Language Server Protocol using tower-lsp. Open documents
//! are checked in the background on every open and change; the interactive
//! run session and terminal link resolution are exposed as commands and
//! custom requests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use frg_core::{
    BridgeConfig, Checker, Publisher, RunSession, Supervisor, TempDirScratch, TerminalLink,
    TextDocument,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::editor::Editor;
use crate::settings::ClientSettings;

mod commands;
mod events;
mod helpers;
mod revalidation;


/// Run the file named by the URI argument in the interactive slot.
pub const RUN_FILE_COMMAND: &str = "frg.runFile";

/// Stop the interactive run, if any.
pub const STOP_RUN_COMMAND: &str = "frg.stopRun";

/// Parameters of `frg/resolveTerminalLink`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkParams {
    /// One line of terminal output.
    pub line: String,
    /// URI of the document focused in the editor.
    pub active_document: Url,
}

type Documents = Arc<RwLock<HashMap<Url, Arc<TextDocument<Url>>>>>;

/// LSP backend that handles validation and run requests.
///
/// Every toolchain process is owned by the supervisor: one slot per open
/// document for the checker and a single interactive slot for runs.
pub struct Backend {
    client: Client,
    editor: Editor,
    documents: Documents,
    config: Arc<RwLock<Arc<BridgeConfig>>>,
    /// Bumped on every settings change; batch revalidation of an older
    /// generation is abandoned.
    config_generation: Arc<AtomicU64>,
    scratch: Arc<TempDirScratch>,
    supervisor: Supervisor<Url>,
    checker: Checker<Url>,
    runner: Arc<RunSession<Url>>,
}

impl Backend {
    /// Create a new backend instance with the given client connection.
    pub fn new(client: Client) -> Self {
        let config = BridgeConfig::default();
        let editor = Editor::new(client.clone());
        let supervisor = Supervisor::new();
        let scratch = Arc::new(TempDirScratch::new(
            config.scratch_dir(),
            config.source_extension.clone(),
        ));
        let publisher = Arc::new(Publisher::new(Arc::new(editor.clone())));
        let checker = Checker::new(supervisor.clone(), scratch.clone(), Arc::clone(&publisher));
        let runner = Arc::new(RunSession::new(
            supervisor.clone(),
            publisher,
            Arc::new(editor.clone()),
            Arc::new(editor.clone()),
        ));

        Self {
            client,
            editor,
            documents: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(RwLock::new(Arc::new(config))),
            config_generation: Arc::new(AtomicU64::new(0)),
            scratch,
            supervisor,
            checker,
            runner,
        }
    }

    /// Process owner shared by the checker and the run session.
    pub fn supervisor(&self) -> &Supervisor<Url> {
        &self.supervisor
    }

    /// `frg/resolveTerminalLink`: the link in `line`, if it points into the
    /// active document.
    pub async fn resolve_terminal_link(&self, params: LinkParams) -> Result<Option<TerminalLink>> {
        let Ok(active) = params.active_document.to_file_path() else {
            return Ok(None);
        };
        let config = self.current_config().await;
        let chain = match config.locator() {
            Ok(chain) => chain,
            Err(e) => {
                tracing::warn!(error = %e, "cannot build locator chain");
                return Ok(None);
            }
        };
        Ok(frg_core::resolve_link(&chain, &params.line, &active))
    }

    /// `frg/openTerminalLink`: open the link target, cursor on the locator.
    pub async fn open_terminal_link(&self, link: TerminalLink) -> Result<()> {
        frg_core::link::activate(&link, &self.editor);
        Ok(())
    }

    async fn current_config(&self) -> Arc<BridgeConfig> {
        Arc::clone(&*self.config.read().await)
    }

    async fn apply_settings(&self, settings: &ClientSettings) {
        let updated = {
            let mut guard = self.config.write().await;
            let mut config = (**guard).clone();
            settings.apply(&mut config);
            let updated = Arc::new(config);
            *guard = Arc::clone(&updated);
            updated
        };
        self.scratch
            .retarget(updated.scratch_dir(), updated.source_extension.clone());
        self.config_generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(racket = %updated.racket_path, "settings applied");
    }

    /// Parse a settings payload, logging and ignoring anything malformed.
    fn parse_settings(&self, value: serde_json::Value) -> Option<ClientSettings> {
        match ClientSettings::from_value(value) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring invalid settings");
                self.editor
                    .log(MessageType::WARNING, format!("Ignoring invalid settings: {e}"));
                None
            }
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let related_information = params
            .capabilities
            .text_document
            .as_ref()
            .and_then(|text_document| text_document.publish_diagnostics.as_ref())
            .and_then(|publish| publish.related_information)
            .unwrap_or(false);
        self.editor.set_related_information(related_information);

        if let Some(options) = params.initialization_options {
            if let Some(settings) = self.parse_settings(options) {
                self.apply_settings(&settings).await;
            }
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![RUN_FILE_COMMAND.to_string(), STOP_RUN_COMMAND.to_string()],
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "frg-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("frg-lsp initialized");
        self.client
            .log_message(MessageType::INFO, "frg-lsp initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down; killing toolchain processes");
        self.supervisor.kill_all();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.handle_did_open(params).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        self.handle_did_change(params).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.handle_did_close(params).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        self.handle_did_change_configuration(params).await;
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<serde_json::Value>> {
        self.handle_execute_command(params).await
    }
}
