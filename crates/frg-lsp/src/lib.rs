//! # frg-lsp
//!
//! Language Server Protocol front end for the Forge diagnostic bridge.
//!
//! ## Features
//!
//! - Background checking of every open document on open and change
//! - Stale-result suppression: only the newest edit's result is published
//! - `frg.runFile` / `frg.stopRun` commands for interactive runs, with
//!   output relayed through the `frg/output` notification
//! - `frg/resolveTerminalLink` and `frg/openTerminalLink` requests that turn
//!   locators in terminal text into navigable links
//!
//! ## Usage
//!
//! ```bash
//! frg-lsp
//! ```
//!
//! The server communicates over stdin/stdout using the LSP protocol. Log
//! verbosity is controlled with `FRG_LOG` (an `EnvFilter` directive).

mod backend;
mod diagnostic_mapper;
mod editor;
mod settings;

pub use backend::{Backend, LinkParams, RUN_FILE_COMMAND, STOP_RUN_COMMAND};
pub use diagnostic_mapper::{attach_related_information, to_lsp_diagnostic, to_lsp_diagnostics};
pub use editor::{OutputKind, OutputNotification, OutputParams};
pub use settings::{ClientSettings, SETTINGS_SECTION};

use tower_lsp::{LspService, Server};

/// Build the service with the custom request handlers registered.
pub fn build_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::build(Backend::new)
        .custom_method("frg/resolveTerminalLink", Backend::resolve_terminal_link)
        .custom_method("frg/openTerminalLink", Backend::open_terminal_link)
        .finish()
}

/// Start the LSP server.
///
/// Runs over stdin/stdout until the client disconnects. Any toolchain
/// process still alive at that point is killed.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters a fatal error.
pub async fn start_server() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = build_service();
    let supervisor = service.inner().supervisor().clone();
    Server::new(stdin, stdout, socket).serve(service).await;
    supervisor.kill_all();
    Ok(())
}
