use super::*;
use frg_core::{BridgeError, OutputSink};
use frg_core::output::NOT_SOURCE_FILE_MESSAGE;
use serde_json::Value;
use tower_lsp::jsonrpc;

impl Backend {
    pub(super) async fn handle_execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<Value>> {
        match params.command.as_str() {
            RUN_FILE_COMMAND => {
                let started = self.run_file(&params.arguments).await;
                Ok(Some(Value::Bool(started)))
            }
            STOP_RUN_COMMAND => {
                let path = self.running_path();
                let stopped = self.runner.stop();
                if let Some(path) = path.filter(|_| stopped) {
                    tracing::info!(path = %path.display(), "run stopped by user");
                }
                Ok(Some(Value::Bool(stopped)))
            }
            other => Err(jsonrpc::Error::invalid_params(format!(
                "unknown command: {other}"
            ))),
        }
    }

    /// Start an interactive run. Returns whether a process was launched.
    async fn run_file(&self, arguments: &[Value]) -> bool {
        let Some(uri) = helpers::uri_argument(arguments) else {
            self.editor
                .show_message(MessageType::WARNING, NOT_SOURCE_FILE_MESSAGE);
            return false;
        };
        let Ok(path) = uri.to_file_path() else {
            self.editor
                .show_message(MessageType::WARNING, NOT_SOURCE_FILE_MESSAGE);
            return false;
        };

        let config = self.current_config().await;
        if !config.is_source_path(&path) {
            self.editor
                .show_message(MessageType::WARNING, NOT_SOURCE_FILE_MESSAGE);
            return false;
        }

        let document = match self.document_for_run(&uri, &path).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read file to run");
                self.editor.show_message(
                    MessageType::ERROR,
                    format!("Cannot read {}: {e}", path.display()),
                );
                return false;
            }
        };

        match self.runner.start(document, &path, &config) {
            // Exit-time effects are handled by the session itself.
            Ok(_finished) => true,
            Err(BridgeError::NotSourceFile { .. }) => {
                self.editor
                    .show_message(MessageType::WARNING, NOT_SOURCE_FILE_MESSAGE);
                false
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "run failed to start");
                self.editor.append_line(&format!("Forge run failed: {e}"));
                self.editor
                    .show_message(MessageType::ERROR, format!("Forge run failed: {e}"));
                false
            }
        }
    }
}
