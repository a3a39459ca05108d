use super::*;

impl Backend {
    pub(super) async fn handle_did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        let document = Arc::new(TextDocument::new(item.uri.clone(), item.version, item.text));
        {
            let mut docs = self.documents.write().await;
            docs.insert(item.uri, Arc::clone(&document));
        }
        self.schedule_validation(document).await;
    }

    pub(super) async fn handle_did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        // FULL sync: the last change carries the whole text.
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        let document = Arc::new(TextDocument::new(
            uri.clone(),
            params.text_document.version,
            change.text,
        ));
        {
            let mut docs = self.documents.write().await;
            docs.insert(uri, Arc::clone(&document));
        }
        self.schedule_validation(document).await;
    }

    pub(super) async fn handle_did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        {
            let mut docs = self.documents.write().await;
            docs.remove(&uri);
        }
        if let Err(e) = self.checker.close(&uri) {
            tracing::warn!(%uri, error = %e, "failed to clean up after close");
        }
    }

    pub(super) async fn handle_did_change_configuration(
        &self,
        params: DidChangeConfigurationParams,
    ) {
        let Some(settings) = self.parse_settings(params.settings) else {
            return;
        };
        if settings.is_empty() {
            tracing::debug!("configuration change without frg settings");
            return;
        }
        self.apply_settings(&settings).await;
        self.spawn_revalidation();
    }
}
