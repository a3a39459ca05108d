use super::*;
use serde_json::Value;

/// First command argument as a document URI.
///
/// Clients send either the bare URI string or an object with a `uri` field.
pub(super) fn uri_argument(arguments: &[Value]) -> Option<Url> {
    let raw = match arguments.first()? {
        Value::String(uri) => uri.as_str(),
        Value::Object(map) => map.get("uri")?.as_str()?,
        _ => return None,
    };
    Url::parse(raw).ok()
}

impl Backend {
    /// Snapshot to run: the editor's contents when open, otherwise the file on
    /// disk.
    pub(super) async fn document_for_run(
        &self,
        uri: &Url,
        path: &Path,
    ) -> std::io::Result<Arc<TextDocument<Url>>> {
        if let Some(document) = self.get_document(uri).await {
            return Ok(document);
        }
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Arc::new(TextDocument::new(uri.clone(), 0, text)))
    }

    /// Get the stored snapshot for a URI.
    pub(super) async fn get_document(&self, uri: &Url) -> Option<Arc<TextDocument<Url>>> {
        self.documents.read().await.get(uri).cloned()
    }

    /// Path of the document currently being run, if it is a file.
    pub(super) fn running_path(&self) -> Option<PathBuf> {
        self.runner.active_document()?.to_file_path().ok()
    }
}
