use super::*;
use frg_core::{CheckOutcome, OutputSink, ValidationRequest};
use std::future::Future;
use tokio::task::JoinHandle;

pub(super) const MAX_CONFIG_REVALIDATION_CONCURRENCY: usize = 8;

pub(super) fn config_revalidation_concurrency(document_count: usize) -> usize {
    if document_count == 0 {
        return 0;
    }

    let available = std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4);

    document_count.min(available.clamp(1, MAX_CONFIG_REVALIDATION_CONCURRENCY))
}

/// Execute `operation` on each item with bounded concurrency.
///
/// Spawns up to `max_concurrency` tasks at once (minimum 1). As each task
/// completes, the next item is dispatched, maintaining the concurrency cap.
///
/// Partial failures are collected, not propagated: if a spawned task panics
/// or is cancelled, its `JoinError` is appended to the returned `Vec` and
/// processing continues with the remaining items.
pub(super) async fn for_each_bounded<T, I, F, Fut>(
    items: I,
    max_concurrency: usize,
    operation: F,
) -> Vec<tokio::task::JoinError>
where
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut join_set = tokio::task::JoinSet::new();
    let mut join_errors = Vec::new();
    let mut items = items.into_iter();
    let max_concurrency = max_concurrency.max(1);
    let operation = Arc::new(operation);

    for _ in 0..max_concurrency {
        let Some(item) = items.next() else {
            break;
        };

        let operation = Arc::clone(&operation);
        join_set.spawn(async move {
            operation(item).await;
        });
    }

    while let Some(result) = join_set.join_next().await {
        if let Err(error) = result {
            join_errors.push(error);
        }

        if let Some(item) = items.next() {
            let operation = Arc::clone(&operation);
            join_set.spawn(async move {
                operation(item).await;
            });
        }
    }

    join_errors
}

/// Run one validation request and report failures to the output channel.
///
/// Superseded results are routine and only traced.
async fn run_check(
    checker: &Checker<Url>,
    editor: &Editor,
    request: &ValidationRequest<Url>,
    config: &BridgeConfig,
) {
    match checker.run(request, config).await {
        Ok(CheckOutcome::Superseded) => {
            tracing::trace!(uri = %request.id(), "check superseded");
        }
        Ok(CheckOutcome::Clean) => {}
        Ok(CheckOutcome::Failed(failure)) => {
            tracing::debug!(uri = %request.id(), source = %failure.source, "check reported a failure");
        }
        Err(e) => {
            tracing::warn!(uri = %request.id(), error = %e, "check could not run");
            editor.append_line(&format!("Forge check failed: {e}"));
        }
    }
}

impl Backend {
    /// Clear the document's diagnostics now and check it in the background.
    pub(super) async fn schedule_validation(
        &self,
        document: Arc<TextDocument<Url>>,
    ) -> JoinHandle<()> {
        let config = self.current_config().await;
        let request = self.checker.begin(document);
        let checker = self.checker.clone();
        let editor = self.editor.clone();
        tokio::spawn(async move {
            run_check(&checker, &editor, &request, &config).await;
        })
    }

    /// Re-check every open document after a settings change.
    ///
    /// A document edited since the snapshot was taken already has a check
    /// running under the new settings and is skipped, as is the whole batch
    /// once a newer settings change arrives.
    pub(super) fn spawn_revalidation(&self) -> JoinHandle<()> {
        let documents = Arc::clone(&self.documents);
        let config = Arc::clone(&self.config);
        let generation = Arc::clone(&self.config_generation);
        let checker = self.checker.clone();
        let editor = self.editor.clone();

        tokio::spawn(async move {
            let expected_generation = generation.load(Ordering::SeqCst);
            let snapshot: Vec<_> = documents.read().await.values().cloned().collect();
            let concurrency = config_revalidation_concurrency(snapshot.len());
            tracing::debug!(documents = snapshot.len(), concurrency, "revalidating open documents");

            let errors = for_each_bounded(snapshot, concurrency, move |document| {
                let documents = Arc::clone(&documents);
                let config = Arc::clone(&config);
                let generation = Arc::clone(&generation);
                let checker = checker.clone();
                let editor = editor.clone();
                async move {
                    let config = Arc::clone(&*config.read().await);
                    // Edits store their snapshot before calling `begin`; the
                    // read lock orders this `begin` ahead of theirs.
                    let request = {
                        let documents = documents.read().await;
                        if generation.load(Ordering::SeqCst) != expected_generation {
                            return;
                        }
                        let unchanged = documents
                            .get(document.id())
                            .is_some_and(|current| Arc::ptr_eq(current, &document));
                        if !unchanged {
                            return;
                        }
                        checker.begin(document)
                    };
                    run_check(&checker, &editor, &request, &config).await;
                }
            })
            .await;

            for error in errors {
                tracing::warn!(error = %error, "revalidation task failed");
            }
        })
    }
}
