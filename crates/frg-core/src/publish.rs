//! Diagnostic publication with replace semantics.
//!
//! Each document keeps one diagnostic set per [`Channel`]. Publishing into a
//! channel replaces that channel's set; the sink always receives the union of
//! every channel for the document. Sink calls happen under the publisher's
//! lock so that deliveries for one document reach the sink in the order the
//! state changed.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::diagnostics::{Channel, Diagnostic, DiagnosticSource, Severity};
use crate::document::TextDocument;
use crate::locator::LocationMatch;
use crate::offsets::{OffsetRange, offset_range};

/// Editor-side diagnostic collection. An empty vector clears the document.
pub trait DiagnosticSink<K>: Send + Sync {
    fn set(&self, id: &K, diagnostics: Vec<Diagnostic>);
}

/// Resolve toolchain text against a snapshot.
///
/// Without a location the diagnostic is anchored at offset 0. The message is
/// always the full raw text.
pub fn resolve_diagnostic<K>(
    document: &TextDocument<K>,
    location: Option<&LocationMatch>,
    message: &str,
    severity: Severity,
    source: DiagnosticSource,
    channel: Channel,
) -> Diagnostic {
    let offsets = match location {
        Some(location) => offset_range(document.text(), location.line, location.column),
        None => OffsetRange::DOCUMENT_START,
    };
    Diagnostic {
        range: document.range_of(offsets),
        offsets,
        severity,
        message: message.to_string(),
        source,
        channel,
    }
}

type ChannelSets = BTreeMap<Channel, Vec<Diagnostic>>;

pub struct Publisher<K> {
    sink: Arc<dyn DiagnosticSink<K>>,
    sets: Mutex<HashMap<K, ChannelSets>>,
}

impl<K: Clone + Eq + Hash> Publisher<K> {
    pub fn new(sink: Arc<dyn DiagnosticSink<K>>) -> Self {
        Self {
            sink,
            sets: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, ChannelSets>> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, id: &K, sets: &ChannelSets) {
        let union: Vec<Diagnostic> = sets.values().flatten().cloned().collect();
        self.sink.set(id, union);
    }

    /// Replace `channel` for the document with a single resolved diagnostic.
    pub fn publish(
        &self,
        channel: Channel,
        document: &TextDocument<K>,
        location: Option<&LocationMatch>,
        message: &str,
        severity: Severity,
        source: DiagnosticSource,
    ) {
        let diagnostic =
            resolve_diagnostic(document, location, message, severity, source, channel);
        self.replace(channel, document.id(), vec![diagnostic]);
    }

    pub fn replace(&self, channel: Channel, id: &K, diagnostics: Vec<Diagnostic>) {
        self.replace_if(channel, id, diagnostics, || true);
    }

    /// Replace `channel` only if `guard` holds. The guard is evaluated under
    /// the publisher lock, so nothing can clear or publish in between.
    pub fn replace_if(
        &self,
        channel: Channel,
        id: &K,
        diagnostics: Vec<Diagnostic>,
        guard: impl FnOnce() -> bool,
    ) -> bool {
        let mut sets = self.lock();
        if !guard() {
            return false;
        }
        let entry = sets.entry(id.clone()).or_default();
        entry.insert(channel, diagnostics);
        self.deliver(id, entry);
        true
    }

    /// Empty one channel, keeping the others.
    pub fn clear_channel(&self, channel: Channel, id: &K) {
        let mut sets = self.lock();
        let entry = sets.entry(id.clone()).or_default();
        entry.remove(&channel);
        self.deliver(id, entry);
    }

    /// Empty every channel for the document.
    pub fn clear(&self, id: &K) {
        let mut sets = self.lock();
        sets.remove(id);
        self.sink.set(id, Vec::new());
    }

    /// Union currently published for the document.
    pub fn current(&self, id: &K) -> Vec<Diagnostic> {
        self.lock()
            .get(id)
            .map(|sets| sets.values().flatten().cloned().collect())
            .unwrap_or_default()
    }
}

/// Sink that keeps the latest set per document plus a log of every delivery.
#[derive(Debug)]
pub struct RecordingSink<K> {
    state: Mutex<RecordingState<K>>,
}

#[derive(Debug)]
struct RecordingState<K> {
    latest: HashMap<K, Vec<Diagnostic>>,
    history: Vec<(K, usize)>,
}

impl<K> Default for RecordingSink<K> {
    fn default() -> Self {
        Self {
            state: Mutex::new(RecordingState {
                latest: HashMap::new(),
                history: Vec::new(),
            }),
        }
    }
}

impl<K: Clone + Eq + Hash> RecordingSink<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn latest(&self, id: &K) -> Vec<Diagnostic> {
        self.lock().latest.get(id).cloned().unwrap_or_default()
    }

    /// `(document, number of diagnostics)` for every delivery, oldest first.
    pub fn history(&self) -> Vec<(K, usize)> {
        self.lock().history.clone()
    }
}

impl<K: Clone + Eq + Hash + Send> DiagnosticSink<K> for RecordingSink<K> {
    fn set(&self, id: &K, diagnostics: Vec<Diagnostic>) {
        let mut state = self.lock();
        state.history.push((id.clone(), diagnostics.len()));
        state.latest.insert(id.clone(), diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::LocatorChain;

    fn setup() -> (Arc<RecordingSink<&'static str>>, Publisher<&'static str>) {
        let sink = Arc::new(RecordingSink::new());
        let publisher = Publisher::new(sink.clone() as Arc<dyn DiagnosticSink<&'static str>>);
        (sink, publisher)
    }

    fn document() -> TextDocument<&'static str> {
        TextDocument::new("model.frg", 1, "#lang forge\nsig A {}\npred p { some A }\n")
    }

    #[test]
    fn test_located_diagnostic_spans_to_end_of_line() {
        let (sink, publisher) = setup();
        let doc = document();
        let location = LocatorChain::forge().unwrap().locate("model.frg:2:5: bad").unwrap();
        publisher.publish(
            Channel::Check,
            &doc,
            Some(&location),
            "model.frg:2:5: bad",
            Severity::Error,
            DiagnosticSource::Checker,
        );

        let published = sink.latest(&"model.frg");
        assert_eq!(published.len(), 1);
        let diagnostic = &published[0];
        assert_eq!(diagnostic.offsets, OffsetRange::new(16, 20));
        assert_eq!(diagnostic.range.start.line, 1);
        assert_eq!(diagnostic.range.start.character, 4);
        assert_eq!(diagnostic.range.end.character, 8);
        assert_eq!(diagnostic.message, "model.frg:2:5: bad");
    }

    #[test]
    fn test_unlocated_diagnostic_anchors_at_start_with_raw_text() {
        let (sink, publisher) = setup();
        let raw = "contract violation\n  expected: list?\n  given: 3";
        publisher.publish(
            Channel::Check,
            &document(),
            None,
            raw,
            Severity::Warning,
            DiagnosticSource::Checker,
        );
        let published = sink.latest(&"model.frg");
        assert_eq!(published.len(), 1);
        assert!(published[0].is_unlocated());
        assert_eq!(published[0].message, raw);
    }

    #[test]
    fn test_publish_replaces_previous_set() {
        let (sink, publisher) = setup();
        let doc = document();
        for message in ["first", "second"] {
            publisher.publish(
                Channel::Check,
                &doc,
                None,
                message,
                Severity::Error,
                DiagnosticSource::Checker,
            );
        }
        let published = sink.latest(&"model.frg");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].message, "second");
    }

    #[test]
    fn test_republishing_same_set_is_idempotent() {
        let (sink, publisher) = setup();
        let doc = document();
        let diagnostic = resolve_diagnostic(
            &doc,
            None,
            "boom",
            Severity::Error,
            DiagnosticSource::Checker,
            Channel::Check,
        );
        publisher.replace(Channel::Check, &"model.frg", vec![diagnostic.clone()]);
        let once = sink.latest(&"model.frg");
        publisher.replace(Channel::Check, &"model.frg", vec![diagnostic]);
        assert_eq!(sink.latest(&"model.frg"), once);
        assert_eq!(publisher.current(&"model.frg").len(), 1);
    }

    #[test]
    fn test_channels_are_unioned_and_cleared_independently() {
        let (sink, publisher) = setup();
        let doc = document();
        publisher.publish(
            Channel::Check,
            &doc,
            None,
            "check",
            Severity::Warning,
            DiagnosticSource::Checker,
        );
        publisher.publish(
            Channel::Run,
            &doc,
            None,
            "run",
            Severity::Error,
            DiagnosticSource::Runner,
        );
        assert_eq!(sink.latest(&"model.frg").len(), 2);

        publisher.clear_channel(Channel::Run, &"model.frg");
        let remaining = sink.latest(&"model.frg");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].channel, Channel::Check);

        publisher.clear(&"model.frg");
        assert!(sink.latest(&"model.frg").is_empty());
        assert!(publisher.current(&"model.frg").is_empty());
    }

    #[test]
    fn test_replace_if_respects_guard() {
        let (sink, publisher) = setup();
        let applied = publisher.replace_if(Channel::Check, &"model.frg", Vec::new(), || false);
        assert!(!applied);
        assert!(sink.history().is_empty());
    }

    #[test]
    fn test_clear_always_reaches_sink() {
        let (sink, publisher) = setup();
        publisher.clear(&"never-published.frg");
        assert_eq!(sink.history(), vec![("never-published.frg", 0)]);
    }
}
