//! Per-document validation sequencing.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::document::TextDocument;

/// Sequencer-wide counter value. Values are never reused, even across a
/// close and reopen of the same document. Only the newest token for a
/// document may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceToken(u64);

impl SequenceToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// One validation pass over one snapshot.
#[derive(Debug, Clone)]
pub struct ValidationRequest<K> {
    pub document: Arc<TextDocument<K>>,
    pub token: SequenceToken,
}

impl<K> ValidationRequest<K> {
    pub fn id(&self) -> &K {
        self.document.id()
    }
}

#[derive(Debug)]
struct Issued<K> {
    counter: u64,
    latest: HashMap<K, u64>,
}

#[derive(Debug)]
pub struct Sequencer<K> {
    issued: Mutex<Issued<K>>,
}

impl<K: Clone + Eq + Hash> Default for Sequencer<K> {
    fn default() -> Self {
        Self {
            issued: Mutex::new(Issued {
                counter: 0,
                latest: HashMap::new(),
            }),
        }
    }
}

impl<K: Clone + Eq + Hash> Sequencer<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next token for `id`, invalidating every earlier one.
    pub fn next(&self, id: &K) -> SequenceToken {
        let mut issued = self.lock();
        issued.counter += 1;
        let token = issued.counter;
        issued.latest.insert(id.clone(), token);
        SequenceToken(token)
    }

    pub fn request(&self, document: Arc<TextDocument<K>>) -> ValidationRequest<K> {
        let token = self.next(document.id());
        ValidationRequest { document, token }
    }

    pub fn is_current(&self, id: &K, token: SequenceToken) -> bool {
        self.lock().latest.get(id) == Some(&token.0)
    }

    /// Mark a document closed. Outstanding tokens become stale and stay
    /// stale after a reopen.
    pub fn forget(&self, id: &K) {
        self.lock().latest.remove(id);
    }

    fn lock(&self) -> MutexGuard<'_, Issued<K>> {
        self.issued.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
