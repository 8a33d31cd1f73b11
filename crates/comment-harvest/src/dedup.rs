//! Session-scoped sets of accepted continuation tokens and fingerprints.

use std::collections::HashSet;

use crate::types::{ContentFingerprint, ContinuationToken};

/// Two independent membership sets. Grows monotonically for the life of a
/// session and is never persisted.
#[derive(Debug, Default, Clone)]
pub struct DedupStore {
    seen_tokens: HashSet<ContinuationToken>,
    seen_fingerprints: HashSet<ContentFingerprint>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_token(&self, token: &ContinuationToken) -> bool {
        self.seen_tokens.contains(token)
    }

    pub fn has_fingerprint(&self, fingerprint: &ContentFingerprint) -> bool {
        self.seen_fingerprints.contains(fingerprint)
    }

    pub fn record_token(&mut self, token: ContinuationToken) {
        self.seen_tokens.insert(token);
    }

    pub fn record_fingerprint(&mut self, fingerprint: ContentFingerprint) {
        self.seen_fingerprints.insert(fingerprint);
    }

    pub fn token_count(&self) -> usize {
        self.seen_tokens.len()
    }

    pub fn fingerprint_count(&self) -> usize {
        self.seen_fingerprints.len()
    }
}
