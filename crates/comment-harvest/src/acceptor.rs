//! The admission rule: decides whether a candidate page joins the result
//! collection.
//!
//! [`PageAcceptor::try_admit`] is the only writer to the [`DedupStore`] and
//! to the collection. It never suspends, so a caller that holds the
//! acceptor exclusively gets an atomic check-then-record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dedup::DedupStore;
use crate::fingerprint::fingerprint;
use crate::types::{AdmitResult, CaptureSource, CommentablePage, ContinuationToken};

/// How a repeated continuation token is treated when the content differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCollisionPolicy {
    /// A repeated token with a new fingerprint is still admitted.
    #[default]
    Recover,
    /// A repeated token is rejected whatever its content.
    Strict,
}

impl std::str::FromStr for TokenCollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recover" => Ok(Self::Recover),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "unknown token collision policy '{other}' (expected 'recover' or 'strict')"
            )),
        }
    }
}

/// Owns the dedup state and the insertion-ordered result collection.
#[derive(Debug, Default)]
pub struct PageAcceptor {
    store: DedupStore,
    pages: Vec<CommentablePage>,
    policy: TokenCollisionPolicy,
}

impl PageAcceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: TokenCollisionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Try to admit a candidate `commentable` payload.
    pub fn try_admit(&mut self, candidate: Value, source: CaptureSource) -> AdmitResult {
        let token = ContinuationToken::from_cursor(
            candidate
                .get("comments")
                .and_then(|c| c.get("pageInfo"))
                .and_then(|p| p.get("endCursor")),
        );
        let fp = fingerprint(&candidate);

        match token {
            Some(token) if self.store.has_token(&token) => {
                if self.policy == TokenCollisionPolicy::Strict {
                    tracing::debug!("[{source}] token already seen, rejected: {token:?}");
                    return AdmitResult::DuplicateToken;
                }
                if self.store.has_fingerprint(&fp) {
                    tracing::debug!(
                        "[{source}] token and hash already seen, skipped: token={token:?} hash={}",
                        fp.short()
                    );
                    return AdmitResult::DuplicateFingerprint;
                }
                tracing::info!(
                    "[{source}] token already seen but content is new, admitted: token={token:?} hash={}",
                    fp.short()
                );
                self.store.record_fingerprint(fp);
            }
            Some(token) => {
                tracing::info!(
                    "[{source}] new page admitted: token={token:?} hash={}",
                    fp.short()
                );
                self.store.record_token(token);
                self.store.record_fingerprint(fp);
            }
            None => {
                if self.store.has_fingerprint(&fp) {
                    tracing::debug!("[{source}] no token, hash already seen, skipped: {}", fp.short());
                    return AdmitResult::DuplicateFingerprint;
                }
                tracing::info!("[{source}] no token, admitted by hash: {}", fp.short());
                self.store.record_fingerprint(fp);
            }
        }

        self.pages.push(CommentablePage::new(candidate));
        AdmitResult::Admitted
    }

    /// Admitted pages in arrival order.
    pub fn pages(&self) -> &[CommentablePage] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    pub fn into_pages(self) -> Vec<CommentablePage> {
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(cursor: Option<&str>, has_next: bool, body: &str) -> Value {
        json!({
            "id": "Q29tbWVudGFibGUtMQ==",
            "comments": {
                "edges": [{"node": {"id": format!("c-{body}"), "body": body}}],
                "pageInfo": {"hasNextPage": has_next, "endCursor": cursor}
            }
        })
    }

    #[test]
    fn test_same_payload_twice_is_admitted_once() {
        let mut acceptor = PageAcceptor::new();
        let p = page(Some("A"), true, "hello");
        assert_eq!(acceptor.try_admit(p.clone(), CaptureSource::Observer), AdmitResult::Admitted);
        assert_eq!(
            acceptor.try_admit(p, CaptureSource::Interaction),
            AdmitResult::DuplicateFingerprint
        );
        assert_eq!(acceptor.len(), 1);
    }

    #[test]
    fn test_repeated_token_with_new_content_is_recovered() {
        let mut acceptor = PageAcceptor::new();
        assert!(acceptor
            .try_admit(page(Some("A"), true, "one"), CaptureSource::Observer)
            .is_admitted());
        assert!(acceptor
            .try_admit(page(Some("A"), true, "two"), CaptureSource::Observer)
            .is_admitted());
        assert_eq!(acceptor.len(), 2);
        assert_eq!(acceptor.store().token_count(), 1);
        assert_eq!(acceptor.store().fingerprint_count(), 2);
    }

    #[test]
    fn test_strict_policy_rejects_repeated_token() {
        let mut acceptor = PageAcceptor::with_policy(TokenCollisionPolicy::Strict);
        acceptor.try_admit(page(Some("A"), true, "one"), CaptureSource::Observer);
        assert_eq!(
            acceptor.try_admit(page(Some("A"), true, "two"), CaptureSource::Observer),
            AdmitResult::DuplicateToken
        );
        assert_eq!(acceptor.len(), 1);
    }

    #[test]
    fn test_tokenless_pages_dedup_by_fingerprint_only() {
        let mut acceptor = PageAcceptor::new();
        assert!(acceptor
            .try_admit(page(None, false, "x"), CaptureSource::Observer)
            .is_admitted());
        assert!(acceptor
            .try_admit(page(Some("   "), false, "y"), CaptureSource::Observer)
            .is_admitted());
        assert_eq!(
            acceptor.try_admit(page(None, false, "x"), CaptureSource::Observer),
            AdmitResult::DuplicateFingerprint
        );
        assert_eq!(acceptor.len(), 2);
        assert_eq!(acceptor.store().token_count(), 0);
    }

    #[test]
    fn test_key_order_does_not_defeat_dedup() {
        let mut acceptor = PageAcceptor::new();
        let a: Value = serde_json::from_str(
            r#"{"id":"X","comments":{"pageInfo":{"endCursor":null,"hasNextPage":false},"edges":[]}}"#,
        )
        .unwrap();
        let b: Value = serde_json::from_str(
            r#"{"comments":{"edges":[],"pageInfo":{"hasNextPage":false,"endCursor":null}},"id":"X"}"#,
        )
        .unwrap();
        assert!(acceptor.try_admit(a, CaptureSource::Observer).is_admitted());
        assert_eq!(
            acceptor.try_admit(b, CaptureSource::Interaction),
            AdmitResult::DuplicateFingerprint
        );
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut acceptor = PageAcceptor::new();
        for cursor in ["A", "B", "C"] {
            acceptor.try_admit(page(Some(cursor), true, cursor), CaptureSource::Observer);
        }
        let cursors: Vec<String> = acceptor
            .pages()
            .iter()
            .map(|p| p.page_info().end_cursor.unwrap().to_string())
            .collect();
        assert_eq!(cursors, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Strict".parse::<TokenCollisionPolicy>(), Ok(TokenCollisionPolicy::Strict));
        assert_eq!("recover".parse::<TokenCollisionPolicy>(), Ok(TokenCollisionPolicy::Recover));
        assert!("lenient".parse::<TokenCollisionPolicy>().is_err());
    }
}
