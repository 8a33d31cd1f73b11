//! Core data types for captured comment pages and harvest errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One captured `commentable` payload: a single page of a comment thread.
///
/// The wrapped JSON is exactly what the API returned under
/// `data.commentable`. There is no mutable accessor; once admitted a page
/// is never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentablePage(Value);

impl CommentablePage {
    pub fn new(payload: Value) -> Self {
        Self(payload)
    }

    /// The opaque commentable identifier, if present.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Comment edges on this page (`comments.edges`).
    pub fn edges(&self) -> &[Value] {
        self.0
            .get("comments")
            .and_then(|c| c.get("edges"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The `comments.pageInfo` record, normalized.
    pub fn page_info(&self) -> PageInfo {
        PageInfo::from_commentable(&self.0)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Normalized `pageInfo { hasNextPage, endCursor }`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<ContinuationToken>,
}

impl PageInfo {
    /// Read `comments.pageInfo` from a commentable object. Missing or
    /// mistyped fields fall back to "no next page" and "no token".
    pub fn from_commentable(commentable: &Value) -> Self {
        let info = commentable
            .get("comments")
            .and_then(|c| c.get("pageInfo"))
            .filter(|v| !v.is_null());

        let Some(info) = info else {
            return Self::default();
        };

        let has_next_page = match info.get("hasNextPage") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => false,
            // Loosely typed upstreams sometimes send 0/1 or strings.
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
        };

        Self {
            has_next_page,
            end_cursor: ContinuationToken::from_cursor(info.get("endCursor")),
        }
    }
}

/// A trimmed, non-empty `endCursor` value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Normalize a raw cursor. Non-strings, null, and whitespace-only strings
    /// all mean "no token".
    pub fn from_cursor(raw: Option<&Value>) -> Option<Self> {
        raw.and_then(Value::as_str).and_then(Self::parse)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex SHA-256 over the canonical JSON form of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub(crate) fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmitResult {
    Admitted,
    DuplicateToken,
    DuplicateFingerprint,
}

impl AdmitResult {
    pub fn is_admitted(self) -> bool {
        matches!(self, AdmitResult::Admitted)
    }
}

/// Which capture path produced a candidate page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    /// Passive observation of background network traffic.
    Observer,
    /// The response correlated with an explicit "load more" interaction.
    Interaction,
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSource::Observer => f.write_str("observer"),
            CaptureSource::Interaction => f.write_str("interaction"),
        }
    }
}

/// A network response as seen by the browsing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkResponse {
    pub url: String,
    pub status: u16,
    /// Decoded body text. `None` when the body was not fetched or could not
    /// be decoded.
    pub body: Option<String>,
}

/// Errors raised by a browsing-automation backend.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("interaction failed: {0}")]
    Interaction(String),

    #[error("browser session lost: {0}")]
    SessionLost(String),
}

impl BrowserError {
    /// Fatal errors mean the browser or page handle can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrowserError::Launch(_) | BrowserError::SessionLost(_))
    }
}

/// Convenience result type for browser operations.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Errors that can occur in the harvest library.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Admission error: {0}")]
    Admission(String),
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;
