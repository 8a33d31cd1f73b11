//! Passive capture path: every network response of the session is checked
//! and matching comment pages are submitted for admission.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::admission::AdmissionHandle;
use crate::payload::{extract_commentable, PayloadError};
use crate::types::{AdmitResult, CaptureSource, NetworkResponse};

/// Which responses belong to the comment API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFilter {
    path: String,
}

impl ApiFilter {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// URL contains the API path and the status is 2xx.
    pub fn matches(&self, response: &NetworkResponse) -> bool {
        response.url.contains(&self.path) && (200..300).contains(&response.status)
    }
}

/// What the observer did with one response.
#[derive(Debug)]
pub enum Observation {
    /// Not an API response, or not a success.
    Unrelated,
    /// An API response whose body was unavailable or not a comment page.
    Malformed(String),
    /// Submitted for admission.
    Submitted(AdmitResult),
    /// A valid page that could not be submitted because admission had closed.
    Unavailable(String),
}

/// Running counters for the passive path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverStats {
    pub seen: u64,
    pub matched: u64,
    pub admitted: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub unavailable: u64,
    pub lagged: u64,
}

pub struct ResponseObserver {
    filter: ApiFilter,
    admission: AdmissionHandle,
    stats: ObserverStats,
}

impl ResponseObserver {
    pub fn new(filter: ApiFilter, admission: AdmissionHandle) -> Self {
        Self {
            filter,
            admission,
            stats: ObserverStats::default(),
        }
    }

    /// Inspect one response. Never fails: problems are logged and counted.
    pub async fn observe(&mut self, response: &NetworkResponse) -> Observation {
        self.stats.seen += 1;
        if !self.filter.matches(response) {
            return Observation::Unrelated;
        }
        self.stats.matched += 1;

        let Some(body) = response.body.as_deref() else {
            self.stats.malformed += 1;
            tracing::debug!("[observer] no decodable body for {}", response.url);
            return Observation::Malformed("body unavailable".into());
        };

        let commentable = match extract_commentable(body) {
            Ok(c) => c,
            Err(e) => {
                self.stats.malformed += 1;
                match e {
                    PayloadError::MissingCommentable => {
                        tracing::debug!("[observer] {} carries no commentable, ignored", response.url)
                    }
                    ref other => tracing::warn!("[observer] unusable body from {}: {other}", response.url),
                }
                return Observation::Malformed(e.to_string());
            }
        };

        match self.admission.admit(commentable, CaptureSource::Observer).await {
            Ok(result) => {
                if result.is_admitted() {
                    self.stats.admitted += 1;
                } else {
                    self.stats.duplicates += 1;
                }
                Observation::Submitted(result)
            }
            Err(e) => {
                self.stats.unavailable += 1;
                tracing::warn!("[observer] admission unavailable: {e}");
                Observation::Unavailable(e.to_string())
            }
        }
    }

    /// Consume the response stream until the page closes it.
    pub async fn run(mut self, mut responses: broadcast::Receiver<NetworkResponse>) -> ObserverStats {
        loop {
            match responses.recv().await {
                Ok(response) => {
                    self.observe(&response).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    self.stats.lagged += skipped;
                    tracing::warn!("[observer] fell behind, {skipped} responses skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("[observer] stream closed: {:?}", self.stats);
        self.stats
    }

    pub fn stats(&self) -> ObserverStats {
        self.stats
    }
}
