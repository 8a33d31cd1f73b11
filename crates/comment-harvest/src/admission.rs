//! Serialized admission point shared by both capture paths.
//!
//! A single task owns the [`PageAcceptor`]. The observer and the controller
//! hold cloned [`AdmissionHandle`]s and submit candidates over a channel, so
//! every admission runs to completion before the next one starts.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::acceptor::{PageAcceptor, TokenCollisionPolicy};
use crate::types::{AdmitResult, CaptureSource, CommentablePage, HarvestError, HarvestResult};

const QUEUE_DEPTH: usize = 64;

enum Command {
    Admit {
        candidate: Value,
        source: CaptureSource,
        reply: oneshot::Sender<AdmitResult>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
    Close {
        reply: oneshot::Sender<Vec<CommentablePage>>,
    },
}

/// Owner side of the admission task.
pub struct AdmissionDesk {
    tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl AdmissionDesk {
    /// Spawn the admission task on the current tokio runtime.
    pub fn spawn(policy: TokenCollisionPolicy) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let task = tokio::spawn(serve(PageAcceptor::with_policy(policy), rx));
        Self { tx, task }
    }

    pub fn handle(&self) -> AdmissionHandle {
        AdmissionHandle {
            tx: self.tx.clone(),
        }
    }

    /// Stop accepting and return the collection in admission order.
    ///
    /// Submissions that arrive after this call fail with
    /// [`HarvestError::Admission`].
    pub async fn finish(self) -> HarvestResult<Vec<CommentablePage>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Close { reply })
            .await
            .map_err(|_| HarvestError::Admission("admission task stopped early".into()))?;
        let pages = rx
            .await
            .map_err(|_| HarvestError::Admission("admission task dropped the collection".into()))?;
        if let Err(e) = self.task.await {
            tracing::warn!("admission task did not shut down cleanly: {e}");
        }
        Ok(pages)
    }
}

/// Cloneable submitter used by the observer and the controller.
#[derive(Clone)]
pub struct AdmissionHandle {
    tx: mpsc::Sender<Command>,
}

impl AdmissionHandle {
    pub async fn admit(&self, candidate: Value, source: CaptureSource) -> HarvestResult<AdmitResult> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Admit {
                candidate,
                source,
                reply,
            })
            .await
            .map_err(|_| HarvestError::Admission("admission closed".into()))?;
        rx.await
            .map_err(|_| HarvestError::Admission("admission closed before replying".into()))
    }

    /// Number of pages admitted so far.
    pub async fn admitted(&self) -> HarvestResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Count { reply })
            .await
            .map_err(|_| HarvestError::Admission("admission closed".into()))?;
        rx.await
            .map_err(|_| HarvestError::Admission("admission closed before replying".into()))
    }
}

async fn serve(mut acceptor: PageAcceptor, mut rx: mpsc::Receiver<Command>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Admit {
                candidate,
                source,
                reply,
            } => {
                let result = acceptor.try_admit(candidate, source);
                let _ = reply.send(result);
            }
            Command::Count { reply } => {
                let _ = reply.send(acceptor.len());
            }
            Command::Close { reply } => {
                let _ = reply.send(acceptor.into_pages());
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(cursor: &str) -> Value {
        json!({
            "id": "T",
            "comments": {"edges": [], "pageInfo": {"hasNextPage": true, "endCursor": cursor}}
        })
    }

    #[tokio::test]
    async fn test_concurrent_submitters_admit_once() {
        let desk = AdmissionDesk::spawn(TokenCollisionPolicy::Recover);
        let mut tasks = Vec::new();
        for i in 0..16 {
            let handle = desk.handle();
            let source = if i % 2 == 0 {
                CaptureSource::Observer
            } else {
                CaptureSource::Interaction
            };
            tasks.push(tokio::spawn(async move { handle.admit(page("A"), source).await }));
        }
        let mut admitted = 0;
        for t in tasks {
            if t.await.unwrap().unwrap().is_admitted() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(desk.handle().admitted().await.unwrap(), 1);
        assert_eq!(desk.finish().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_after_finish_fails() {
        let desk = AdmissionDesk::spawn(TokenCollisionPolicy::Recover);
        let handle = desk.handle();
        handle.admit(page("A"), CaptureSource::Observer).await.unwrap();
        let pages = desk.finish().await.unwrap();
        assert_eq!(pages.len(), 1);
        assert!(handle.admit(page("B"), CaptureSource::Observer).await.is_err());
    }
}
