//! In-process filtering for collection scans.
//!
//! The table is read in full (in the requested order) and each payload is
//! decoded and handed to the query matcher. Rows are pumped by a spawned task
//! into a channel of capacity 1, so the producer never runs more than a row
//! ahead of the consumer. The task, and with it the cursor and the pooled
//! connection, ends as soon as the limit is reached or something fails, and
//! also when the consumer goes away even if no row has matched since.

use std::sync::Arc;

use futures::{stream, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::document::{Document, DocumentCodec};
use crate::matcher::QueryMatcher;

use super::interface::{DocumentStream, Error, Operation, Result};

/// Tracks how many matches were seen and which of them are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWindow {
    skip: u64,
    limit: Option<u64>,
    matched: u64,
    returned: u64,
}

impl MatchWindow {
    /// Negative `skip` is the same as 0; a `limit` of 0 or less is unbounded
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip: skip.max(0) as u64,
            limit: (limit > 0).then_some(limit as u64),
            matched: 0,
            returned: 0,
        }
    }

    /// Count one more matching document; true if it should be returned
    pub fn admit(&mut self) -> bool {
        self.matched += 1;
        if self.matched <= self.skip || self.is_exhausted() {
            return false;
        }
        self.returned += 1;
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.returned >= limit)
    }
}

/// Everything the producer task needs besides the rows themselves
pub(crate) struct ScanTask {
    pub query: Document,
    pub codec: Arc<dyn DocumentCodec>,
    pub matcher: Arc<dyn QueryMatcher>,
    pub window: MatchWindow,
    pub target: String,
    pub interpret_error: fn(sqlx::Error, Operation, &str) -> Error,
}

/// Open a channel for a scan; the receiving half becomes the caller's stream.
pub(crate) fn channel() -> (mpsc::Sender<Result<Document>>, DocumentStream) {
    let (tx, rx) = mpsc::channel(1);
    let documents = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    (tx, Box::pin(documents))
}

/// Feed matching documents from `payloads` into `tx`.
pub(crate) async fn forward_matches<S>(
    mut payloads: S,
    mut task: ScanTask,
    tx: mpsc::Sender<Result<Document>>,
) where
    S: Stream<Item = Result<String, sqlx::Error>> + Unpin + Send,
{
    pump(&mut payloads, &mut task, &tx).await;

    // Close the cursor before the consumer sees the end of the stream
    drop(payloads);
    drop(tx);
}

async fn pump<S>(payloads: &mut S, task: &mut ScanTask, tx: &mpsc::Sender<Result<Document>>)
where
    S: Stream<Item = Result<String, sqlx::Error>> + Unpin + Send,
{
    let mut rows = 0u64;

    loop {
        // Non-matching rows are never sent, so watch the consumer separately
        let payload = tokio::select! {
            biased;
            _ = tx.closed() => {
                debug!("Scan of {} abandoned after {rows} row(s)", task.target);
                return;
            }
            payload = payloads.next() => payload,
        };
        let Some(payload) = payload else {
            break;
        };
        rows += 1;

        let document = match payload {
            Ok(payload) => task.codec.decode(&payload).map_err(|source| {
                Error::Serialization {
                    operation: Operation::Scan,
                    target: task.target.clone(),
                    source,
                }
            }),
            Err(error) => Err((task.interpret_error)(error, Operation::Scan, &task.target)),
        };

        let document = match document {
            Ok(document) => document,
            Err(error) => {
                warn!("Scan of {} failed after {rows} row(s): {error}", task.target);
                let _ = tx.send(Err(error)).await;
                return;
            }
        };

        if !task.matcher.matches(&document, &task.query) || !task.window.admit() {
            continue;
        }

        if tx.send(Ok(document)).await.is_err() {
            debug!("Scan of {} abandoned after {rows} row(s)", task.target);
            return;
        }

        if task.window.is_exhausted() {
            debug!("Scan of {} reached its limit after {rows} row(s)", task.target);
            return;
        }
    }

    debug!("Scan of {} finished after {rows} row(s)", task.target);
}
