//! Bounded FIFO between the ingest loop and the dispatch loop.
//!
//! Backed by a [`tokio::sync::mpsc`] channel. `enqueue` waits while the
//! queue is full and `dequeue` waits while it is empty. Nothing is ever
//! dropped: a slow dispatch loop stalls ingestion instead.

use tokio::sync::mpsc;

/// Queue capacity used when none is configured.
pub const DEFAULT_FANOUT_CAPACITY: usize = 100;

/// The dispatch side of the queue has been dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fan-out queue closed")]
pub struct FanoutClosed {
    /// The payload that could not be queued.
    pub payload: String,
}

/// Producer half, owned by the ingest loop.
#[derive(Debug)]
pub struct FanoutSender {
    tx: mpsc::Sender<String>,
}

/// Consumer half, owned by the dispatch loop.
#[derive(Debug)]
pub struct FanoutReceiver {
    rx: mpsc::Receiver<String>,
}

/// Create a queue holding at most `capacity` payloads.
///
/// A capacity of zero is raised to one.
pub fn fanout_queue(capacity: usize) -> (FanoutSender, FanoutReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (FanoutSender { tx }, FanoutReceiver { rx })
}

impl FanoutSender {
    /// Append a payload, waiting for space if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutClosed`] only once the receiver has been dropped.
    pub async fn enqueue(&self, payload: String) -> Result<(), FanoutClosed> {
        self.tx
            .send(payload)
            .await
            .map_err(|e| FanoutClosed { payload: e.0 })
    }

    /// Free slots left before `enqueue` starts to wait.
    pub fn remaining(&self) -> usize {
        self.tx.capacity()
    }
}

impl FanoutReceiver {
    /// Take the oldest payload, waiting while the queue is empty.
    ///
    /// Returns `None` once the sender is dropped and the queue is drained.
    pub async fn dequeue(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Number of payloads currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
