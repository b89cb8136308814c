//! The ingest loop: source -> fan-out queue + aggregate store.
//!
//! The loop subscribes once and then consumes the source until it closes.
//! Every payload is queued for delivery before it is merged, and queued
//! even when it fails to parse, so streaming clients see the raw channel
//! while the snapshot only ever reflects well-formed messages.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::SourceError;
use crate::fanout::FanoutSender;
use crate::snapshot::{AggregateStore, MergeOutcome, TrafficMessage};

/// An ordered stream of raw text payloads from a pub/sub channel.
pub trait MessageSource: Send {
    /// Name of the channel, for logs.
    fn channel(&self) -> &str;

    /// Subscribe and wait for the source to confirm.
    fn subscribe(&mut self) -> impl Future<Output = Result<(), SourceError>> + Send;

    /// The next payload, or `None` once the source has closed.
    fn next_message(&mut self) -> impl Future<Output = Option<String>> + Send;
}

/// How the ingest loop ended.
#[derive(Debug)]
pub enum IngestOutcome {
    /// The subscription was never confirmed; nothing was consumed.
    SubscribeFailed(SourceError),
    /// The source closed after delivering some messages.
    SourceClosed {
        /// Messages received from the source.
        received: u64,
        /// Messages that were forwarded but could not be merged.
        parse_failures: u64,
    },
}

/// Consumes a [`MessageSource`], feeding the fan-out queue and the store.
pub struct IngestLoop<S> {
    source: S,
    store: Arc<AggregateStore>,
    queue: FanoutSender,
}

impl<S: MessageSource> IngestLoop<S> {
    /// Build an ingest loop over `source`.
    pub const fn new(source: S, store: Arc<AggregateStore>, queue: FanoutSender) -> Self {
        Self {
            source,
            store,
            queue,
        }
    }

    /// Run until the source closes or the subscription fails.
    ///
    /// The queue sender is dropped on return, so the dispatch loop drains
    /// what is left and stops.
    pub async fn run(mut self) -> IngestOutcome {
        let channel = self.source.channel().to_owned();

        if let Err(e) = self.source.subscribe().await {
            error!(channel, error = %e, "Subscription failed, ingest loop stopped");
            return IngestOutcome::SubscribeFailed(e);
        }
        info!(channel, "Subscribed");

        let mut received: u64 = 0;
        let mut parse_failures: u64 = 0;
        let mut delivery_open = true;

        while let Some(payload) = self.source.next_message().await {
            received = received.saturating_add(1);
            let parsed = TrafficMessage::parse(&payload);

            if delivery_open && self.queue.enqueue(payload).await.is_err() {
                warn!(channel, "Fan-out queue closed, continuing without delivery");
                delivery_open = false;
            }

            let message = match parsed {
                Ok(message) => message,
                Err(e) => {
                    parse_failures = parse_failures.saturating_add(1);
                    debug!(channel, error = %e, "Failed to decode traffic payload");
                    continue;
                }
            };

            let timestamp = message.timestamp;
            let incoming_count = message.packet_count;
            let incoming_packets = message.packets.len();
            let outcome = self.store.merge(message).await;

            match outcome {
                MergeOutcome::Accumulated => {
                    debug!(
                        timestamp,
                        packet_count = incoming_count,
                        packets = incoming_packets,
                        "Accumulated"
                    );
                }
                MergeOutcome::Replaced { previous } if outcome.is_regression(timestamp) => {
                    warn!(timestamp, previous, "Timestamp moved backwards, snapshot replaced");
                }
                MergeOutcome::Replaced { previous } => {
                    debug!(
                        timestamp,
                        previous,
                        packet_count = incoming_count,
                        packets = incoming_packets,
                        "Replaced"
                    );
                }
            }
        }

        info!(channel, received, parse_failures, "Message source closed");
        IngestOutcome::SourceClosed {
            received,
            parse_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::fanout::fanout_queue;
    use crate::snapshot::Snapshot;

    struct ScriptedSource {
        messages: VecDeque<String>,
        reject_subscribe: bool,
    }

    impl ScriptedSource {
        fn new(messages: &[&str]) -> Self {
            Self {
                messages: messages.iter().map(|m| (*m).to_owned()).collect(),
                reject_subscribe: false,
            }
        }
    }

    impl MessageSource for ScriptedSource {
        fn channel(&self) -> &str {
            "traffic_channel"
        }

        async fn subscribe(&mut self) -> Result<(), SourceError> {
            if self.reject_subscribe {
                return Err(SourceError::Subscribe {
                    channel: "traffic_channel".to_owned(),
                    message: "connection refused".to_owned(),
                });
            }
            Ok(())
        }

        async fn next_message(&mut self) -> Option<String> {
            self.messages.pop_front()
        }
    }

    const FIRST: &str = r#"{"timestamp": 5, "packet_count": 1, "packets": [{"id": 1}]}"#;
    const SECOND: &str = r#"{"timestamp": 5, "packet_count": 1, "packets": [{"id": 2}]}"#;

    #[tokio::test]
    async fn subscribe_failure_stops_before_consuming() {
        let mut source = ScriptedSource::new(&[FIRST]);
        source.reject_subscribe = true;
        let store = Arc::new(AggregateStore::new());
        let (tx, mut rx) = fanout_queue(4);

        let outcome = IngestLoop::new(source, Arc::clone(&store), tx).run().await;

        assert!(matches!(outcome, IngestOutcome::SubscribeFailed(_)));
        assert_eq!(rx.dequeue().await, None);
        assert_eq!(store.read().await, Snapshot::empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_forwarded_but_not_merged() {
        let source = ScriptedSource::new(&[FIRST, "{not json", SECOND]);
        let store = Arc::new(AggregateStore::new());
        let (tx, mut rx) = fanout_queue(8);

        let outcome = IngestLoop::new(source, Arc::clone(&store), tx).run().await;

        assert!(matches!(
            outcome,
            IngestOutcome::SourceClosed { received: 3, parse_failures: 1 }
        ));
        assert_eq!(rx.dequeue().await.as_deref(), Some(FIRST));
        assert_eq!(rx.dequeue().await.as_deref(), Some("{not json"));
        assert_eq!(rx.dequeue().await.as_deref(), Some(SECOND));
        assert_eq!(rx.dequeue().await, None);

        let snap = store.read().await;
        assert_eq!(snap.timestamp, 5);
        assert_eq!(snap.packet_count, 2);
        assert_eq!(snap.packets, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[tokio::test]
    async fn full_queue_throttles_ingestion() {
        let third = r#"{"timestamp": 6, "packet_count": 0, "packets": []}"#;
        let source = ScriptedSource::new(&[FIRST, SECOND, third]);
        let store = Arc::new(AggregateStore::new());
        let (tx, mut rx) = fanout_queue(1);

        let ingest = tokio::spawn(IngestLoop::new(source, Arc::clone(&store), tx).run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!ingest.is_finished());
        assert_eq!(store.read().await.packet_count, 1);

        let mut forwarded = Vec::new();
        while let Some(payload) = rx.dequeue().await {
            forwarded.push(payload);
        }
        let outcome = ingest.await.unwrap();

        assert!(matches!(outcome, IngestOutcome::SourceClosed { received: 3, .. }));
        assert_eq!(forwarded, vec![FIRST, SECOND, third]);
        assert_eq!(store.read().await.timestamp, 6);
    }

    #[tokio::test]
    async fn closed_queue_does_not_stop_aggregation() {
        let source = ScriptedSource::new(&[FIRST, SECOND]);
        let store = Arc::new(AggregateStore::new());
        let (tx, rx) = fanout_queue(1);
        drop(rx);

        let outcome = IngestLoop::new(source, Arc::clone(&store), tx).run().await;

        assert!(matches!(
            outcome,
            IngestOutcome::SourceClosed {
                received: 2,
                parse_failures: 0
            }
        ));
        assert_eq!(store.read().await.packet_count, 2);
    }
}
