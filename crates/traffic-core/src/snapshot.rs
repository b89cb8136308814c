//! The rolling "latest" snapshot and the store that guards it.
//!
//! A [`Snapshot`] covers a single timestamp bucket. Messages for the same
//! bucket accumulate into it; a message for any other bucket replaces it
//! wholesale. The [`AggregateStore`] wraps the snapshot in a read-write lock
//! so any number of readers can copy it while the single ingest task is the
//! only writer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

/// The aggregate view of the most recent timestamp bucket.
///
/// `packet_count` and `packets` are maintained independently: the count is
/// whatever the publishers reported, the list is whatever they sent. They
/// agree only as long as every publisher reports its own packet count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Logical time bucket of the aggregate.
    pub timestamp: i64,
    /// Number of packets folded into this snapshot.
    pub packet_count: i64,
    /// Packet records in arrival order.
    pub packets: Vec<Value>,
}

impl Snapshot {
    /// The empty snapshot used at startup when no warm start is possible.
    pub const fn empty() -> Self {
        Self {
            timestamp: 0,
            packet_count: 0,
            packets: Vec::new(),
        }
    }
}

/// One decoded message from the traffic channel.
///
/// Missing fields decode to zero or empty, and `"packets": null` decodes to
/// an empty list, so only payloads that are not a JSON object of the right
/// shape fail to parse.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrafficMessage {
    /// Logical time bucket the packets belong to.
    pub timestamp: i64,
    /// Number of packets the publisher reports.
    pub packet_count: i64,
    /// The packet records themselves.
    #[serde(deserialize_with = "null_as_empty")]
    pub packets: Vec<Value>,
}

impl TrafficMessage {
    /// Decode a raw payload from the channel.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if the payload is not a valid
    /// traffic message.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

impl From<TrafficMessage> for Snapshot {
    fn from(message: TrafficMessage) -> Self {
        Self {
            timestamp: message.timestamp,
            packet_count: message.packet_count,
            packets: message.packets,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// What a [`AggregateStore::merge`] did to the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Same timestamp: count and packets were appended.
    Accumulated,
    /// Different timestamp: the snapshot was overwritten.
    Replaced {
        /// The timestamp that was discarded.
        previous: i64,
    },
}

impl MergeOutcome {
    /// True when a replacement moved the snapshot to an older bucket.
    pub const fn is_regression(self, incoming: i64) -> bool {
        match self {
            Self::Accumulated => false,
            Self::Replaced { previous } => incoming < previous,
        }
    }
}

/// Lock-guarded owner of the current [`Snapshot`].
///
/// Shared as `Arc<AggregateStore>` between the ingest loop (writer) and the
/// snapshot read endpoint (readers).
#[derive(Debug, Default)]
pub struct AggregateStore {
    snapshot: RwLock<Snapshot>,
}

impl AggregateStore {
    /// Create a store holding the empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Return a consistent copy of the current snapshot.
    pub async fn read(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Fold one message into the snapshot.
    ///
    /// Equal timestamps accumulate; any other timestamp, older ones
    /// included, replaces the snapshot with the message verbatim.
    pub async fn merge(&self, message: TrafficMessage) -> MergeOutcome {
        let mut current = self.snapshot.write().await;
        if message.timestamp == current.timestamp {
            current.packet_count = current.packet_count.saturating_add(message.packet_count);
            current.packets.extend(message.packets);
            MergeOutcome::Accumulated
        } else {
            let previous = current.timestamp;
            *current = Snapshot::from(message);
            MergeOutcome::Replaced { previous }
        }
    }

    /// Overwrite the snapshot. Used by startup reconstruction only.
    pub async fn replace(&self, snapshot: Snapshot) {
        *self.snapshot.write().await = snapshot;
    }
}
