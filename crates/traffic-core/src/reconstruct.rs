//! Best-effort warm start of the aggregate store.
//!
//! Before the ingest loop starts, the store is seeded from the search index:
//! find the newest timestamp, fetch every record stored under it, and fold
//! them into one [`Snapshot`]. Any failure along the way yields
//! [`Reconstruction::Fallback`] and the process starts from the empty
//! snapshot. No step is retried.

use std::fmt;
use std::future::Future;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::snapshot::{AggregateStore, Snapshot};

/// Query interface over the stored packet records.
pub trait LatestIndex: Send + Sync {
    /// Error type reported by the backing store.
    type Error: fmt::Display + Send;

    /// Create the index if it does not exist yet.
    fn ensure_index(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// The largest indexed timestamp, or `None` if the index is empty.
    fn max_timestamp(&self) -> impl Future<Output = Result<Option<i64>, Self::Error>> + Send;

    /// Every record stored under `timestamp`.
    fn records_at(
        &self,
        timestamp: i64,
    ) -> impl Future<Output = Result<Vec<Value>, Self::Error>> + Send;
}

/// Outcome of [`reconstruct`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reconstruction {
    /// The snapshot was rebuilt from the index.
    Reconstructed(Snapshot),
    /// Reconstruction was abandoned for the given reason.
    Fallback(String),
}

impl Reconstruction {
    /// The snapshot to start from: the rebuilt one, or the empty snapshot.
    pub fn into_snapshot(self) -> Snapshot {
        match self {
            Self::Reconstructed(snapshot) => snapshot,
            Self::Fallback(_) => Snapshot::empty(),
        }
    }

    /// Write the starting snapshot into `store`.
    pub async fn install(self, store: &AggregateStore) {
        store.replace(self.into_snapshot()).await;
    }
}

/// Rebuild the latest snapshot from `index`.
pub async fn reconstruct<I: LatestIndex>(index: &I) -> Reconstruction {
    if let Err(e) = index.ensure_index().await {
        warn!(error = %e, "Failed to prepare packet index, starting empty");
        return Reconstruction::Fallback(format!("index unavailable: {e}"));
    }

    let timestamp = match index.max_timestamp().await {
        Ok(Some(timestamp)) => timestamp,
        Ok(None) => {
            info!("No packets indexed, starting empty");
            return Reconstruction::Fallback(String::from("no indexed records"));
        }
        Err(e) => {
            warn!(error = %e, "Failed to find latest timestamp, starting empty");
            return Reconstruction::Fallback(format!("max timestamp query failed: {e}"));
        }
    };
    debug!(timestamp, "Latest indexed timestamp");

    let packets = match index.records_at(timestamp).await {
        Ok(packets) => packets,
        Err(e) => {
            warn!(timestamp, error = %e, "Failed to fetch latest packets, starting empty");
            return Reconstruction::Fallback(format!("record query failed: {e}"));
        }
    };

    let packet_count = i64::try_from(packets.len()).unwrap_or(i64::MAX);
    info!(timestamp, packet_count, "Reconstructed latest snapshot");

    Reconstruction::Reconstructed(Snapshot {
        timestamp,
        packet_count,
        packets,
    })
}
