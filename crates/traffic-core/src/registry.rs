//! The set of currently connected delivery targets.
//!
//! Membership changes and the iterate-and-prune pass of a dispatch cycle
//! all happen under one mutex, so a target can never be added or removed
//! while a cycle is walking the set. A target whose send fails is removed
//! before the lock is released and is never tried again.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::DeliveryError;

/// Identity of one registered target, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(Uuid);

impl TargetId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A recipient of the raw message fan-out.
pub trait DeliveryTarget: Send {
    /// Human-readable peer identity for logs (usually a socket address).
    fn peer(&self) -> &str;

    /// Send one payload verbatim.
    ///
    /// An error means the target is gone; the registry drops it.
    fn send(&mut self, payload: &str) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Result of one [`DeliveryRegistry::deliver`] cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Number of targets that accepted the payload.
    pub delivered: usize,
    /// Targets removed because their send failed.
    pub pruned: Vec<TargetId>,
}

/// Mutex-guarded registry of delivery targets.
///
/// Shared as `Arc<DeliveryRegistry<T>>` between connection handlers, which
/// register and unregister, and the dispatch loop, which delivers.
#[derive(Debug)]
pub struct DeliveryRegistry<T> {
    targets: Mutex<BTreeMap<TargetId, T>>,
}

impl<T> Default for DeliveryRegistry<T> {
    fn default() -> Self {
        Self {
            targets: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<T: DeliveryTarget> DeliveryRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target. It receives every payload from the next cycle on.
    pub async fn register(&self, target: T) -> TargetId {
        let id = TargetId::new();
        self.targets.lock().await.insert(id, target);
        id
    }

    /// Remove a target. Returns `false` if it was already gone.
    pub async fn unregister(&self, id: TargetId) -> bool {
        self.targets.lock().await.remove(&id).is_some()
    }

    /// Number of registered targets.
    pub async fn len(&self) -> usize {
        self.targets.lock().await.len()
    }

    /// True when no targets are registered.
    pub async fn is_empty(&self) -> bool {
        self.targets.lock().await.is_empty()
    }

    /// Send `payload` to every registered target and prune the ones that fail.
    ///
    /// The lock is held for the whole pass. One failing target does not stop
    /// delivery to the rest. With `send_timeout` set, a send that does not
    /// finish in time counts as a failure.
    pub async fn deliver(&self, payload: &str, send_timeout: Option<Duration>) -> DeliveryReport {
        let mut targets = self.targets.lock().await;
        let mut report = DeliveryReport::default();

        for (id, target) in targets.iter_mut() {
            let result = match send_timeout {
                Some(limit) => tokio::time::timeout(limit, target.send(payload))
                    .await
                    .unwrap_or_else(|_| {
                        Err(DeliveryError::Timeout {
                            timeout_ms: limit.as_millis(),
                        })
                    }),
                None => target.send(payload).await,
            };

            match result {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(e) => {
                    debug!(
                        target_id = %id,
                        peer = target.peer(),
                        error = %e,
                        "Delivery failed, removing target"
                    );
                    report.pruned.push(*id);
                }
            }
        }

        for id in &report.pruned {
            targets.remove(id);
        }

        report
    }
}
