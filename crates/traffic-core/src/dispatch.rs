//! The dispatch loop: fan-out queue -> every registered target.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::fanout::FanoutReceiver;
use crate::registry::{DeliveryRegistry, DeliveryTarget};

/// Single consumer of the fan-out queue.
///
/// Each dequeued payload is one dispatch cycle: it is sent verbatim to
/// every target registered at that moment, and failed targets are pruned
/// before the next cycle starts.
pub struct DispatchLoop<T> {
    queue: FanoutReceiver,
    registry: Arc<DeliveryRegistry<T>>,
    send_timeout: Option<Duration>,
}

impl<T: DeliveryTarget> DispatchLoop<T> {
    /// Build a dispatch loop with no per-send timeout.
    pub const fn new(queue: FanoutReceiver, registry: Arc<DeliveryRegistry<T>>) -> Self {
        Self {
            queue,
            registry,
            send_timeout: None,
        }
    }

    /// Treat sends that take longer than `timeout` as failures.
    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Run until the queue is closed and drained.
    ///
    /// Returns the number of dispatch cycles completed.
    pub async fn run(mut self) -> u64 {
        let mut cycles: u64 = 0;

        while let Some(payload) = self.queue.dequeue().await {
            let report = self.registry.deliver(&payload, self.send_timeout).await;
            cycles = cycles.saturating_add(1);

            if !report.pruned.is_empty() {
                debug!(
                    delivered = report.delivered,
                    pruned = report.pruned.len(),
                    "Pruned disconnected targets"
                );
            }
        }

        info!(cycles, "Fan-out queue closed, dispatch loop stopped");
        cycles
    }
}
