//! Ingest, aggregate and fan-out pipeline for the traffic monitor backend.
//!
//! Traffic summaries arrive as raw JSON text on a pub/sub channel. Each
//! payload is forwarded verbatim to every connected streaming client and,
//! when it parses, folded into a single rolling "latest" snapshot that
//! pull-based readers can query at any time.
//!
//! # Architecture
//!
//! ```text
//! MessageSource --> IngestLoop --+--> AggregateStore (merge)   <-- snapshot readers
//!                                |
//!                                +--> fan-out queue (bounded)
//!                                          |
//!                                     DispatchLoop --> DeliveryRegistry --> targets
//! ```
//!
//! The [`AggregateStore`] and the [`DeliveryRegistry`] each sit behind their
//! own lock and no code path holds both. The fan-out queue is bounded: once
//! it is full the ingest loop waits for the dispatch loop, so slow delivery
//! throttles consumption of the source.
//!
//! # Modules
//!
//! - [`snapshot`] -- [`Snapshot`], [`TrafficMessage`] and the [`AggregateStore`]
//! - [`registry`] -- [`DeliveryTarget`] trait and the [`DeliveryRegistry`]
//! - [`fanout`] -- bounded FIFO between ingestion and delivery
//! - [`ingest`] -- [`MessageSource`] trait and the [`IngestLoop`]
//! - [`dispatch`] -- the [`DispatchLoop`]
//! - [`reconstruct`] -- best-effort warm start from a [`LatestIndex`]
//! - [`error`] -- shared error types

pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod ingest;
pub mod reconstruct;
pub mod registry;
pub mod snapshot;

// Re-export primary types for convenience.
pub use dispatch::DispatchLoop;
pub use error::{DeliveryError, SourceError};
pub use fanout::{DEFAULT_FANOUT_CAPACITY, FanoutClosed, FanoutReceiver, FanoutSender, fanout_queue};
pub use ingest::{IngestLoop, IngestOutcome, MessageSource};
pub use reconstruct::{LatestIndex, Reconstruction, reconstruct};
pub use registry::{DeliveryRegistry, DeliveryReport, DeliveryTarget, TargetId};
pub use snapshot::{AggregateStore, MergeOutcome, Snapshot, TrafficMessage};
