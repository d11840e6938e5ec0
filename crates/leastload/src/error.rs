//! Error types for the dispatch core.
//!
//! This module defines the central `Error` enum, which captures every
//! reportable failure of the pool, the worker queues and the arbitration loop.
//!
//! ## Error Cases
//! - `PoolExhausted`: extract-min on an empty pool. Fatal to the loop; it
//!   indicates a lifecycle bug since workers are never removed permanently.
//! - `ChannelError`: a worker queue or internal channel closed unexpectedly.
//! - `ReplyDropped`: a work item's reply was dropped without a value.
//! - `ServiceShutdown`: work was submitted after the balancer stopped.
//! - `InvalidConfig`: the configuration failed validation.
//! - `InvariantViolation`: heap order, position bookkeeping or load
//!   conservation no longer hold.
//! - `UnknownWorker` / `LoadUnderflow`: pool bookkeeping was misused.

use crate::pool::WorkerId;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the dispatch core.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Extract-min was called on a pool with no workers in it.
    #[error("Worker pool is exhausted")]
    PoolExhausted,

    /// Internal channel send/receive failure (e.g., a closed worker queue).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The reply sender was dropped before a value was written.
    #[error("Reply dropped before a result was produced")]
    ReplyDropped,

    /// The balancer is no longer accepting work.
    #[error("Balancer is shutting down")]
    ServiceShutdown,

    /// The configuration was rejected.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// A structural check on the pool or the counters failed.
    #[error("Invariant violated: {reason}")]
    InvariantViolation { reason: String },

    /// The worker id does not belong to this pool.
    #[error("Unknown worker {0}")]
    UnknownWorker(WorkerId),

    /// A completion arrived for a worker with no pending work.
    #[error("Load underflow on worker {0}")]
    LoadUnderflow(WorkerId),
}
