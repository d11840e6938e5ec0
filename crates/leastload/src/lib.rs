//! # `leastload`: least-loaded work dispatch
//!
//! `leastload` routes units of work to the least-loaded member of a fixed pool
//! of asynchronous workers, tracks how much each worker still owes, and
//! rebalances as work completes.
//!
//! ## Highlights
//!
//! - **Greedy least-load dispatch**: every item goes to the worker with the
//!   fewest outstanding items at that instant, ties broken by worker id.
//! - **Indexed min-heap**: worker loads live in an arena-backed heap with
//!   logarithmic extract and reinsert.
//! - **Single-writer arbitration**: one loop owns all bookkeeping; workers and
//!   generators only talk to it through channels.
//! - **Explicit backpressure**: a worker queue of capacity `0` turns every
//!   dispatch into a synchronous handoff.
//! - **Panic-safe workers**: a panicking operation still reports completion,
//!   so its worker is never starved by stale load.
//!
//! ## Usage
//!
//! ```rust
//! use leastload::{Balancer, Config, StopReason};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> leastload::Result<()> {
//! let config = Config::builder().workers(2).queue_capacity(4).build()?;
//! let (intake, balancer) = Balancer::new(config)?;
//! let running = tokio::spawn(balancer.run());
//!
//! let reply = intake.submit(|| 6 * 7).await?;
//! assert_eq!(reply.await?, 42);
//!
//! // Closing the intake drains the balancer.
//! drop(intake);
//! let report = running.await.expect("balancer task")?;
//! assert_eq!(report.reason, StopReason::Drained);
//! assert_eq!(report.completed, 1);
//! # Ok(())
//! # }
//! ```

mod balancer;
mod config;
mod error;
mod item;
mod pool;
mod queue;
mod stats;
mod worker;

pub use crate::balancer::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::item::*;
pub use crate::pool::*;
pub use crate::stats::*;
pub use crate::worker::*;
