//! The arbitration loop.
//!
//! This module defines the [`Balancer`], which owns the [`Pool`] and a fixed
//! set of worker tasks. A single loop multiplexes two event sources, new work
//! on the shared intake and completion reports from workers, and keeps the
//! pool ordered by each worker's outstanding load:
//!
//! - On intake, the least-loaded worker is extracted, handed the item, charged
//!   one more pending item, and reinserted.
//! - On completion, the reporting worker's load drops by one and its heap
//!   position is restored.
//!
//! Only this loop touches the pool, so it needs no locking. Workers and
//! generators talk to it exclusively through channels.
//!
//! ## Backpressure
//!
//! Handing an item to a worker whose queue is full suspends the whole loop
//! until that worker takes something off its queue. No intake or completion is
//! processed meanwhile. This is the intended coupling between dispatch and
//! worker queue capacity: the pool stalls instead of buffering without bound.
//!
//! ## Shutdown
//!
//! The loop stops according to the configured [`ShutdownPolicy`], or when its
//! [`CancellationToken`] fires. Cancellation is observed between events, never
//! in the middle of a handoff. On stop every worker queue is closed; workers
//! finish what they already hold and exit on their own.

mod intake;

pub use intake::Intake;

use crate::{
    config::{Config, ShutdownPolicy},
    error::{Error, Result},
    item::WorkItem,
    pool::{Pool, WorkerId},
    queue::{self, QueueSender},
    stats::{Report, Stats, StopReason, WorkerReport},
    worker::{Completion, Outcome, worker_loop},
};
use core::time::Duration;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, sleep},
};
use tokio_util::sync::CancellationToken;

/// Lifecycle of the arbitration loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Accepting intake and completions.
    Running,
    /// Intake closed; only completions are processed.
    ///
    /// Published under either shutdown policy. Under
    /// [`ShutdownPolicy::IdleTimeout`] the loop still stops only when the idle
    /// window elapses.
    Draining,
    /// The loop has exited. Terminal.
    Stopped,
}

enum Event<T> {
    Intake(Option<WorkItem<T>>),
    Completion(Completion),
    Idle,
    Cancelled,
}

/// Least-loaded dispatcher over a fixed pool of worker tasks.
pub struct Balancer<T> {
    pool: Pool,
    queues: Vec<QueueSender<WorkItem<T>>>,
    intake: mpsc::Receiver<WorkItem<T>>,
    completions: mpsc::UnboundedReceiver<Completion>,
    shutdown: ShutdownPolicy,
    shutdown_token: CancellationToken,
    state: watch::Sender<State>,
    stats: Stats,
}

impl<T: Send + 'static> Balancer<T> {
    /// Validates `config`, spawns one worker task per pool slot, and returns
    /// the intake handle together with the (not yet running) loop.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the config is rejected.
    pub fn new(config: Config) -> Result<(Intake<T>, Self)> {
        config.validate()?;

        let (intake_tx, intake_rx) = mpsc::channel(config.intake_capacity);
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let mut queues = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let (tx, rx) = queue::channel(config.queue_capacity);
            queues.push(tx);
            tokio::spawn(worker_loop(WorkerId::new(index), rx, done_tx.clone()));
        }

        let (state, _) = watch::channel(State::Running);

        let balancer = Self {
            pool: Pool::new(config.workers),
            queues,
            intake: intake_rx,
            completions: done_rx,
            shutdown: config.shutdown,
            shutdown_token: CancellationToken::new(),
            state,
            stats: Stats::default(),
        };

        Ok((Intake::new(intake_tx), balancer))
    }

    /// Token that stops the loop with [`StopReason::Cancelled`] when fired.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Live counters, readable while the loop runs.
    pub fn stats(&self) -> Stats {
        self.stats.clone()
    }

    /// Receiver tracking the loop's [`State`]. Keeps the last state after the
    /// loop exits.
    pub fn state(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Runs the arbitration loop until the shutdown policy or the cancellation
    /// token stops it.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker queue closes unexpectedly, the pool is
    /// exhausted, or (in debug builds) a bookkeeping invariant is violated.
    /// The loop is stopped in every case.
    pub async fn run(self) -> Result<Report> {
        let Self {
            mut pool,
            queues,
            mut intake,
            mut completions,
            shutdown,
            shutdown_token,
            state,
            stats,
        } = self;

        let start = Instant::now();
        let idle = match shutdown {
            ShutdownPolicy::Drain => None,
            ShutdownPolicy::IdleTimeout(window) => Some(window),
        };
        let idle_timer = sleep(idle.unwrap_or(Duration::ZERO));
        tokio::pin!(idle_timer);

        let mut per_worker = vec![0_u64; pool.workers()];
        let mut dispatched = 0_u64;
        let mut completed = 0_u64;
        let mut intake_open = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Balancer running with {} workers ({:?})",
            queues.len(),
            shutdown
        );

        let outcome: Result<StopReason> = loop {
            if !intake_open && idle.is_none() && dispatched == completed {
                break Ok(StopReason::Drained);
            }

            let event = tokio::select! {
                () = shutdown_token.cancelled() => Event::Cancelled,
                item = intake.recv(), if intake_open => Event::Intake(item),
                Some(done) = completions.recv() => Event::Completion(done),
                () = &mut idle_timer, if idle.is_some() => Event::Idle,
            };

            let step = match event {
                Event::Cancelled => break Ok(StopReason::Cancelled),
                Event::Idle => break Ok(StopReason::IdleTimeout),
                Event::Intake(None) => {
                    intake_open = false;
                    state.send_replace(State::Draining);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "Intake closed, draining {} in-flight items",
                        dispatched - completed
                    );
                    Ok(())
                }
                Event::Intake(Some(item)) => {
                    dispatch(&mut pool, &queues, item).await.map(|worker| {
                        dispatched += 1;
                        per_worker[worker.index()] += 1;
                        stats.record_dispatch();
                    })
                }
                Event::Completion(done) => complete(&mut pool, done).map(|()| {
                    completed += 1;
                    stats.record_completion(done.outcome == Outcome::Panicked);
                }),
            };

            #[cfg(debug_assertions)]
            let step = step.and_then(|()| verify(&pool, dispatched, completed));

            if let Err(e) = step {
                break Err(e);
            }

            if let Some(window) = idle {
                idle_timer.as_mut().reset(Instant::now() + window);
            }
        };

        intake.close();
        state.send_replace(State::Stopped);

        let reason = match outcome {
            Ok(reason) => reason,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Balancer stopped on error: {e}");
                return Err(e);
            }
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Balancer stopped ({reason:?}): {dispatched} dispatched, {completed} completed"
        );

        let workers = per_worker
            .into_iter()
            .enumerate()
            .map(|(index, dispatched)| {
                let worker = WorkerId::new(index);
                Ok(WorkerReport {
                    worker,
                    dispatched,
                    pending: pool.pending(worker)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Report {
            dispatched,
            completed,
            panicked: stats.panicked(),
            reason,
            workers,
            elapsed: start.elapsed(),
        })
    }
}

/// Hands `item` to the least-loaded worker and charges it one pending item.
async fn dispatch<T>(
    pool: &mut Pool,
    queues: &[QueueSender<WorkItem<T>>],
    item: WorkItem<T>,
) -> Result<WorkerId> {
    let worker = pool.pop_min()?;

    #[cfg(feature = "tracing")]
    tracing::trace!(
        "Dispatching to worker {worker} (pending {})",
        pool.pending(worker)?
    );

    let sent = match queues.get(worker.index()) {
        Some(queue) => queue.send(item).await,
        None => Err(Error::UnknownWorker(worker)),
    };

    if sent.is_ok() {
        pool.increment(worker)?;
    }
    pool.reinsert(worker)?;

    sent.map(|()| worker)
}

/// Releases one pending item from the reporting worker.
fn complete(pool: &mut Pool, done: Completion) -> Result<()> {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {} completed ({:?})", done.worker, done.outcome);

    pool.decrement(done.worker)?;
    pool.fix(done.worker)
}

/// Checks heap order and that outstanding work equals the pool's total load.
#[cfg(debug_assertions)]
fn verify(pool: &Pool, dispatched: u64, completed: u64) -> Result<()> {
    pool.check()?;

    let outstanding = dispatched - completed;
    let pending = pool.total_pending() as u64;
    if outstanding != pending {
        return Err(Error::InvariantViolation {
            reason: format!(
                "{outstanding} items outstanding but workers hold {pending} pending"
            ),
        });
    }

    Ok(())
}
