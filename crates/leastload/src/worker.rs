use crate::{item::WorkItem, pool::WorkerId, queue::QueueReceiver};
use tokio::sync::mpsc;

/// How a worker's item ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The operation returned and its result was written to the reply.
    Finished,
    /// The operation panicked; its reply was dropped without a value.
    Panicked,
}

/// A worker's report that one assigned item is done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    pub worker: WorkerId,
    pub outcome: Outcome,
}

/// Worker task that runs [`WorkItem`]s from its private queue.
///
/// Items are taken one at a time in FIFO order. Each operation runs on the
/// blocking pool and is awaited before the next item is taken, so a worker
/// never has more than one item executing. After each item the worker
/// publishes a [`Completion`] on the shared fan-in channel, whether or not the
/// operation panicked.
///
/// The loop ends once the queue is closed and drained.
///
/// # Arguments
///
/// - `worker`: Identity reported on every completion.
/// - `queue`: This worker's end of its handoff queue.
/// - `completions`: Shared channel read by the arbitration loop.
pub(crate) async fn worker_loop<T: Send + 'static>(
    worker: WorkerId,
    mut queue: QueueReceiver<WorkItem<T>>,
    completions: mpsc::UnboundedSender<Completion>,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker} started");

    while let Some(item) = queue.recv().await {
        let (operation, reply) = item.into_parts();

        let outcome = match tokio::task::spawn_blocking(operation).await {
            Ok(result) => {
                // A generator that stopped waiting is not an error for us.
                if reply.send(result).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Worker {worker} result discarded, reply closed");
                }
                Outcome::Finished
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {worker} operation failed: {_e}");
                drop(reply);
                Outcome::Panicked
            }
        };

        if completions.send(Completion { worker, outcome }).is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {worker} completion unobserved, balancer stopped");
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, queue};
    use std::sync::{Arc, Mutex};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_items_in_order_and_reports_each() {
        let (tx, rx) = queue::channel(3);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let id = WorkerId::new(4);
        let handle = tokio::spawn(worker_loop(id, rx, done_tx));

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut replies = Vec::new();
        for name in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            let (item, reply) = WorkItem::new(move || {
                log.lock().unwrap().push(name);
                name
            });
            tx.send(item).await.unwrap();
            replies.push(reply);
        }
        drop(tx);

        for (reply, name) in replies.into_iter().zip(["a", "b", "c"]) {
            assert_eq!(reply.await, Ok(name));
        }
        for _ in 0..3 {
            assert_eq!(
                done_rx.recv().await,
                Some(Completion {
                    worker: id,
                    outcome: Outcome::Finished
                })
            );
        }

        handle.await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(done_rx.recv().await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_operation_still_reports_completion() {
        let (tx, rx) = queue::channel(1);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let id = WorkerId::new(0);
        let handle = tokio::spawn(worker_loop(id, rx, done_tx));

        let (item, reply) = WorkItem::new(|| -> u32 { panic!("boom") });
        tx.send(item).await.unwrap();
        assert_eq!(reply.await, Err(Error::ReplyDropped));
        assert_eq!(
            done_rx.recv().await,
            Some(Completion {
                worker: id,
                outcome: Outcome::Panicked
            })
        );

        // The worker keeps serving after a panic.
        let (item, reply) = WorkItem::new(|| 5_u32);
        tx.send(item).await.unwrap();
        assert_eq!(reply.await, Ok(5));

        drop(tx);
        handle.await.unwrap();
    }
}
