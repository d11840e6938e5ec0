//! Per-worker handoff queue.
//!
//! A queue of capacity `N >= 1` is a bounded [`mpsc`] channel: the sender only
//! waits once `N` items are buffered. A queue of capacity `0` is a rendezvous:
//! [`QueueSender::send`] resolves only after the worker has dequeued the item,
//! so dispatch and execution are fully synchronized.

use crate::error::{Error, Result};
use tokio::sync::{mpsc, oneshot};

struct Envelope<T> {
    item: T,
    taken: Option<oneshot::Sender<()>>,
}

/// Writing half of a worker queue. Held by the arbitration loop only.
pub struct QueueSender<T> {
    tx: mpsc::Sender<Envelope<T>>,
    rendezvous: bool,
}

/// Reading half of a worker queue. Held by the owning worker only.
pub struct QueueReceiver<T> {
    rx: mpsc::Receiver<Envelope<T>>,
}

/// Creates a worker queue holding up to `capacity` items ahead of the worker.
pub fn channel<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        QueueSender {
            tx,
            rendezvous: capacity == 0,
        },
        QueueReceiver { rx },
    )
}

impl<T> QueueSender<T> {
    /// Hands an item to the worker, waiting while the queue is full (or, for a
    /// rendezvous queue, until the worker has taken it).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if the worker is gone.
    pub async fn send(&self, item: T) -> Result<()> {
        let (taken, ack) = if self.rendezvous {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        self.tx
            .send(Envelope { item, taken })
            .await
            .map_err(|_| Error::ChannelError {
                context: "worker queue closed".to_string(),
            })?;

        if let Some(ack) = ack {
            ack.await.map_err(|_| Error::ChannelError {
                context: "worker dropped a handoff before taking it".to_string(),
            })?;
        }

        Ok(())
    }

    pub fn is_rendezvous(&self) -> bool {
        self.rendezvous
    }
}

impl<T> QueueReceiver<T> {
    /// Takes the next item, or `None` once the sender is gone and the queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<T> {
        let Envelope { item, taken } = self.rx.recv().await?;
        if let Some(taken) = taken {
            // The sender only stops listening if the arbitration loop itself
            // was dropped; the item is still ours to run.
            let _ = taken.send(());
        }
        Some(item)
    }
}
