use crate::{
    error::{Error, Result},
    item::{Reply, WorkItem},
};
use tokio::sync::mpsc;

/// Submission handle for generators.
///
/// Cloning is cheap; every clone feeds the same arbitration loop. Dropping
/// the last clone closes the intake, which is how generators signal that no
/// more work is coming.
pub struct Intake<T> {
    tx: mpsc::Sender<WorkItem<T>>,
}

impl<T> Clone for Intake<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> Intake<T> {
    pub(crate) const fn new(tx: mpsc::Sender<WorkItem<T>>) -> Self {
        Self { tx }
    }

    /// Wraps `operation` in a [`WorkItem`], sends it, and returns the handle
    /// its result will arrive on.
    ///
    /// Waits while the intake buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if the balancer has stopped.
    pub async fn submit<F>(&self, operation: F) -> Result<Reply<T>>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (item, reply) = WorkItem::new(operation);
        self.send(item).await?;
        Ok(reply)
    }

    /// Sends a pre-built [`WorkItem`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if the balancer has stopped.
    pub async fn send(&self, item: WorkItem<T>) -> Result<()> {
        self.tx.send(item).await.map_err(|_| Error::ServiceShutdown)
    }

    /// Returns whether the balancer has stopped accepting work.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
