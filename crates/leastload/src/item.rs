//! Units of work and their single-use reply channels.

use crate::error::{Error, Result};
use core::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::oneshot;

/// The opaque operation a worker runs.
pub type Operation<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// A unit of work plus the channel its result is delivered on.
///
/// The scheduler never looks inside the operation; it only moves the item to a
/// worker, which runs it and writes the result exactly once.
pub struct WorkItem<T> {
    operation: Operation<T>,
    reply: oneshot::Sender<T>,
}

impl<T: Send + 'static> WorkItem<T> {
    /// Wraps `operation` into a work item and returns the read end of its
    /// reply channel.
    pub fn new<F>(operation: F) -> (Self, Reply<T>)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                operation: Box::new(operation),
                reply,
            },
            Reply { rx },
        )
    }
}

impl<T> WorkItem<T> {
    /// Returns whether the generator has stopped waiting for the result.
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    pub(crate) fn into_parts(self) -> (Operation<T>, oneshot::Sender<T>) {
        (self.operation, self.reply)
    }
}

impl<T> fmt::Debug for WorkItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("abandoned", &self.is_abandoned())
            .finish_non_exhaustive()
    }
}

/// Read end of a work item's reply channel.
///
/// Resolves to the operation's result, or to [`Error::ReplyDropped`] if the
/// item was dropped without running to completion: the operation panicked, or
/// the balancer stopped before dispatching it.
#[derive(Debug)]
pub struct Reply<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Reply<T> {
    /// Returns the result if it has already been written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReplyDropped`] if no result will ever arrive.
    pub fn try_recv(&mut self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(Error::ReplyDropped),
        }
    }
}

impl<T> Future for Reply<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| Error::ReplyDropped))
    }
}
