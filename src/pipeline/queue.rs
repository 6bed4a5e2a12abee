//! Fixed-capacity FIFO shared between generation and publishing.
//!
//! Producers block on [`QueueProducer::enqueue`] while the queue is full,
//! which is the pipeline's back-pressure point. The queue reports
//! [`Dequeued::Drained`] once every producer has been closed (or dropped)
//! and the buffered items are gone.

use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome of a single dequeue.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued<T> {
    Item(T),
    /// All producers closed and nothing is left.
    Drained,
    /// Cancellation was signaled and nothing is buffered right now.
    Cancelled,
}

pub fn bounded<T: Send>(capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        QueueProducer { tx },
        QueueConsumer {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

pub struct QueueProducer<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for QueueProducer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send> QueueProducer<T> {
    /// Waits for space, then enqueues `item`.
    ///
    /// Returns [`Error::Shutdown`] without enqueueing when `cancel` fires
    /// first, and [`Error::QueueClosed`] when every consumer is gone.
    pub async fn enqueue(&self, item: T, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Shutdown);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Shutdown),
            sent = self.tx.send(item) => sent.map_err(|_| Error::QueueClosed),
        }
    }

    /// Closes this producer handle. The queue drains once every clone is closed.
    pub fn close(self) {
        debug!(
            remaining_capacity = self.tx.capacity(),
            "Closing queue producer"
        );
    }
}

pub struct QueueConsumer<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for QueueConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T: Send> QueueConsumer<T> {
    /// Takes exclusive use of the queue until the lease is dropped.
    ///
    /// A worker holds a lease while filling one batch, so every batch is a
    /// contiguous run of the queue.
    pub async fn lease(&self) -> QueueLease<'_, T> {
        QueueLease {
            rx: self.rx.lock().await,
        }
    }
}

pub struct QueueLease<'a, T> {
    rx: MutexGuard<'a, mpsc::Receiver<T>>,
}

impl<T: Send> QueueLease<'_, T> {
    /// Waits for the next item.
    ///
    /// After cancellation this never blocks: buffered items are still handed
    /// out, then `Drained` or `Cancelled` is reported.
    pub async fn dequeue(&mut self, cancel: &CancellationToken) -> Dequeued<T> {
        if !cancel.is_cancelled() {
            tokio::select! {
                biased;
                item = self.rx.recv() => {
                    return match item {
                        Some(item) => Dequeued::Item(item),
                        None => Dequeued::Drained,
                    };
                }
                _ = cancel.cancelled() => {}
            }
        }

        match self.rx.try_recv() {
            Ok(item) => Dequeued::Item(item),
            Err(TryRecvError::Disconnected) => Dequeued::Drained,
            Err(TryRecvError::Empty) => Dequeued::Cancelled,
        }
    }
}
