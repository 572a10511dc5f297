//! Closable FIFO queue connecting two stage pools.
//!
//! Closing drops the queue's only long-lived sender, so consumers keep
//! receiving buffered items and observe [`Received::Closed`] only once the
//! queue is both closed and empty.

use crate::error::{HardsubError, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Outcome of a blocking receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received<T> {
    /// The next buffered item.
    Item(T),
    /// End of stream: the queue was closed and every item was delivered.
    Closed,
}

/// Multi-producer, multi-consumer queue with explicit close semantics.
pub struct Queue<T> {
    name: String,
    sender: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
    close_calls: AtomicUsize,
}

impl<T: Send> Queue<T> {
    /// Creates a queue that never blocks producers.
    pub fn unbounded(name: impl Into<String>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            name: name.into(),
            sender: Mutex::new(Some(tx)),
            receiver: rx,
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Returns the queue name used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues an item.
    ///
    /// Fails with [`HardsubError::ClosedQueue`] once the queue is closed.
    pub fn put(&self, item: T) -> Result<()> {
        // Send outside the lock that `close` needs.
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| self.closed_error())?;

        sender.send(item).map_err(|_| self.closed_error())
    }

    /// Blocks until an item is available or the queue is closed and drained.
    pub fn get(&self) -> Received<T> {
        match self.receiver.recv() {
            Ok(item) => Received::Item(item),
            Err(_) => Received::Closed,
        }
    }

    /// Closes the producer side. Idempotent.
    ///
    /// Returns true for the call that actually closed the queue.
    pub fn close(&self) -> bool {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Number of `close` calls observed, including redundant ones.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns true if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Collects every remaining item, blocking until the queue is closed.
    pub fn drain(&self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len());
        while let Received::Item(item) = self.get() {
            items.push(item);
        }
        items
    }

    fn closed_error(&self) -> HardsubError {
        HardsubError::ClosedQueue {
            queue: self.name.clone(),
        }
    }
}
