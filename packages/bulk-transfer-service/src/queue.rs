//! Job queues (C3)
//!
//! Two named FIFO channels — one for `TransferJob`s, one for
//! `FinalizeBulkJob`s — with strict FIFO ordering within a queue and no
//! ordering guarantee across queues. `enqueue` never blocks and never
//! drops; `dequeue` awaits until an item is available, `try_dequeue`
//! returns immediately. Delivery is at-least-once: consumers (the
//! transfer worker, the finalizer) must be idempotent on redelivery.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// A process-wide, in-memory FIFO queue. A production deployment may
/// replace this with any broker providing the same enqueue/dequeue
/// contract; this is the reference implementation used to exercise the
/// boundary end to end.
pub struct JobQueue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

impl<T> JobQueue<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Appends `item` at the tail of the queue.
    pub async fn enqueue(&self, item: T) {
        let mut items = self.items.lock().await;
        items.push_back(item);
        self.notify.notify_one();
    }

    /// Pops the head of the queue, returning `None` immediately if empty.
    pub async fn try_dequeue(&self) -> Option<T> {
        let mut items = self.items.lock().await;
        items.pop_front()
    }

    /// Pops the head of the queue, awaiting until an item is enqueued if
    /// the queue is currently empty.
    pub async fn dequeue(&self) -> T {
        loop {
            if let Some(item) = self.try_dequeue().await {
                return item;
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
