//! # Bounded queue feeding the event worker pool.
//!
//! ```text
//! publish_queue() ──► [VecDeque, cap N] ──notify_one──► worker 1..W
//!                                                        └─► Registry::publish
//!                                                             └─► on_error(err)
//! ```
//!
//! ## Rules
//! - `push` never blocks; a full or closed queue rejects the item.
//! - Each item is popped by exactly one worker (FIFO).
//! - An idle worker parks on a [`Notify`]; every push wakes one worker.
//! - `pending` counts pushed-but-not-finished items so `flush()` can wait for zero.
//! - `close` hands back the undelivered items and takes them out of `pending`.

use std::any::Any;
use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::{Notify, watch};

use crate::error::EventError;
use crate::events::key::EventKey;

pub(crate) type OnError = Box<dyn FnOnce(EventError) + Send + 'static>;

/// One asynchronously published item.
pub(crate) struct QueuedEvent {
    pub(crate) topic: EventKey,
    pub(crate) payload: Box<dyn Any + Send + Sync>,
    pub(crate) on_error: Option<OnError>,
}

/// Why `push` handed an item back.
pub(crate) enum Rejected {
    Full(QueuedEvent),
    Closed(QueuedEvent),
}

#[derive(Default)]
struct Slots {
    items: VecDeque<QueuedEvent>,
    closed: bool,
}

pub(crate) struct EventQueue {
    slots: Mutex<Slots>,
    capacity: usize,
    ready: Notify,
    pending: watch::Sender<usize>,
}

impl EventQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (pending, _rx) = watch::channel(0);
        Self {
            slots: Mutex::new(Slots {
                items: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            capacity,
            ready: Notify::new(),
            pending,
        }
    }

    /// Appends `item`; hands it back if the queue is full or closed.
    pub(crate) fn push(&self, item: QueuedEvent) -> Result<(), Rejected> {
        {
            let mut slots = self.slots.lock();
            if slots.closed {
                return Err(Rejected::Closed(item));
            }
            if slots.items.len() >= self.capacity {
                return Err(Rejected::Full(item));
            }
            // counted before any worker can pop it
            self.pending.send_modify(|n| *n += 1);
            slots.items.push_back(item);
        }
        self.ready.notify_one();
        Ok(())
    }

    pub(crate) fn pop(&self) -> Option<QueuedEvent> {
        self.slots.lock().items.pop_front()
    }

    /// Rejects further pushes and returns the items no worker popped yet.
    ///
    /// Items already popped stay in `pending` until their `done()`.
    pub(crate) fn close(&self) -> Vec<QueuedEvent> {
        let left: Vec<QueuedEvent> = {
            let mut slots = self.slots.lock();
            slots.closed = true;
            slots.items.drain(..).collect()
        };
        let count = left.len();
        self.pending.send_modify(|n| *n = n.saturating_sub(count));
        left
    }

    /// Resolves when at least one push happened since the last wake-up.
    pub(crate) async fn wait_ready(&self) {
        self.ready.notified().await
    }

    /// Marks one popped item as fully handled.
    pub(crate) fn done(&self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Resolves once every pushed item has been handled.
    pub(crate) async fn drained(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().items.len()
    }
}
