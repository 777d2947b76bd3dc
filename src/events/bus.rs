//! # Topic-based publish/subscribe bus.
//!
//! [`EventBus`] keeps, per topic, a set of typed handlers. It offers two
//! delivery paths:
//!
//! ```text
//! publish(topic, v)        ──► every handler of topic, on the caller's thread
//!                              └─► errors/panics collected into EventError::Handlers
//!
//! publish_queue(topic, v)  ──► bounded queue ──► one of W workers ──► publish(topic, v)
//!                                                                └─► on_error(err)
//! ```
//!
//! ## Rules
//! - Handlers are narrowed to one payload type; other payload types are skipped silently.
//! - `publish` invokes handlers in unspecified order and never stops early: a failing
//!   or panicking handler does not prevent the others from running.
//! - A topic without handlers yields [`EventError::TopicNotFound`]; removing the last
//!   handler of a topic removes the topic.
//! - Queued items are delivered at most once, FIFO relative to each other, with no
//!   ordering guarantee against synchronous `publish` calls.
//! - After `shutdown()` the queue is closed: undelivered and later items go to
//!   `on_error` as [`EventError::Closed`] and never hold up `flush()`.
//! - Subscriber lists are snapshotted under the read lock, so handlers may
//!   subscribe/unsubscribe without deadlocking.
//!
//! ## Example
//! ```rust
//! use bootvisor::{EventBus, EventBusConfig, EventKey};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = EventBus::new(EventBusConfig::default());
//!     let topic = EventKey::new("user.created");
//!
//!     let key = bus
//!         .subscribe(&topic, |id: &u64| {
//!             println!("welcome #{id}");
//!             Ok(())
//!         })
//!         .unwrap();
//!
//!     bus.publish(&topic, 7u64).unwrap();
//!     bus.unsubscribe(&topic, &[key]);
//!     assert!(bus.publish(&topic, 8u64).is_err());
//! }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EventBusConfig;
use crate::error::{BoxError, EventError, HandlerFailure, panic_message};
use crate::events::key::{EventKey, SubscriptionKey, generate_key};
use crate::events::queue::{EventQueue, OnError, QueuedEvent, Rejected};

type Dispatcher = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<(), BoxError> + Send + Sync>;

/// Topic → (subscription key → dispatcher).
struct Registry {
    topics: RwLock<HashMap<EventKey, HashMap<String, Dispatcher>>>,
}

impl Registry {
    fn publish(
        &self,
        topic: &EventKey,
        payload: &(dyn Any + Send + Sync),
    ) -> Result<(), EventError> {
        let handlers: Vec<(String, Dispatcher)> = {
            let topics = self.topics.read();
            match topics.get(topic) {
                Some(h) if !h.is_empty() => h
                    .iter()
                    .map(|(k, d)| (k.clone(), Arc::clone(d)))
                    .collect(),
                _ => {
                    return Err(EventError::TopicNotFound {
                        topic: topic.to_string(),
                    });
                }
            }
        };

        let mut failures = Vec::new();
        for (key, dispatch) in handlers {
            match catch_unwind(AssertUnwindSafe(|| dispatch(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(HandlerFailure::Error {
                    key,
                    message: e.to_string(),
                }),
                Err(panic) => failures.push(HandlerFailure::Panicked {
                    key,
                    message: panic_message(panic.as_ref()),
                }),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(EventError::Handlers {
                topic: topic.to_string(),
                failures,
            })
        }
    }
}

/// Publish/subscribe bus with a fixed pool of queue workers.
///
/// Construct once with [`EventBus::new`] and share the returned `Arc`.
/// Dropping the last `Arc` stops the workers.
pub struct EventBus {
    registry: Arc<Registry>,
    queue: Arc<EventQueue>,
    key_retries: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl EventBus {
    /// Creates the bus and spawns `cfg.workers` queue workers.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn new(cfg: EventBusConfig) -> Arc<Self> {
        let registry = Arc::new(Registry {
            topics: RwLock::new(HashMap::new()),
        });
        let queue = Arc::new(EventQueue::new(cfg.queue_capacity_clamped()));
        let shutdown = CancellationToken::new();

        let workers = (0..cfg.workers_clamped())
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&registry),
                    Arc::clone(&queue),
                    shutdown.clone(),
                ))
            })
            .collect();

        Arc::new(Self {
            registry,
            queue,
            key_retries: cfg.key_retries,
            workers: Mutex::new(workers),
            shutdown,
        })
    }

    /// Registers `handler` for payloads of type `T` published on `topic`.
    pub fn subscribe<T, F>(
        &self,
        topic: &EventKey,
        handler: F,
    ) -> Result<SubscriptionKey, EventError>
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let dispatch: Dispatcher = Arc::new(
            move |payload: &(dyn Any + Send + Sync)| -> Result<(), BoxError> {
                match payload.downcast_ref::<T>() {
                    Some(v) => handler(v),
                    None => Ok(()),
                }
            },
        );

        let mut topics = self.registry.topics.write();
        let handlers = topics.entry(topic.clone()).or_default();
        match generate_key(handlers, self.key_retries) {
            Ok(key) => {
                handlers.insert(key.as_str().to_string(), dispatch);
                tracing::debug!(topic = %topic, key = %key, "event handler subscribed");
                Ok(key)
            }
            Err(e) => {
                if handlers.is_empty() {
                    topics.remove(topic);
                }
                Err(e)
            }
        }
    }

    /// Synchronously invokes every handler of `topic` with `payload`.
    pub fn publish<T>(&self, topic: &EventKey, payload: T) -> Result<(), EventError>
    where
        T: Any + Send + Sync,
    {
        self.registry.publish(topic, &payload)
    }

    /// Queues `payload` for asynchronous delivery; errors are only logged.
    pub fn publish_queue<T>(&self, topic: &EventKey, payload: T)
    where
        T: Any + Send + Sync,
    {
        self.enqueue(topic, Box::new(payload), None);
    }

    /// Queues `payload`; `on_error` receives the delivery error, if any.
    ///
    /// A full queue drops the item and calls `on_error` with
    /// [`EventError::QueueFull`] before returning; a closed bus does the same
    /// with [`EventError::Closed`].
    pub fn publish_queue_with<T, E>(&self, topic: &EventKey, payload: T, on_error: E)
    where
        T: Any + Send + Sync,
        E: FnOnce(EventError) + Send + 'static,
    {
        self.enqueue(topic, Box::new(payload), Some(Box::new(on_error)));
    }

    fn enqueue(
        &self,
        topic: &EventKey,
        payload: Box<dyn Any + Send + Sync>,
        on_error: Option<OnError>,
    ) {
        let item = QueuedEvent {
            topic: topic.clone(),
            payload,
            on_error,
        };
        match self.queue.push(item) {
            Ok(()) => {}
            Err(Rejected::Full(item)) => {
                let capacity = self.queue.capacity();
                tracing::warn!(topic = %topic, capacity, "event queue full; item dropped");
                if let Some(cb) = item.on_error {
                    cb(EventError::QueueFull {
                        topic: topic.to_string(),
                        capacity,
                    });
                }
            }
            Err(Rejected::Closed(item)) => reject_closed(item),
        }
    }

    /// Removes handlers from `topic`; an empty `keys` removes the whole topic.
    pub fn unsubscribe(&self, topic: &EventKey, keys: &[SubscriptionKey]) {
        let mut topics = self.registry.topics.write();
        if keys.is_empty() {
            topics.remove(topic);
            return;
        }
        if let Some(handlers) = topics.get_mut(topic) {
            for key in keys {
                handlers.remove(key.as_str());
            }
            if handlers.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Waits until every queued item has been delivered.
    pub async fn flush(&self) {
        self.queue.drained().await
    }

    /// Stops the workers and waits for them.
    ///
    /// Items still queued are discarded and reported as [`EventError::Closed`];
    /// later `publish_queue` calls are rejected the same way.
    pub async fn shutdown(&self) {
        self.close();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for w in workers {
            let _ = w.await;
        }
    }

    /// Sorted list of topics with at least one handler.
    pub fn topics(&self) -> Vec<EventKey> {
        let mut topics: Vec<EventKey> = self.registry.topics.read().keys().cloned().collect();
        topics.sort_unstable();
        topics
    }

    /// Number of handlers subscribed to `topic`.
    pub fn subscriber_count(&self, topic: &EventKey) -> usize {
        self.registry
            .topics
            .read()
            .get(topic)
            .map_or(0, HashMap::len)
    }

    /// Number of items waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl EventBus {
    fn close(&self) {
        self.shutdown.cancel();
        let left = self.queue.close();
        if !left.is_empty() {
            tracing::debug!(discarded = left.len(), "event bus closed with queued items");
        }
        left.into_iter().for_each(reject_closed);
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.close();
    }
}

fn reject_closed(item: QueuedEvent) {
    tracing::debug!(topic = %item.topic, "event bus closed; item dropped");
    if let Some(cb) = item.on_error {
        let err = EventError::Closed {
            topic: item.topic.to_string(),
        };
        if catch_unwind(AssertUnwindSafe(|| cb(err))).is_err() {
            tracing::error!(topic = %item.topic, "event on_error callback panicked");
        }
    }
}

async fn worker(
    id: usize,
    registry: Arc<Registry>,
    queue: Arc<EventQueue>,
    shutdown: CancellationToken,
) {
    loop {
        while let Some(item) = queue.pop() {
            deliver(id, &registry, item);
            queue.done();
        }
        tokio::select! {
            _ = queue.wait_ready() => {}
            _ = shutdown.cancelled() => break,
        }
    }
    tracing::trace!(worker = id, "event worker stopped");
}

fn deliver(worker: usize, registry: &Registry, item: QueuedEvent) {
    let QueuedEvent {
        topic,
        payload,
        on_error,
    } = item;

    let Err(err) = registry.publish(&topic, &*payload) else {
        return;
    };
    match on_error {
        Some(cb) => {
            tracing::warn!(worker, topic = %topic, error = %err, "event worker publish failed");
            if catch_unwind(AssertUnwindSafe(|| cb(err))).is_err() {
                tracing::error!(worker, topic = %topic, "event on_error callback panicked");
            }
        }
        None => {
            tracing::debug!(worker, topic = %topic, error = %err, "event worker publish failed");
        }
    }
}
