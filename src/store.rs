//! # Shared key/value store with blocking reads.
//!
//! [`Store`] is a type-erased map shared by units (and any other in-process
//! code) through an `Arc`. Values are typed on read: a read for the wrong type
//! behaves like an absent key.
//!
//! ## Wake-up model
//! ```text
//! set(k, v) ──► map.insert ──► version += 1 (watch) ──► every load_wait wakes
//!                                                       └─► re-checks its own key
//! ```
//! The notification is intentionally store-wide: every `set` wakes every
//! waiter, which then re-checks only its own key.
//!
//! ## Example
//! ```rust
//! use bootvisor::Store;
//!
//! let store = Store::new();
//! store.set("dsn", String::from("postgres://localhost"));
//! assert_eq!(store.get::<String>("dsn").as_deref(), Some("postgres://localhost"));
//! assert_eq!(store.get::<u32>("dsn"), None);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

type Value = Arc<dyn Any + Send + Sync>;

/// Process-local key/value store.
pub struct Store {
    entries: RwLock<HashMap<String, Value>>,
    version: watch::Sender<u64>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (version, _rx) = watch::channel(0);
        Self {
            entries: RwLock::new(HashMap::new()),
            version,
        }
    }

    /// Stores `value` under `key`, replacing any previous value. Never blocks.
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.entries.write().insert(key.into(), Arc::new(value));
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Returns a clone of the value under `key` if present and of type `T`.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Any + Clone + Send + Sync,
    {
        let entries = self.entries.read();
        entries.get(key)?.downcast_ref::<T>().cloned()
    }

    /// Like [`get`](Self::get), falling back to `default`.
    pub fn get_or<T>(&self, key: &str, default: T) -> T
    where
        T: Any + Clone + Send + Sync,
    {
        self.get(key).unwrap_or(default)
    }

    /// Waits until `key` holds a value of type `T`.
    ///
    /// Returns [`StoreError::Canceled`] if `scope` is cancelled first.
    pub async fn load_wait<T>(&self, scope: &CancellationToken, key: &str) -> Result<T, StoreError>
    where
        T: Any + Clone + Send + Sync,
    {
        let mut changed = self.version.subscribe();
        loop {
            if let Some(v) = self.get::<T>(key) {
                return Ok(v);
            }
            tokio::select! {
                res = changed.changed() => {
                    if res.is_err() {
                        return Err(StoreError::Canceled { key: key.to_string() });
                    }
                }
                _ = scope.cancelled() => {
                    return Err(StoreError::Canceled { key: key.to_string() });
                }
            }
        }
    }

    /// Visits every value of type `T` until `f` returns `false`.
    ///
    /// Iterates over a snapshot; `f` may call back into the store.
    pub fn range<T, F>(&self, mut f: F)
    where
        T: Any + Send + Sync,
        F: FnMut(&str, &T) -> bool,
    {
        let snapshot: Vec<(String, Value)> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        for (key, value) in &snapshot {
            if let Some(v) = value.downcast_ref::<T>() {
                if !f(key, v) {
                    break;
                }
            }
        }
    }

    /// Removes `key`; returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Whether `key` holds a value of any type.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
