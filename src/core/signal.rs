//! # Dependency signals keyed by unit name.
//!
//! Every unique unit name owns one [`DependencySignal`], created at
//! registration. The execution wrapper fires it when a run attempt ends;
//! [`RunContext::require`](crate::RunContext::require) waits on it.
//!
//! ## Rules
//! - A signal is latched: once fired it stays fired.
//! - Firing again only bumps the counter (daemon iterations fire every time).
//! - Units registered under a repeated name share one signal.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Latched readiness signal of one unit name.
#[derive(Debug, Default)]
pub(crate) struct DependencySignal {
    token: CancellationToken,
    fires: AtomicU64,
}

impl DependencySignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks the end of one run attempt.
    pub(crate) fn fire(&self) {
        self.fires.fetch_add(1, Ordering::AcqRel);
        self.token.cancel();
    }

    #[cfg(test)]
    pub(crate) fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of run attempts that ended so far.
    pub(crate) fn fire_count(&self) -> u64 {
        self.fires.load(Ordering::Acquire)
    }

    /// Resolves once the signal has fired at least once.
    pub(crate) async fn fired(&self) {
        self.token.cancelled().await
    }
}

/// Name → signal map filled during registration.
#[derive(Debug, Default)]
pub(crate) struct SignalRegistry {
    signals: Mutex<HashMap<String, Arc<DependencySignal>>>,
}

impl SignalRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates the signal for `name` if missing; returns `false` when it already existed.
    pub(crate) fn ensure(&self, name: &str) -> bool {
        let mut signals = self.signals.lock();
        if signals.contains_key(name) {
            return false;
        }
        signals.insert(name.to_string(), Arc::new(DependencySignal::new()));
        true
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<DependencySignal>> {
        self.signals.lock().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_is_latched_and_counted() {
        let sig = DependencySignal::new();
        assert!(!sig.is_fired());
        sig.fire();
        sig.fire();
        assert!(sig.is_fired());
        assert_eq!(sig.fire_count(), 2);
    }

    #[test]
    fn repeated_names_share_a_signal() {
        let reg = SignalRegistry::new();
        assert!(reg.ensure("db"));
        assert!(!reg.ensure("db"));

        let (a, b) = (reg.get("db").unwrap(), reg.get("db").unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(reg.get("cache").is_none());
    }

    #[tokio::test]
    async fn fired_resolves_after_fire() {
        let sig = Arc::new(DependencySignal::new());
        let waiter = Arc::clone(&sig);
        let handle = tokio::spawn(async move { waiter.fired().await });
        sig.fire();
        handle.await.unwrap();
    }
}
