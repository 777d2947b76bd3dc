//! # Runtime configuration.
//!
//! Provides [`BootConfig`] for the orchestrator and [`EventBusConfig`] for the
//! event bus worker pool.
//!
//! ## Sentinel values
//! - `boot_timeout = 0s` → no watchdog (see [`BootConfig::watchdog`])

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Configuration of the [`Boot`](crate::Boot) orchestrator.
///
/// ## Field semantics
/// - `boot_timeout`: global watchdog for `start()` (`0s` = disabled)
/// - `allow_name_repeat`: accept duplicate unit names
/// - `daemon_backoff`: pause between daemon restarts
/// - `banner`: print the logo through the sink when `start()` begins
#[derive(Clone, Debug)]
pub struct BootConfig {
    /// Maximum time `start()` may take before it fails with
    /// [`BootError::BootTimeout`](crate::BootError::BootTimeout).
    pub boot_timeout: Duration,

    /// Disables the duplicate-name check in `register()`.
    ///
    /// Units sharing a name also share one dependency signal.
    pub allow_name_repeat: bool,

    /// Delay between a failed daemon iteration and its restart.
    ///
    /// The attempt number passed to [`BackoffPolicy::next`] is the number of
    /// restarts so far, so a `factor > 1.0` grows the pause per failure.
    pub daemon_backoff: BackoffPolicy,

    /// Print the banner before the first phase.
    pub banner: bool,
}

impl BootConfig {
    /// Returns the watchdog duration as an `Option`.
    ///
    /// - `None` → no watchdog
    /// - `Some(d)` → `start()` fails after `d`
    #[inline]
    pub fn watchdog(&self) -> Option<Duration> {
        if self.boot_timeout == Duration::ZERO {
            None
        } else {
            Some(self.boot_timeout)
        }
    }
}

impl Default for BootConfig {
    /// Default configuration:
    ///
    /// - `boot_timeout = 60s`
    /// - `allow_name_repeat = false`
    /// - `daemon_backoff = 1s` fixed
    /// - `banner = false`
    fn default() -> Self {
        Self {
            boot_timeout: Duration::from_secs(60),
            allow_name_repeat: false,
            daemon_backoff: BackoffPolicy::fixed(Duration::from_secs(1)),
            banner: false,
        }
    }
}

/// Configuration of the [`EventBus`](crate::EventBus).
#[derive(Clone, Debug)]
pub struct EventBusConfig {
    /// Number of long-lived queue workers (min 1).
    pub workers: usize,
    /// Maximum number of queued, undelivered items (min 1).
    pub queue_capacity: usize,
    /// Attempts to find a non-colliding subscription key.
    pub key_retries: usize,
}

impl EventBusConfig {
    /// Worker count clamped to a minimum of 1.
    #[inline]
    pub fn workers_clamped(&self) -> usize {
        self.workers.max(1)
    }

    /// Queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for EventBusConfig {
    /// Default configuration:
    ///
    /// - `workers = 12`
    /// - `queue_capacity = 1024`
    /// - `key_retries = 12`
    fn default() -> Self {
        Self {
            workers: 12,
            queue_capacity: 1024,
            key_retries: 12,
        }
    }
}
