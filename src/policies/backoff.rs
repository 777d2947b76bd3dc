//! # Restart pause for daemon units.
//!
//! [`BackoffPolicy`] decides how long a daemon supervisor sleeps between a
//! failed iteration and the next one. The default used by
//! [`BootConfig`](crate::BootConfig) is a fixed pause ([`BackoffPolicy::fixed`]);
//! a `factor > 1.0` turns it into exponential growth capped at `max`.
//!
//! The delay for restart `n` is `first × factor^n`, clamped to `max`, then
//! jittered. The base is derived from `n` only, so jitter never feeds back
//! into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use bootvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//! assert_eq!(backoff.next(10), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Pause policy between daemon restarts.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Pause before the first restart.
    pub first: Duration,
    /// Upper bound for any pause.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = fixed pause).
    pub factor: f64,
    /// Randomization applied to the computed pause.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `max = 30s`, `factor = 1.0`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A constant pause of `delay` between every restart.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the pause before restart number `attempt` (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let raw = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !raw.is_finite() || raw < 0.0 || raw > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(raw)
        };

        self.jitter.apply(base)
    }
}
