//! # Jitter for daemon restart pauses.
//!
//! Spreads restarts of several daemons that fail at the same moment (for
//! example when a shared backend goes away).

use rand::Rng;
use std::time::Duration;

/// Randomization applied to a computed pause.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the computed pause as is.
    #[default]
    None,
    /// Random pause in `[0, pause]`.
    Full,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        match self {
            JitterPolicy::Full if ms > 0 => Duration::from_millis(rand::rng().random_range(0..=ms)),
            _ => delay,
        }
    }
}
