//! Restart pause policies for daemon units.
//!
//! - [`BackoffPolicy`] how long a daemon supervisor waits before restarting
//! - [`JitterPolicy`] randomization of that pause
//!
//! ```text
//! BootConfig { daemon_backoff: BackoffPolicy }
//!      └─► core::daemon supervisor: backoff.next(restarts) after each failure
//! ```

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
