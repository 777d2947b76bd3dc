//! # Unit descriptor and startup phases.
//!
//! A [`Unit`] is one named piece of startup work tagged with a [`Phase`].
//! Timeout and recoverability are set with chained calls before the unit is
//! handed to [`Boot::register`](crate::Boot::register).
//!
//! ## Phases
//! ```text
//! Front ──► Background (spawned, not awaited) ──► Normal (spawned, joined)
//!       ──► Daemon (supervised restart loop, not awaited) ──► After
//!       ──► join Background ──► join Daemon
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use bootvisor::{Phase, RunContext, Unit, UnitError};
//!
//! let unit = Unit::new("db", Phase::Normal, |ctx: RunContext| async move {
//!     ctx.print("connecting");
//!     Ok::<_, UnitError>(())
//! })
//! .timeout(Duration::from_secs(5))
//! .recoverable(false);
//!
//! assert_eq!(unit.name(), "db");
//! assert!(!unit.is_recoverable());
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::core::RunContext;
use crate::error::UnitError;
use crate::units::handler::{Handler, UnitFn};

/// When and how a unit is sequenced relative to the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Sequential, before everything else; failures abort startup early.
    Front,
    /// Spawned and left running; joined at the very end of `start()`.
    Background,
    /// Spawned and joined; completion means "application is ready".
    Normal,
    /// Spawned into a restart loop that ends on the first success.
    Daemon,
    /// Sequential, after all Normal units have finished.
    After,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 5] = [
        Phase::Front,
        Phase::Background,
        Phase::Normal,
        Phase::Daemon,
        Phase::After,
    ];

    /// Lower-case phase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Front => "front",
            Phase::Background => "background",
            Phase::Normal => "normal",
            Phase::Daemon => "daemon",
            Phase::After => "after",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative descriptor of one piece of startup work.
///
/// Units are recoverable by default: a failure is logged and contained. A
/// non-recoverable unit turns its own failure or timeout into a
/// [`BootError`](crate::BootError) returned from `start()`. Daemon units are
/// always non-recoverable so that every failure reaches their supervisor.
#[derive(Clone)]
pub struct Unit {
    name: String,
    phase: Phase,
    handler: Arc<dyn Handler>,
    timeout: Option<Duration>,
    recoverable: bool,
}

impl Unit {
    /// Creates a unit from a closure `Fn(RunContext) -> Future`.
    pub fn new<F, Fut>(name: impl Into<String>, phase: Phase, f: F) -> Self
    where
        F: Fn(RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
    {
        Self::with_handler(name, phase, Arc::new(UnitFn::new(f)))
    }

    /// Creates a unit from a shared [`Handler`].
    pub fn with_handler(name: impl Into<String>, phase: Phase, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: name.into(),
            phase,
            handler,
            timeout: None,
            recoverable: phase != Phase::Daemon,
        }
    }

    /// Sets the per-attempt timeout (`Duration::ZERO` = none).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (timeout > Duration::ZERO).then_some(timeout);
        self
    }

    /// Sets whether failures are contained. Ignored for daemon units.
    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable && self.phase != Phase::Daemon;
        self
    }

    /// Unit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registration phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Configured timeout, if any.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether failures are contained.
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub(crate) fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("timeout", &self.timeout)
            .field("recoverable", &self.recoverable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(phase: Phase) -> Unit {
        Unit::new("u", phase, |_ctx: RunContext| async { Ok(()) })
    }

    #[test]
    fn defaults_are_recoverable_without_timeout() {
        let u = noop(Phase::Normal);
        assert!(u.is_recoverable());
        assert_eq!(u.timeout_duration(), None);
    }

    #[test]
    fn daemon_is_never_recoverable() {
        let u = noop(Phase::Daemon);
        assert!(!u.is_recoverable());
        assert!(!u.recoverable(true).is_recoverable());
    }

    #[test]
    fn zero_timeout_means_none() {
        let u = noop(Phase::Front).timeout(Duration::ZERO);
        assert_eq!(u.timeout_duration(), None);
        let u = u.timeout(Duration::from_millis(5));
        assert_eq!(u.timeout_duration(), Some(Duration::from_millis(5)));
    }

    #[test]
    fn phases_display_in_order() {
        let names: Vec<_> = Phase::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["front", "background", "normal", "daemon", "after"]);
        assert!(Phase::Front < Phase::After);
    }
}
