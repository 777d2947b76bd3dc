//! # Per-attempt execution handle.
//!
//! A [`RunContext`] is created for every run attempt of a unit (a daemon gets
//! a fresh one on every restart) and handed to the [`Handler`](crate::Handler).
//!
//! ## Capabilities
//! - [`print`](RunContext::print) / [`printf`](RunContext::printf): prefixed output via the sink
//! - [`scope`](RunContext::scope): cancelled on timeout and when the attempt ends
//! - [`require`](RunContext::require): wait for another unit's attempt to end
//! - [`store`](RunContext::store) / [`events`](RunContext::events): shared facilities
//!
//! ## Require and the timeout clock
//! ```text
//! arm ──► ... require("db") ──► pause ──► (db fires | scope ends) ──► arm (full budget)
//! ```
//! Time spent blocked in `require` never counts against the caller's timeout.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::countdown::Countdown;
use crate::core::shared::Shared;
use crate::error::RequireError;
use crate::events::EventBus;
use crate::sink::{unit_body, unit_prefix};
use crate::store::Store;
use crate::units::{Phase, Unit};

/// Handle given to a unit handler for one run attempt.
///
/// Cheap to clone; clones refer to the same attempt.
#[derive(Clone)]
pub struct RunContext {
    inner: Arc<Inner>,
}

struct Inner {
    shared: Arc<Shared>,
    unit: Arc<Unit>,
    scope: CancellationToken,
    countdown: Countdown,
    prefix: String,
}

impl RunContext {
    pub(crate) fn new(shared: Arc<Shared>, unit: Arc<Unit>) -> Self {
        let scope = shared.root.child_token();
        let countdown = Countdown::new(unit.timeout_duration());
        let prefix = unit_prefix(unit.phase().as_str(), unit.name());
        Self {
            inner: Arc::new(Inner {
                shared,
                unit,
                scope,
                countdown,
                prefix,
            }),
        }
    }

    /// Unit name.
    pub fn name(&self) -> &str {
        self.inner.unit.name()
    }

    /// Unit phase.
    pub fn phase(&self) -> Phase {
        self.inner.unit.phase()
    }

    /// Configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.countdown.budget()
    }

    /// Whether a failure of this unit is contained.
    pub fn recoverable(&self) -> bool {
        self.inner.unit.is_recoverable()
    }

    /// Writes `"[BOOT] [PHASE:name] msg"` through the sink.
    pub fn print(&self, msg: impl fmt::Display) {
        self.inner
            .shared
            .printf(format_args!("{} {}", self.inner.prefix, unit_body(msg)));
    }

    /// Formatted variant of [`print`](Self::print): `ctx.printf(format_args!("port {}", 80))`.
    pub fn printf(&self, args: fmt::Arguments<'_>) {
        self.print(args)
    }

    /// Lifetime scope of this attempt.
    pub fn scope(&self) -> &CancellationToken {
        &self.inner.scope
    }

    /// Cancels this attempt's scope.
    pub fn cancel(&self) {
        self.inner.scope.cancel();
    }

    /// Shared key/value store of the orchestrator.
    pub fn store(&self) -> &Arc<Store> {
        &self.inner.shared.store
    }

    /// Event bus attached to the orchestrator, if any.
    pub fn events(&self) -> Option<&Arc<EventBus>> {
        self.inner.shared.events.as_ref()
    }

    /// Waits until the unit called `name` has finished a run attempt.
    ///
    /// - `Ok(())` once its signal fired (immediately if it already has).
    /// - [`RequireError::Canceled`] if `scope` ends first.
    /// - [`RequireError::NotFound`] immediately if no unit was registered as `name`.
    ///
    /// The caller's timeout is paused while waiting and restarted with its
    /// full budget afterwards.
    pub async fn require(&self, scope: &CancellationToken, name: &str) -> Result<(), RequireError> {
        self.printf(format_args!("require: {name}"));
        let Some(signal) = self.inner.shared.signals.get(name) else {
            return Err(RequireError::NotFound {
                name: name.to_string(),
            });
        };

        self.inner.countdown.pause();
        let res = tokio::select! {
            biased;
            _ = signal.fired() => Ok(()),
            _ = scope.cancelled() => Err(RequireError::Canceled { name: name.to_string() }),
        };
        self.inner.countdown.arm();
        res
    }

    pub(crate) fn unit(&self) -> &Arc<Unit> {
        &self.inner.unit
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.inner.shared
    }

    pub(crate) fn countdown(&self) -> &Countdown {
        &self.inner.countdown
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("unit", &self.inner.unit.name())
            .field("phase", &self.inner.unit.phase())
            .field("cancelled", &self.inner.scope.is_cancelled())
            .finish()
    }
}
