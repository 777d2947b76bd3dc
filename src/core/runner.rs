//! # Run a single attempt of a unit.
//!
//! ```text
//! "unit starting" ──► arm countdown ──► handler.run(ctx)
//!      ├─ Ok(())            ──► "unit success"            ──► Succeeded
//!      ├─ Err(e) / panic    ──► "unit start error: e"     ──► Failed
//!      └─ countdown expired ──► cancel scope, "unit start timeout"
//!             ├─ recoverable     ──► keep polling the handler
//!             └─ non-recoverable ──► drop the handler     ──► Failed(Timeout)
//! on every exit path (guard): fire the name's signal, cancel the scope
//! ```
//!
//! ## Rules
//! - Panics inside the handler become [`UnitError::Panicked`].
//! - The signal fires even if the attempt future itself is dropped (task abort).
//! - [`run_unit`] turns a failure of a non-recoverable unit into a [`BootError`];
//!   recoverable failures are recorded and contained.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::core::context::RunContext;
use crate::core::report::{UnitReport, UnitStatus};
use crate::core::shared::Shared;
use crate::error::{BootError, UnitError, panic_message};
use crate::units::Unit;

/// Result of one run attempt.
#[derive(Debug)]
pub(crate) enum Attempt {
    Succeeded { timed_out: bool },
    Failed { error: UnitError, timed_out: bool },
}

/// Fires the unit's dependency signal and cancels its scope on drop.
struct AttemptGuard<'a> {
    ctx: &'a RunContext,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if let Some(signal) = self.ctx.shared().signals.get(self.ctx.name()) {
            signal.fire();
        }
        self.ctx.scope().cancel();
    }
}

/// Executes one attempt of the unit bound to `ctx`.
pub(crate) async fn run_attempt(ctx: RunContext) -> Attempt {
    let _guard = AttemptGuard { ctx: &ctx };
    let unit = Arc::clone(ctx.unit());

    ctx.print("unit starting");
    tracing::debug!(unit = ctx.name(), phase = %ctx.phase(), "unit starting");
    ctx.countdown().arm();

    let run = AssertUnwindSafe(unit.handler().run(ctx.clone())).catch_unwind();
    tokio::pin!(run);

    let mut timed_out = false;
    let result = loop {
        tokio::select! {
            res = &mut run => {
                break res.unwrap_or_else(|payload| {
                    Err(UnitError::Panicked { message: panic_message(payload.as_ref()) })
                });
            }
            at = ctx.countdown().expired() => {
                ctx.countdown().consume(at);
                ctx.scope().cancel();
                timed_out = true;
                ctx.print("unit start timeout");

                let timeout = ctx.timeout().unwrap_or_default();
                if !ctx.recoverable() {
                    break Err(UnitError::Timeout { timeout });
                }
                tracing::warn!(unit = ctx.name(), ?timeout, "unit timed out; still running");
            }
        }
    };
    ctx.countdown().pause();

    match result {
        Ok(()) => {
            ctx.print("unit success");
            tracing::debug!(unit = ctx.name(), timed_out, "unit succeeded");
            Attempt::Succeeded { timed_out }
        }
        Err(error) => {
            ctx.printf(format_args!("unit start error: {error}"));
            Attempt::Failed { error, timed_out }
        }
    }
}

/// Runs a non-daemon unit once and applies the escalate-unless-recoverable rule.
pub(crate) async fn run_unit(shared: Arc<Shared>, unit: Arc<Unit>) -> Result<(), BootError> {
    let ctx = RunContext::new(Arc::clone(&shared), Arc::clone(&unit));

    let (status, timed_out) = match run_attempt(ctx).await {
        Attempt::Succeeded { timed_out } => (UnitStatus::Succeeded, timed_out),
        Attempt::Failed { error, timed_out } if unit.is_recoverable() => {
            tracing::warn!(
                unit = unit.name(),
                phase = %unit.phase(),
                error = %error,
                label = error.as_label(),
                "recoverable unit failed"
            );
            let status = UnitStatus::Recovered {
                error: error.to_string(),
            };
            (status, timed_out)
        }
        Attempt::Failed { error, .. } => {
            tracing::error!(
                unit = unit.name(),
                phase = %unit.phase(),
                error = %error,
                label = error.as_label(),
                "unit failed; escalating"
            );
            return Err(BootError::escalate(unit.name(), unit.phase(), error));
        }
    };

    shared.record(UnitReport {
        name: unit.name().to_string(),
        phase: unit.phase(),
        status,
        timed_out,
        restarts: 0,
    });
    Ok(())
}
