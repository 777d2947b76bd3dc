//! # Supervised restart loop for daemon units.
//!
//! ```text
//!          ┌──────────────────────── backoff elapsed ───────────────────┐
//!          ▼                                                            │
//! Idle ──► Running ──► attempt Ok ──► Stopped                           │
//!             │                                                         │
//!             └──► attempt failed ──► Restarting (restarts += 1) ───────┘
//!                                          │
//!                                          └─ root scope cancelled ──► Stopped
//! ```
//!
//! ## Rules
//! - Every iteration gets a brand-new [`RunContext`] (fresh scope and countdown).
//! - The unit's signal fires at the end of every iteration, failures included.
//! - Failures never escalate; they are recorded in [`DaemonStatus`].
//! - The pause between iterations is `BootConfig::daemon_backoff.next(restarts)`.

use std::sync::Arc;

use tokio::{select, time};

use crate::core::context::RunContext;
use crate::core::report::{UnitReport, UnitStatus};
use crate::core::runner::{Attempt, run_attempt};
use crate::core::shared::Shared;
use crate::policies::BackoffPolicy;
use crate::sink::{Tone, paint, unit_prefix};
use crate::units::Unit;

/// Lifecycle state of a daemon unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DaemonState {
    /// Registered, `start()` has not reached the daemon phase yet.
    #[default]
    Idle,
    /// An iteration is executing.
    Running,
    /// Last iteration failed; waiting for the back-off to elapse.
    Restarting,
    /// Finished: an iteration succeeded or startup was torn down.
    Stopped,
}

/// Observable supervision state of one daemon unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DaemonStatus {
    /// Current state.
    pub state: DaemonState,
    /// Failed iterations so far.
    pub restarts: u32,
    /// Rendered error of the most recent failed iteration.
    pub last_failure: Option<String>,
}

impl DaemonStatus {
    fn running(&mut self) {
        self.state = DaemonState::Running;
    }

    fn failed(&mut self, error: String) {
        self.state = DaemonState::Restarting;
        self.restarts = self.restarts.saturating_add(1);
        self.last_failure = Some(error);
    }

    fn stopped(&mut self) {
        self.state = DaemonState::Stopped;
    }
}

/// Drives one daemon unit until an iteration succeeds or the root scope ends.
pub(crate) async fn supervise(shared: Arc<Shared>, unit: Arc<Unit>, backoff: BackoffPolicy) {
    let name = unit.name();
    let mut restarts: u32 = 0;

    loop {
        shared.update_daemon(name, DaemonStatus::running);
        let ctx = RunContext::new(Arc::clone(&shared), Arc::clone(&unit));

        match run_attempt(ctx).await {
            Attempt::Succeeded { timed_out } => {
                shared.update_daemon(name, DaemonStatus::stopped);
                shared.record(UnitReport {
                    name: name.to_string(),
                    phase: unit.phase(),
                    status: UnitStatus::Succeeded,
                    timed_out,
                    restarts,
                });
                tracing::debug!(unit = name, restarts, "daemon unit finished");
                return;
            }
            Attempt::Failed { error, .. } => {
                let delay = backoff.next(restarts);
                restarts = restarts.saturating_add(1);
                let rendered = error.to_string();

                shared.printf(format_args!(
                    "{} {}",
                    unit_prefix(unit.phase().as_str(), name),
                    paint(
                        Tone::Red,
                        format_args!("daemon unit error, restart in {delay:?}: {rendered}"),
                    )
                ));
                tracing::warn!(
                    unit = name,
                    restarts,
                    ?delay,
                    error = %rendered,
                    label = error.as_label(),
                    "daemon unit failed; restarting"
                );
                shared.update_daemon(name, |s| s.failed(rendered));

                select! {
                    _ = time::sleep(delay) => {}
                    _ = shared.root.cancelled() => {
                        shared.update_daemon(name, DaemonStatus::stopped);
                        return;
                    }
                }
            }
        }
    }
}
