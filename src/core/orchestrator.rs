//! # Boot: phase-ordered startup of registered units.
//!
//! [`Boot`] buckets units by [`Phase`] at registration and runs the buckets
//! in a fixed order when [`Boot::start`] is called.
//!
//! ## Phase flow
//! ```text
//! start()
//!   ├─► Front       run one by one on the caller's task
//!   ├─► Background  spawn each ─────────────────────────────┐ (not awaited yet)
//!   ├─► Normal      spawn each, join all   (readiness gate) │
//!   ├─► Daemon      spawn supervisor loops ───────────────┐ │
//!   ├─► After       run one by one                        │ │
//!   ├─► join Background ◄─────────────────────────────────┼─┘
//!   └─► join Daemon ◄─────────────────────────────────────┘
//!
//! escalation from a spawned unit ──► fatal channel ──┐
//! watchdog (boot_timeout) ───────────────────────────┼─► first one wins:
//!                                                    │   cancel root scope,
//! phases ────────────────────────────────────────────┘   abort executions,
//!                                                        return Err(BootError)
//! ```
//!
//! ## Rules
//! - `start()` runs once; later calls return [`BootError::AlreadyStarted`].
//! - Units launch in registration order within a phase and finish in any order.
//! - Every unique name owns one dependency signal, created at registration.
//! - `start()` never terminates the process; the caller decides on `Err`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use bootvisor::{Boot, Phase, RunContext, Unit, UnitError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut boot = Boot::new();
//!     boot.register([
//!         Unit::new("db", Phase::Normal, |ctx: RunContext| async move {
//!             tokio::time::sleep(Duration::from_millis(10)).await;
//!             ctx.print("connected");
//!             Ok::<_, UnitError>(())
//!         }),
//!         Unit::new("cache", Phase::Normal, |ctx: RunContext| async move {
//!             ctx.require(ctx.scope(), "db").await?;
//!             Ok(())
//!         }),
//!     ])?;
//!
//!     let report = boot.start().await?;
//!     assert_eq!(report.units.len(), 2);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::BootConfig;
use crate::core::builder::BootBuilder;
use crate::core::daemon::{self, DaemonStatus};
use crate::core::report::BootReport;
use crate::core::runner::run_unit;
use crate::core::shared::Shared;
use crate::error::BootError;
use crate::events::EventBus;
use crate::sink::{BANNER, Sink, Tone, paint};
use crate::store::Store;
use crate::units::{Phase, Unit};

/// Units grouped by phase, in registration order.
#[derive(Default)]
struct Buckets {
    front: Vec<Arc<Unit>>,
    background: Vec<Arc<Unit>>,
    normal: Vec<Arc<Unit>>,
    daemon: Vec<Arc<Unit>>,
    after: Vec<Arc<Unit>>,
}

impl Buckets {
    fn push(&mut self, unit: Arc<Unit>) {
        match unit.phase() {
            Phase::Front => self.front.push(unit),
            Phase::Background => self.background.push(unit),
            Phase::Normal => self.normal.push(unit),
            Phase::Daemon => self.daemon.push(unit),
            Phase::After => self.after.push(unit),
        }
    }

    fn len(&self) -> usize {
        self.front.len()
            + self.background.len()
            + self.normal.len()
            + self.daemon.len()
            + self.after.len()
    }
}

/// Startup orchestrator.
pub struct Boot {
    cfg: BootConfig,
    shared: Arc<Shared>,
    buckets: Buckets,
    started: AtomicBool,
}

impl Default for Boot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Boot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Boot")
            .field("units", &self.buckets.len())
            .field("started", &self.is_started())
            .field("boot_timeout", &self.cfg.boot_timeout)
            .finish()
    }
}

impl Boot {
    /// Orchestrator with [`BootConfig::default`], a [`TracingSink`](crate::TracingSink),
    /// an empty store and no event bus.
    pub fn new() -> Self {
        Self::builder(BootConfig::default()).build()
    }

    /// Orchestrator with the given configuration.
    pub fn with_config(cfg: BootConfig) -> Self {
        Self::builder(cfg).build()
    }

    /// Starts a [`BootBuilder`] for custom sink, store or event bus.
    pub fn builder(cfg: BootConfig) -> BootBuilder {
        BootBuilder::new(cfg)
    }

    pub(crate) fn from_parts(cfg: BootConfig, shared: Shared) -> Self {
        Self {
            cfg,
            shared: Arc::new(shared),
            buckets: Buckets::default(),
            started: AtomicBool::new(false),
        }
    }

    /// Adds units to their phase buckets.
    ///
    /// Fails with [`BootError::DuplicateUnit`] on a repeated name (unless
    /// [`allow_name_repeat`](Self::allow_name_repeat) was called) and with
    /// [`BootError::AlreadyStarted`] once `start()` has been called. Units
    /// registered before the failing one stay registered.
    pub fn register<I>(&mut self, units: I) -> Result<&mut Self, BootError>
    where
        I: IntoIterator<Item = Unit>,
    {
        if self.is_started() {
            return Err(BootError::AlreadyStarted);
        }

        for unit in units {
            let fresh = self.shared.signals.ensure(unit.name());
            if !fresh && !self.cfg.allow_name_repeat {
                let err = BootError::DuplicateUnit {
                    name: unit.name().to_string(),
                };
                self.shared.printf(paint(Tone::Red, &err));
                return Err(err);
            }
            if unit.phase() == Phase::Daemon {
                self.shared.update_daemon(unit.name(), |_| {});
            }
            tracing::debug!(unit = unit.name(), phase = %unit.phase(), "unit registered");
            self.buckets.push(Arc::new(unit));
        }
        Ok(self)
    }

    /// Accepts repeated unit names; repeated names share one dependency signal.
    pub fn allow_name_repeat(&mut self) -> &mut Self {
        self.cfg.allow_name_repeat = true;
        self
    }

    /// Sets the global watchdog (`Duration::ZERO` disables it).
    pub fn boot_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.cfg.boot_timeout = timeout;
        self
    }

    /// Replaces the output sink.
    pub fn set_sink(&mut self, sink: impl Sink) -> &mut Self {
        *self.shared.sink.write() = Arc::new(sink);
        self
    }

    /// Effective configuration.
    pub fn config(&self) -> &BootConfig {
        &self.cfg
    }

    /// Whether `start()` has been called.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True if no unit is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared store handed to every unit.
    pub fn store(&self) -> &Arc<Store> {
        &self.shared.store
    }

    /// Event bus handed to every unit, if configured.
    pub fn events(&self) -> Option<&Arc<EventBus>> {
        self.shared.events.as_ref()
    }

    /// Supervision state of the daemon unit `name`.
    pub fn daemon_status(&self, name: &str) -> Option<DaemonStatus> {
        self.shared.daemons.lock().get(name).cloned()
    }

    /// How many run attempts of `name` have ended so far.
    pub fn signal_fires(&self, name: &str) -> Option<u64> {
        self.shared.signals.get(name).map(|s| s.fire_count())
    }

    /// Runs every phase in order.
    ///
    /// Returns the per-unit report on success. Any `Err` other than
    /// [`BootError::AlreadyStarted`] means startup failed: the root scope is
    /// cancelled and all still-running executions are aborted before returning.
    pub async fn start(&self) -> Result<BootReport, BootError> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BootError::AlreadyStarted);
        }

        let began = Instant::now();
        if self.cfg.banner {
            for line in BANNER.lines() {
                self.shared.write_raw(line);
            }
        }
        self.shared.printf(paint(Tone::Bold, "boot start"));
        tracing::info!(units = self.len(), watchdog = ?self.cfg.watchdog(), "boot starting");

        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
        let mut background = JoinSet::new();
        let mut daemons = JoinSet::new();

        let outcome = tokio::select! {
            res = self.run_phases(&fatal_tx, &mut background, &mut daemons) => res,
            Some(err) = fatal_rx.recv() => Err(err),
            timeout = watchdog(self.cfg.watchdog()) => {
                self.shared.printf(paint(
                    Tone::Magenta,
                    format_args!("boot timeout after {timeout:?}"),
                ));
                Err(BootError::BootTimeout { timeout })
            }
        };
        // an escalation sent during the final join may still be queued
        let outcome = outcome.and_then(|()| fatal_rx.try_recv().map_or(Ok(()), Err));

        match outcome {
            Ok(()) => {
                let elapsed = began.elapsed();
                self.shared
                    .printf(paint(Tone::Green, format_args!("boot done in {elapsed:?}")));
                tracing::info!(?elapsed, "boot finished");
                Ok(BootReport {
                    elapsed,
                    units: self.shared.take_reports(),
                })
            }
            Err(err) => {
                self.shared.root.cancel();
                background.abort_all();
                daemons.abort_all();
                self.shared.printf(paint(Tone::Red, &err));
                tracing::error!(error = %err, label = err.as_label(), "boot failed");
                Err(err)
            }
        }
    }

    async fn run_phases(
        &self,
        fatal: &mpsc::UnboundedSender<BootError>,
        background: &mut JoinSet<()>,
        daemons: &mut JoinSet<()>,
    ) -> Result<(), BootError> {
        let b = &self.buckets;

        if !b.front.is_empty() {
            self.shared.printf(paint(Tone::Cyan, "start front units"));
            for unit in &b.front {
                run_unit(Arc::clone(&self.shared), Arc::clone(unit)).await?;
            }
            self.shared.printf(paint(Tone::Green, "start front units done"));
        }

        if !b.background.is_empty() {
            self.shared.printf(paint(Tone::Cyan, "create background units"));
            for unit in &b.background {
                let (shared, unit, fatal) =
                    (Arc::clone(&self.shared), Arc::clone(unit), fatal.clone());
                background.spawn(async move {
                    if let Err(err) = run_unit(shared, unit).await {
                        let _ = fatal.send(err);
                    }
                });
            }
            self.shared.printf(paint(Tone::Green, "create background units done"));
        }

        if !b.normal.is_empty() {
            self.shared.printf(paint(Tone::Cyan, "create normal units"));
            let mut normal = JoinSet::new();
            for unit in &b.normal {
                normal.spawn(run_unit(Arc::clone(&self.shared), Arc::clone(unit)));
            }
            self.shared.printf(paint(Tone::Green, "create normal units done"));
            self.shared.printf(paint(Tone::Blue, "waiting for all normal units done"));
            while let Some(res) = normal.join_next().await {
                res.map_err(|e| BootError::Aborted {
                    reason: e.to_string(),
                })??;
            }
            self.shared.printf(paint(Tone::Green, "all normal units done"));
        }

        if !b.daemon.is_empty() {
            self.shared.printf(paint(Tone::Cyan, "create daemon units"));
            for unit in &b.daemon {
                daemons.spawn(daemon::supervise(
                    Arc::clone(&self.shared),
                    Arc::clone(unit),
                    self.cfg.daemon_backoff,
                ));
            }
            self.shared.printf(paint(Tone::Green, "create daemon units done"));
        }

        if !b.after.is_empty() {
            self.shared.printf(paint(Tone::Cyan, "start after units"));
            for unit in &b.after {
                run_unit(Arc::clone(&self.shared), Arc::clone(unit)).await?;
            }
            self.shared.printf(paint(Tone::Green, "start after units done"));
        }

        if !background.is_empty() {
            self.shared
                .printf(paint(Tone::Blue, "waiting for all background units done"));
            join_all(background).await?;
            self.shared.printf(paint(Tone::Green, "all background units done"));
        }

        if !daemons.is_empty() {
            self.shared.printf(paint(Tone::Blue, "waiting for all daemon units done"));
            join_all(daemons).await?;
            self.shared.printf(paint(Tone::Green, "all daemon units done"));
        }

        Ok(())
    }
}

async fn join_all(set: &mut JoinSet<()>) -> Result<(), BootError> {
    while let Some(res) = set.join_next().await {
        res.map_err(|e| BootError::Aborted {
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Resolves with `limit` once it elapses; never resolves without a limit.
async fn watchdog(limit: Option<Duration>) -> Duration {
    match limit {
        Some(limit) => {
            tokio::time::sleep(limit).await;
            limit
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
