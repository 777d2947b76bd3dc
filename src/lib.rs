//! # bootvisor
//!
//! **Bootvisor** is a process-local startup orchestrator for Rust services.
//!
//! It sequences the initialization of independent subsystems ("units")
//! through explicit phases, lets units wait for each other, enforces
//! per-unit timeouts, contains or escalates failures, and restarts daemon
//! units until they succeed. Two supporting facilities ship with it: an
//! in-process [`EventBus`] and a shared [`Store`] with blocking reads.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ Unit (Front) │   │ Unit (Normal)│   │ Unit (Daemon)│   ...
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Boot (orchestrator)                                              │
//! │  - phase buckets (registration order)                             │
//! │  - name → DependencySignal registry                               │
//! │  - fatal channel + watchdog                                       │
//! │  - Sink, Store, EventBus (shared with every RunContext)           │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   run_unit()         run_unit()        daemon::supervise()
//!   (one attempt)      (spawned)         (restart loop)
//!        │                  │                  │
//!        └──── RunContext ──┴── require() ─────┘
//!              print / scope / store / events
//! ```
//!
//! ### Lifecycle of one attempt
//! ```text
//! RunContext::new ──► "unit starting" ──► arm countdown ──► handler.run(ctx)
//!   ├─ Ok              ──► "unit success"
//!   ├─ Err / panic     ──► "unit start error" ──► recoverable ? contain : escalate
//!   └─ timeout         ──► cancel scope ──► recoverable ? keep running : escalate
//! always: fire the name's DependencySignal, cancel the scope
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Orchestration** | Phase-ordered startup, escalation, watchdog.                 | [`Boot`], [`BootBuilder`], [`BootReport`]   |
//! | **Units**         | Named, phase-tagged startup work.                            | [`Unit`], [`Phase`], [`Handler`], [`UnitFn`]|
//! | **Dependencies**  | Wait for another unit from inside a handler.                 | [`RunContext::require`]                     |
//! | **Daemons**       | Restart until success with observable state.                 | [`DaemonStatus`], [`BackoffPolicy`]         |
//! | **Events**        | Sync fan-out and bounded async delivery.                     | [`EventBus`], [`EventKey`]                  |
//! | **Store**         | Typed key/value map with blocking `load_wait`.               | [`Store`]                                   |
//! | **Output**        | Pre-formatted lines to a pluggable sink.                     | [`Sink`], [`TracingSink`]                   |
//! | **Errors**        | Typed errors with stable labels.                             | [`BootError`], [`UnitError`], [`EventError`]|
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use bootvisor::{Boot, Phase, RunContext, Unit, UnitError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut boot = Boot::new();
//!     boot.boot_timeout(Duration::from_secs(5));
//!     boot.register([
//!         Unit::new("config", Phase::Front, |ctx: RunContext| async move {
//!             ctx.store().set("port", 8080u16);
//!             Ok::<_, UnitError>(())
//!         }),
//!         Unit::new("http", Phase::Normal, |ctx: RunContext| async move {
//!             let port: u16 = ctx.store().load_wait(ctx.scope(), "port").await?;
//!             ctx.printf(format_args!("listening on {port}"));
//!             Ok(())
//!         })
//!         .timeout(Duration::from_secs(1))
//!         .recoverable(false),
//!     ])?;
//!
//!     let report = boot.start().await?;
//!     assert_eq!(report.units.len(), 2);
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod policies;
mod sink;
mod store;
mod units;

// ---- Public re-exports ----

pub use config::{BootConfig, EventBusConfig};
pub use core::{
    Boot, BootBuilder, BootReport, DaemonState, DaemonStatus, RunContext, UnitReport, UnitStatus,
};
pub use error::{
    BootError, BoxError, EventError, HandlerFailure, RequireError, StoreError, UnitError,
};
pub use events::{EventBus, EventKey, SubscriptionKey};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use sink::{Sink, TracingSink};
pub use store::Store;
pub use units::{Handler, Phase, Unit, UnitFn};
