//! Runtime core: phase orchestration and unit lifecycle.
//!
//! The public API from this module is [`Boot`] (with [`BootBuilder`]),
//! the per-attempt [`RunContext`] and the result/status types.
//!
//! Internal modules:
//! - [`orchestrator`]: registration, phase ordering, escalation, watchdog;
//! - [`runner`]: one run attempt with timeout, panic capture and signal firing;
//! - [`daemon`]: restart loop and observable state of daemon units;
//! - [`context`]: the handle passed to handlers, including `require`;
//! - [`countdown`]: pausable timeout clock;
//! - [`signal`]: per-name dependency signals.

mod builder;
mod context;
mod countdown;
mod daemon;
mod orchestrator;
mod report;
mod runner;
mod shared;
mod signal;

pub use builder::BootBuilder;
pub use context::RunContext;
pub use daemon::{DaemonState, DaemonStatus};
pub use orchestrator::Boot;
pub use report::{BootReport, UnitReport, UnitStatus};
