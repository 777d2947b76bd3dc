//! # Outcome of a successful `start()`.

use std::time::Duration;

use crate::units::Phase;

/// How a unit ended when startup as a whole succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// Handler returned `Ok(())`.
    Succeeded,
    /// Handler failed but the unit is recoverable; the failure was contained.
    Recovered {
        /// Rendered handler error.
        error: String,
    },
}

/// Final record of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    /// Unit name.
    pub name: String,
    /// Registration phase.
    pub phase: Phase,
    /// Final status.
    pub status: UnitStatus,
    /// Whether the unit's timeout elapsed at least once (recoverable units only).
    pub timed_out: bool,
    /// Number of restarts before the final attempt (daemon units).
    pub restarts: u32,
}

/// Returned by [`Boot::start`](crate::Boot::start) on success.
///
/// Units are listed in completion order.
#[derive(Debug, Clone)]
pub struct BootReport {
    /// Wall time of `start()`.
    pub elapsed: Duration,
    /// One entry per finished unit.
    pub units: Vec<UnitReport>,
}

impl BootReport {
    /// First report for `name`.
    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Units whose failure was contained.
    pub fn recovered(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|u| matches!(u.status, UnitStatus::Recovered { .. }))
    }

    /// Position of `name` in completion order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.units.iter().position(|u| u.name == name)
    }
}
