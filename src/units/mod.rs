//! # Unit descriptors.
//!
//! - [`Unit`] - named, phase-tagged startup work with timeout and recoverability
//! - [`Phase`] - ordering class of a unit
//! - [`Handler`] - async body of a unit
//! - [`UnitFn`] - closure-backed handler

mod handler;
mod unit;

pub use handler::{Handler, UnitFn};
pub use unit::{Phase, Unit};
