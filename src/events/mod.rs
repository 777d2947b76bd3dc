//! Publish/subscribe event bus.
//!
//! ## Contents
//! - [`EventBus`] topic registry with synchronous and queued publish
//! - [`EventKey`] topic identifier
//! - [`SubscriptionKey`] handle for unsubscribing one handler
//!
//! The bus is independent of the boot phases: units reach it through
//! [`RunContext::events`](crate::RunContext::events), other code through the
//! `Arc` it was constructed into.

mod bus;
mod key;
mod queue;

pub use bus::EventBus;
pub use key::{EventKey, SubscriptionKey};
